use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod error;

use error::{DuplicateIdentifierError, FrequencyRangeValidationError, IdentifierValidationError};

/// Validated, lower-cased name of a site, probe, source or listener.
///
/// Identifiers are restricted to ASCII letters, digits, `_` and `-`, and are never empty. Input is
/// case-normalized, so `Rx-A` and `rx-a` name the same entity.
///
/// # Examples
///
/// ```
/// use diatomite::models::Identifier;
///
/// let id = Identifier::new("North_Mast-2").unwrap();
/// assert_eq!(id.as_str(), "north_mast-2");
///
/// assert!(Identifier::new("north mast").is_err());
/// assert!(Identifier::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: &str) -> Result<Self, IdentifierValidationError> {
        if value.is_empty() {
            return Err(IdentifierValidationError::Empty);
        }

        if let Some(ch) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(IdentifierValidationError::InvalidCharacter {
                id: value.to_string(),
                ch,
            });
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = IdentifierValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

/// Entity that carries an [`Identifier`] unique among its siblings.
pub trait Identified {
    /// Human-readable name of the entity kind, used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &Identifier;
}

/// Insertion-ordered collection whose members have pairwise distinct identifiers.
#[derive(Debug, Clone)]
pub struct Siblings<T: Identified>(Vec<T>);

impl<T: Identified> Siblings<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends `item`, refusing it if a sibling with the same identifier is already present.
    pub fn append(&mut self, item: T) -> Result<(), DuplicateIdentifierError> {
        if self.contains(item.id()) {
            return Err(DuplicateIdentifierError {
                kind: T::KIND,
                id: item.id().clone(),
            });
        }

        self.0.push(item);
        Ok(())
    }

    pub fn contains(&self, id: &Identifier) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &Identifier) -> Option<&T> {
        self.0.iter().find(|item| item.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Identifier> {
        self.0.iter().map(Identified::id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Identified> Default for Siblings<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identified> IntoIterator for Siblings<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Closed frequency interval, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyRange {
    low_hz: u64,
    high_hz: u64,
}

impl FrequencyRange {
    pub fn new(low_hz: u64, high_hz: u64) -> Result<Self, FrequencyRangeValidationError> {
        if low_hz > high_hz {
            return Err(FrequencyRangeValidationError::Inverted { low_hz, high_hz });
        }

        Ok(Self { low_hz, high_hz })
    }

    /// Range of width `bandwidth_hz` centred on `center_hz`.
    pub fn centered(center_hz: u64, bandwidth_hz: u64) -> Self {
        let half = bandwidth_hz / 2;
        Self {
            low_hz: center_hz.saturating_sub(half),
            high_hz: center_hz.saturating_add(bandwidth_hz - half),
        }
    }

    pub fn low_hz(&self) -> u64 {
        self.low_hz
    }

    pub fn high_hz(&self) -> u64 {
        self.high_hz
    }

    pub fn bandwidth_hz(&self) -> u64 {
        self.high_hz - self.low_hz
    }

    pub fn contains(&self, hz: u64) -> bool {
        self.low_hz <= hz && hz <= self.high_hz
    }

    /// Returns `true` if `other` lies entirely within this range.
    pub fn contains_range(&self, other: &FrequencyRange) -> bool {
        self.low_hz <= other.low_hz && other.high_hz <= self.high_hz
    }
}

impl fmt::Display for FrequencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} Hz, {} Hz]", self.low_hz, self.high_hz)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    struct Named(Identifier);

    impl Identified for Named {
        const KIND: &'static str = "listener";

        fn id(&self) -> &Identifier {
            &self.0
        }
    }

    fn named(s: &str) -> Named {
        Named(Identifier::new(s).unwrap())
    }

    proptest! {
        #[test]
        fn valid_identifiers_are_lowercased(input in "[A-Za-z0-9_-]{1,32}") {
            let id = Identifier::new(&input).unwrap();
            prop_assert_eq!(id.as_str(), input.to_ascii_lowercase());
        }

        #[test]
        fn identifiers_with_foreign_characters_are_rejected(
            prefix in "[a-z0-9_-]{0,8}",
            bad in "[^A-Za-z0-9_-]",
            suffix in "[a-z0-9_-]{0,8}",
        ) {
            let input = format!("{prefix}{bad}{suffix}");
            let is_invalid_char = matches!(
                Identifier::new(&input),
                Err(IdentifierValidationError::InvalidCharacter { .. })
            );
            prop_assert!(is_invalid_char);
        }
    }

    #[test]
    fn empty_identifier_is_rejected() {
        assert!(matches!(
            Identifier::new(""),
            Err(IdentifierValidationError::Empty)
        ));
    }

    #[test]
    fn identifier_serde_validates() {
        let id: Identifier = serde_json::from_str("\"Rx_0\"").unwrap();
        assert_eq!(id.as_str(), "rx_0");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"rx_0\"");

        assert!(serde_json::from_str::<Identifier>("\"rx 0\"").is_err());
    }

    #[test]
    fn siblings_reject_duplicates_case_insensitively() {
        let mut siblings = Siblings::new();
        siblings.append(named("l0")).unwrap();
        siblings.append(named("l1")).unwrap();

        let err = siblings.append(named("L0")).unwrap_err();
        assert_eq!(err.id.as_str(), "l0");
        assert_eq!(err.kind, "listener");
        assert_eq!(siblings.len(), 2);

        let ids: Vec<_> = siblings.ids().map(Identifier::as_str).collect();
        assert_eq!(ids, vec!["l0", "l1"]);
    }

    #[test]
    fn frequency_range_containment() {
        let capability = FrequencyRange::new(100_000_000, 102_000_000).unwrap();

        assert!(capability.contains_range(&FrequencyRange::centered(101_000_000, 200_000)));
        assert!(capability.contains_range(&FrequencyRange::centered(100_100_000, 200_000)));
        assert!(!capability.contains_range(&FrequencyRange::centered(100_050_000, 200_000)));
        assert!(!capability.contains_range(&FrequencyRange::centered(102_000_000, 10)));

        assert!(FrequencyRange::new(2, 1).is_err());
        assert_eq!(FrequencyRange::centered(1_000, 101).bandwidth_hz(), 101);
    }
}
