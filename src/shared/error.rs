use thiserror::Error;

use super::{FrequencyRange, Identifier};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierValidationError {
    #[error("Invalid identifier, must not be empty")]
    Empty,

    #[error("Invalid identifier `{id}`, character {ch:?} is not an ASCII letter, digit, `_` or `-`")]
    InvalidCharacter { id: String, ch: char },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Duplicate {kind} identifier `{id}`")]
pub struct DuplicateIdentifierError {
    pub kind: &'static str,
    pub id: Identifier,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrequencyRangeValidationError {
    #[error("Invalid frequency range, low bound {low_hz} Hz is above high bound {high_hz} Hz")]
    Inverted { low_hz: u64, high_hz: u64 },
}

/// Rejected configuration. Aborts start-up of the component being configured.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    DuplicateIdentifier(#[from] DuplicateIdentifierError),

    #[error("Listener `{listener}` passband {passband} is outside source capability {capability}")]
    OutOfBoundsFrequency {
        listener: Identifier,
        passband: FrequencyRange,
        capability: FrequencyRange,
    },

    #[error("Centre frequency {center_hz} Hz is outside source capability {capability}")]
    CenterOutOfBounds {
        center_hz: u64,
        capability: FrequencyRange,
    },

    #[error("Invalid listener `{listener}`, bandwidth must be greater than zero")]
    ZeroBandwidth { listener: Identifier },
}
