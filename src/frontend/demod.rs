use std::{fmt, str::FromStr};

use super::error::DemodulationDecodeError;

/// Demodulation a listener asks the frontend to run on its channel.
///
/// The set is closed: the frontend matches on it directly instead of looking demodulators up by
/// name at runtime. [`Demodulation::Disabled`] keeps the channel for power measurement only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Demodulation {
    #[default]
    Disabled,
    Am,
    Nfm,
    Wfm,
    Usb,
    Lsb,
}

impl Demodulation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "none",
            Self::Am => "am",
            Self::Nfm => "nfm",
            Self::Wfm => "wfm",
            Self::Usb => "usb",
            Self::Lsb => "lsb",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, DemodulationDecodeError> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::Disabled),
            "am" => Ok(Self::Am),
            "nfm" => Ok(Self::Nfm),
            "wfm" => Ok(Self::Wfm),
            "usb" => Ok(Self::Usb),
            "lsb" => Ok(Self::Lsb),
            _ => Err(DemodulationDecodeError(name.to_string())),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

impl fmt::Display for Demodulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Demodulation {
    type Err = DemodulationDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_decode_case_insensitively() {
        assert_eq!(Demodulation::from_name("NFM").unwrap(), Demodulation::Nfm);
        assert_eq!("none".parse::<Demodulation>().unwrap(), Demodulation::Disabled);
        assert!(Demodulation::from_name("fm_stereo").is_err());
    }

    #[test]
    fn only_disabled_variant_is_not_enabled() {
        assert!(!Demodulation::default().is_enabled());
        assert!(!"none".parse::<Demodulation>().unwrap().is_enabled());

        for name in ["am", "nfm", "wfm", "usb", "lsb"] {
            assert!(Demodulation::from_name(name).unwrap().is_enabled());
        }
    }
}
