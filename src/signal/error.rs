use thiserror::Error;

use crate::{frontend::error::FrontendError, shared::error::IdentifierValidationError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusDecodeError {
    #[error("Unknown signal status `{0}`")]
    UnknownSignalStatus(String),

    #[error("Unknown system status `{0}`")]
    UnknownSystemStatus(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdValidationError {
    #[error("Invalid threshold {0} dBm, must be a finite negative value")]
    NotNegative(f64),
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Spectrum slice is empty")]
    EmptySlice,

    #[error("Spectrum slice contains a non-finite bin at index {index}")]
    NonFiniteBin { index: usize },

    #[error("Spectrum unavailable: {0}")]
    SpectrumUnavailable(#[from] FrontendError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotificationParseError {
    #[error("Notification `{0}` does not have four `:`-separated fields")]
    FieldCount(String),

    #[error("Notification listener id is invalid: {0}")]
    Listener(#[from] IdentifierValidationError),

    #[error("Unexpected notification kind `{0}`, expected `SIG_STATUS`")]
    Kind(String),

    #[error("Notification status `{0}` is neither `PRESENT` nor `ABSENT`")]
    Status(String),

    #[error("Notification level `{0}` is not a finite number")]
    Level(String),
}
