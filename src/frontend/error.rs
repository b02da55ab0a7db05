use std::fmt;

use thiserror::Error;

use crate::util::PanicPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendOperation {
    Start,
    Stop,
    SetCenterFrequency,
    ListenerSpectrum,
    SourceSpectrum,
}

impl fmt::Display for FrontendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::SetCenterFrequency => "set_center_frequency",
            Self::ListenerSpectrum => "listener_spectrum",
            Self::SourceSpectrum => "source_spectrum",
        };
        write!(f, "`RadioFrontend::{name}`")
    }
}

#[derive(Error, Debug, Clone)]
pub enum FrontendError {
    #[error("{operation} panicked: {payload}")]
    Panicked {
        operation: FrontendOperation,
        payload: PanicPayload,
    },

    #[error("{operation} error: {message}")]
    Failed {
        operation: FrontendOperation,
        message: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown demodulation `{0}`")]
pub struct DemodulationDecodeError(pub String);
