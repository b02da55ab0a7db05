use std::result;

use thiserror::Error;

use crate::{
    envelope::error::EnvelopeError,
    frontend::error::FrontendError,
    shared::Identifier,
    signal::error::NotificationParseError,
    tap::error::TapError,
};

#[derive(Error, Debug)]
pub enum SourceProcessRecoverableError {
    #[error("Malformed classifier notification: {0}")]
    Notification(#[from] NotificationParseError),

    #[error("Notification from unknown listener `{0}`")]
    UnknownListener(Identifier),

    #[error("Notification from inoperative listener `{0}`")]
    InoperativeListener(Identifier),

    #[error("[Envelope] {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("[Tap] {0}")]
    Tap(#[from] TapError),

    #[error("Frontend failed to stop: {0}")]
    FrontendStop(FrontendError),

    #[error("Source spectrum unavailable: {0}")]
    SourceSpectrum(FrontendError),
}

#[derive(Error, Debug)]
pub enum SourceProcessFatalError {
    #[error("Frontend failed to start: {0}")]
    FrontendStart(FrontendError),

    #[error("Frontend failed to tune centre frequency {center_hz} Hz: {source}")]
    FrontendTune {
        center_hz: u64,
        source: FrontendError,
    },

    #[error("Outbound channel closed")]
    OutboundClosed,
}

pub(crate) type ProcessResult<T> = result::Result<T, SourceProcessFatalError>;
