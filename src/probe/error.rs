use std::result;

use thiserror::Error;
use tokio::task::JoinError;

use crate::{envelope::error::EnvelopeError, shared::Identifier};

#[derive(Error, Debug)]
pub enum ProbeMonitorRecoverableError {
    #[error("[Envelope] {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Envelope on the channel of source `{expected}` originates from `{found}`")]
    OriginMismatch {
        expected: Identifier,
        found: Identifier,
    },
}

#[derive(Error, Debug)]
pub enum ProbeMonitorFatalError {
    #[error("State store input channel closed")]
    StoreClosed,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe monitor `{0}` was already shut down")]
    AlreadyShutdown(Identifier),

    #[error("Probe monitor `{0}` did not drain in time and was aborted")]
    ShutdownTimeout(Identifier),

    #[error("Probe monitor `{id}` task join error: {source}")]
    TaskJoin { id: Identifier, source: JoinError },
}

pub(super) type Result<T> = result::Result<T, ProbeError>;
