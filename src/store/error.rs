use std::result;

use thiserror::Error;
use tokio::task::JoinError;

use crate::{
    envelope::{UpdatePath, error::EnvelopeError},
    shared::Identifier,
};

/// Reason an inbound message was not applied to the state tree. The message is dropped.
#[derive(Error, Debug)]
pub enum StoreApplyError {
    #[error("[Envelope] {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Update addressed to unregistered site `{0}`")]
    UnknownSite(Identifier),

    #[error("Update addressed to unregistered probe `{probe}` of site `{site}`")]
    UnknownProbe { site: Identifier, probe: Identifier },

    #[error("Signal update for `{0}` does not name a listener")]
    MissingListener(UpdatePath),
}

/// Lookup failure while resolving a [`StateQuery`](super::StateQuery).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown site `{0}`")]
    UnknownSite(Identifier),

    #[error("Unknown probe `{0}`")]
    UnknownProbe(Identifier),

    #[error("Unknown radio source `{0}`")]
    UnknownSource(Identifier),

    #[error("Unknown listener `{0}`")]
    UnknownListener(Identifier),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State store was already shut down")]
    AlreadyShutdown,

    #[error("State store did not drain in time and was aborted")]
    ShutdownTimeout,

    #[error("State store task join error: {0}")]
    TaskJoin(JoinError),
}

pub(super) type Result<T> = result::Result<T, StoreError>;
