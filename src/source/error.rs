use std::result;

use thiserror::Error;
use tokio::task::JoinError;

use crate::{shared::Identifier, signal::SystemStatus};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Radio source `{0}` was already stopped")]
    AlreadyStopped(Identifier),

    #[error("Radio source `{id}` already terminated, status: {status}")]
    AlreadyTerminated { id: Identifier, status: SystemStatus },

    #[error("Failed to send stop instruction to radio source `{0}`")]
    SendStopFailed(Identifier),

    #[error("Radio source `{0}` did not stop in time and was aborted")]
    StopTimeout(Identifier),

    #[error("Radio source `{id}` task join error: {source}")]
    TaskJoin { id: Identifier, source: JoinError },
}

pub(super) type Result<T> = result::Result<T, SourceError>;
