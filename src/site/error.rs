use std::result;

use thiserror::Error;

use crate::{
    probe::error::ProbeError, shared::error::ConfigError, source::error::SourceError,
    store::error::StoreError,
};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("[Config] {0}")]
    Config(#[from] ConfigError),

    #[error("Site was already shut down")]
    AlreadyShutdown,

    #[error("[Source] {0}")]
    Source(#[from] SourceError),

    #[error("[Probe] {0}")]
    Probe(#[from] ProbeError),

    #[error("[Store] {0}")]
    Store(#[from] StoreError),
}

pub(super) type Result<T> = result::Result<T, SiteError>;
