use std::{io, path::PathBuf, result};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TapError {
    #[error("Failed to create tap FIFO at {path}: {source}")]
    CreateFifo { path: PathBuf, source: nix::Error },

    #[error("Tap path {0} exists and is not a FIFO")]
    NotAFifo(PathBuf),

    #[error("Failed to inspect tap path {path}: {source}")]
    Inspect { path: PathBuf, source: io::Error },

    #[error("Failed to open tap FIFO for writing: {0}")]
    Open(io::Error),

    #[error("Failed to wait for room in tap FIFO: {0}")]
    Poll(nix::Error),

    #[error("Tap closed while a line was being written")]
    Closed,

    #[error("Tap consumer disconnected")]
    BrokenPipe,

    #[error("Failed to write tap line: {0}")]
    Write(io::Error),

    #[error("Failed to spawn tap broadcaster thread: {0}")]
    SpawnThread(io::Error),
}

pub(crate) type Result<T> = result::Result<T, TapError>;
