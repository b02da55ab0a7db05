use std::{io, net::SocketAddr, result};

use hyper::{Method, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinError;

use crate::{shared::error::IdentifierValidationError, store::error::QueryError};

/// Failure of a single read-surface request. Rendered as a JSON error body, never fatal to the
/// server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Method {method} is not allowed, use GET or HEAD")]
    MethodNotAllowed { path: String, method: Method },

    #[error("Path is outside the read surface")]
    Forbidden { path: String },

    #[error("{source}")]
    InvalidIdentifier {
        path: String,
        source: IdentifierValidationError,
    },

    #[error("{source}")]
    Unknown { path: String, source: QueryError },

    #[error("{detail}")]
    Internal { path: String, detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::InvalidIdentifier { .. } | Self::Unknown { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Request path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::MethodNotAllowed { path, .. }
            | Self::Forbidden { path }
            | Self::InvalidIdentifier { path, .. }
            | Self::Unknown { path, .. }
            | Self::Internal { path, .. } => path,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let status = self.status();

        ErrorBody {
            errors: vec![ErrorObject {
                status: status.as_u16(),
                source: ErrorSource {
                    pointer: self.path().to_string(),
                },
                title: status.canonical_reason().unwrap_or("Error").to_string(),
                detail: self.to_string(),
            }],
        }
    }
}

/// `{"errors":[{"status","source":{"pointer"},"title","detail"}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorObject {
    pub status: u16,
    pub source: ErrorSource,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSource {
    pub pointer: String,
}

#[derive(Error, Debug)]
pub enum ReadSurfaceError {
    #[error("Failed to bind read surface on {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("Failed to resolve read surface local address: {0}")]
    LocalAddr(io::Error),

    #[error("Read surface was already shut down")]
    AlreadyShutdown,

    #[error("Read surface did not shut down in time and was aborted")]
    ShutdownTimeout,

    #[error("Read surface task join error: {0}")]
    TaskJoin(JoinError),
}

pub(super) type Result<T> = result::Result<T, ReadSurfaceError>;
