//! Read-only HTTP surface over the state tree.
//!
//! Every path lives under [`BASE_PATH`]:
//!
//! ```text
//! /diatomite/sites
//! /diatomite/sites/{site}
//! /diatomite/sites/{site}/probes
//! /diatomite/sites/{site}/probes/{probe}
//! /diatomite/sites/{site}/probes/{probe}/RadioSources
//! /diatomite/sites/{site}/probes/{probe}/RadioSources/{source}
//! /diatomite/sites/{site}/probes/{probe}/RadioSources/{source}/listeners
//! /diatomite/sites/{site}/probes/{probe}/RadioSources/{source}/listeners/{listener}
//! /diatomite/sites/{site}/probes/{probe}/RadioSources/{source}/listeners/{listener}/current_signal_state
//! ```
//!
//! Only `GET` and `HEAD` are served. Failures are answered with a JSON error body and never stop
//! the server.

use http_body_util::Full;
use hyper::{
    Method, Response, StatusCode,
    body::Bytes,
    header::{self, HeaderValue},
};

use crate::{logging::LogContext, store::StateReader};

pub(crate) mod error;
mod route;
mod server;

use error::ApiError;

pub use route::{BASE_PATH, parse_route};
pub use server::{ReadSurface, ReadSurfaceConfig, ReadSurfaceController};

/// Answers one read-surface request from the current state of `reader`.
///
/// The method is checked first, so a `POST` is refused with `405` whatever its path. `HEAD`
/// carries the status and headers `GET` would, with an empty body.
pub fn handle(reader: &dyn StateReader, method: &Method, path: &str) -> Response<Full<Bytes>> {
    let (status, body) = match resolve(reader, method, path) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            log::debug!(
                "{} REQUEST_FAILED method={} path={} error={}",
                LogContext::new(),
                method,
                path,
                e
            );
            (e.status(), render_error(&e))
        }
    };

    let content_length = body.len();
    let body = if method == Method::HEAD {
        Bytes::new()
    } else {
        Bytes::from(body)
    };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    if status == StatusCode::METHOD_NOT_ALLOWED {
        headers.insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    }

    response
}

fn resolve(reader: &dyn StateReader, method: &Method, path: &str) -> Result<String, ApiError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ApiError::MethodNotAllowed {
            path: path.to_string(),
            method: method.clone(),
        });
    }

    let query = parse_route(path)?;

    let view = reader.query(&query).map_err(|source| ApiError::Unknown {
        path: path.to_string(),
        source,
    })?;

    serde_json::to_string(&view).map_err(|e| ApiError::Internal {
        path: path.to_string(),
        detail: e.to_string(),
    })
}

fn render_error(error: &ApiError) -> String {
    // The error body holds only strings and integers
    serde_json::to_string(&error.body()).unwrap_or_else(|_| String::from(r#"{"errors":[]}"#))
}

#[cfg(test)]
mod tests;
