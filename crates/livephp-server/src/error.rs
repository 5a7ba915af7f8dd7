//! Error types for the HTTP server.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use livephp_cgi::CgiError;

use crate::path_guard::AccessDenied;

/// Server error type.
///
/// Response bodies are opaque; details are logged.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ServerError {
    /// File or script not found at the given path.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Request path escapes the served directory.
    #[error(transparent)]
    AccessDenied(#[from] AccessDenied),

    /// Interpreter could not be started or exited unsuccessfully.
    #[error("Script failed: {0}")]
    Script(#[from] CgiError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Map a filesystem error on `path`, turning "not found" into 404.
    pub(crate) fn from_io(path: PathBuf, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io(err)
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "404 Not Found"),
            Self::AccessDenied(e) => {
                tracing::warn!(error = %e, "Rejected request path");
                (StatusCode::FORBIDDEN, "403 Forbidden")
            }
            Self::Script(e) => {
                match e.output() {
                    Some(output) => tracing::error!(
                        error = %e,
                        output = %String::from_utf8_lossy(output),
                        "Script execution failed"
                    ),
                    None => tracing::error!(error = %e, "Script execution failed"),
                }
                (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
            }
            Self::Io(e) => {
                tracing::error!(error = %e, "I/O error while serving request");
                (StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
            }
        };

        (status, body).into_response()
    }
}
