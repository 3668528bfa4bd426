//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, with its
//! mapping onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courseforge_core::ports::PortError;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// The request carried no valid session cookie. Surfaced as a plain 401
    /// so the navigation/session controller on the client decides what to
    /// do, instead of an ad-hoc redirect from a leaf component.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::AuthenticationRequired | ApiError::Port(PortError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Port(PortError::InvalidInput(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            // Upstream service failures are recoverable from the client's
            // point of view: same phase, retry the same action.
            ApiError::Port(PortError::Unexpected(_)) => {
                error!("Upstream service failure: {}", self);
                (StatusCode::BAD_GATEWAY, "Upstream service failure".to_string())
            }
            _ => {
                error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, message).into_response()
    }
}
