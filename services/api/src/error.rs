//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use genfuze_core::ports::PortError;
use serde_json::json;
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

    /// Represents an error while running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A feature whose credentials or endpoint were not configured.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(d) => (StatusCode::BAD_REQUEST, "Bad request", d.clone()),
            ApiError::Unauthorized(d) => (StatusCode::UNAUTHORIZED, "Unauthorized", d.clone()),
            ApiError::NotFound(d) => (StatusCode::NOT_FOUND, "Not found", d.clone()),
            ApiError::Conflict(d) => (StatusCode::CONFLICT, "Conflict", d.clone()),
            ApiError::Unavailable(d) => (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", d.clone()),
            ApiError::Port(port) => match port {
                PortError::NotFound(d) => (StatusCode::NOT_FOUND, "Not found", d.clone()),
                PortError::Conflict(d) => (StatusCode::CONFLICT, "Conflict", d.clone()),
                PortError::InvalidInput(d) => (StatusCode::BAD_REQUEST, "Bad request", d.clone()),
                PortError::Upstream(d) => (StatusCode::BAD_GATEWAY, "Upstream provider error", d.clone()),
                PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", String::new()),
                PortError::Unexpected(d) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", d.clone())
                }
            },
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                other.to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.parts();
        if status.is_server_error() {
            error!("{} ({}): {}", message, status, details);
        }

        let body = Json(json!({
            "error": message,
            "details": details,
        }));

        (status, body).into_response()
    }
}
