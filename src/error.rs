//! Crate-wide error type with HTTP status code mapping.
//!
//! [`AppError`] covers every loop-level and request-level failure. Per-event
//! decode failures live in [`crate::decoder::DecodeError`] and never escape
//! the handler that produced them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "not found: no lend snapshot for type 0",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request           |
/// | 2000–2999 | Not Found             | 404 Not Found             |
/// | 3000–3999 | Backend / transient   | 500 / 502                 |
/// | 5000–5999 | Configuration / fatal | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Chain RPC call failed.
    #[error("chain rpc error: {0}")]
    Chain(String),

    /// Relational store failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Durable queue or in-process channel failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// No checkpoint row is seeded for the chain.
    #[error("no checkpoint seeded for chain {0}")]
    CheckpointMissing(i64),

    /// A retry policy with a finite attempt budget gave up.
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        /// Operation that kept failing.
        operation: &'static str,
        /// Number of consecutive failed attempts.
        attempts: u32,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::NotFound(_) => 2001,
            Self::CheckpointMissing(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Queue(_) => 3002,
            Self::Chain(_) => 3003,
            Self::RetriesExhausted { .. } => 3004,
            Self::Config(_) => 5001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::CheckpointMissing(_) => StatusCode::NOT_FOUND,
            Self::Chain(_) | Self::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Queue(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
