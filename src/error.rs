//! Tracker error types with HTTP status code mapping.
//!
//! [`TrackerError`] is the central error type of the crate. The tracking
//! loop only logs it; the query API turns it into a structured JSON error
//! response.

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
///     "message": "not found: event 112 is not tracked on jp",
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

/// Crate-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status               |
/// |-----------|-----------------------|---------------------------|
/// | 1000–1999 | Validation            | 400 Bad Request           |
/// | 2000–2999 | Not Found             | 404 Not Found             |
/// | 3000–3999 | Server / persistence  | 500 Internal Server Error |
/// | 4000–4999 | Upstream / master data| 502 Bad Gateway / 503     |
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Master data file is unreadable or malformed.
    #[error("master data error: {0}")]
    MasterData(String),

    /// Upstream ranking API returned a non-success status or a bad payload.
    #[error("upstream fetch error: {0}")]
    UpstreamFetch(String),

    /// Storage failure; the surrounding transaction was rolled back.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Server region is unknown or not enabled.
    #[error("unknown server: {0}")]
    UnknownServer(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Requested event or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid process configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UnknownServer(_) => 1002,
            Self::NotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Config(_) => 3002,
            Self::UpstreamFetch(_) => 4001,
            Self::MasterData(_) => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::UnknownServer(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            Self::MasterData(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for TrackerError {
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
