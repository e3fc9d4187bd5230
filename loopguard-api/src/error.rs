//! HTTP error type
//!
//! Every failure leaves the API as `{"error": {"code", "message", ...}}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loopguard_common::{Error as CoreError, FollowUpStatus};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or malformed caller identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller's role may not perform this operation (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Requested status is not reachable (409)
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: FollowUpStatus,
        to: FollowUpStatus,
    },

    /// Stale version or duplicate (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidTransition { from, to } => ApiError::InvalidTransition { from, to },
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body("BAD_REQUEST", msg)),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, error_body("UNAUTHORIZED", msg))
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, error_body("FORBIDDEN", msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body("NOT_FOUND", msg)),
            ApiError::InvalidTransition { from, to } => (
                StatusCode::CONFLICT,
                json!({
                    "error": {
                        "code": "INVALID_TRANSITION",
                        "message": format!("Cannot transition from {} to {}", from, to),
                        "from": from,
                        "to": to,
                        "allowed": from.allowed_transitions(),
                    }
                }),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, error_body("CONFLICT", msg)),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL_ERROR", "Internal server error".to_string()),
                )
            }
            ApiError::Other(err) => {
                error!("Unhandled error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body("INTERNAL_ERROR", "Internal server error".to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(code: &str, message: String) -> serde_json::Value {
    json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
