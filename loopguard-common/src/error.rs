//! Common error types for LoopGuard

use thiserror::Error;

use crate::followup::FollowUpStatus;

/// Common result type for LoopGuard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LoopGuard crates
#[derive(Error, Debug)]
pub enum Error {
    /// Requested status is not reachable from the current status
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: FollowUpStatus,
        to: FollowUpStatus,
    },

    /// Missing or malformed input (entity construction, request values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write lost an optimistic-concurrency race or duplicated an identity
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (e.g. a stored value that no longer decodes)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Short stable label used in audit `error_detail` and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Validation(_) => "validation",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Database(_) => "database",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
            Error::Internal(_) => "internal",
        }
    }
}
