//! Common error types for BoxHawk

use thiserror::Error;

/// Common result type for BoxHawk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the review engine and its adapters
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing required input; the caller can correct it
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Referenced entities exist but are in the wrong state for the operation
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Submission status change not permitted by the transition table
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Caller has no identity attached
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller's role does not permit the route or action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Object store failure (blob put/delete)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (corrupt row, invariant breach)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// HTTP-equivalent status class for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::PreconditionFailed(_) | Error::InvalidTransition(_) => 400,
            Error::Unauthenticated(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Storage(_)
            | Error::Database(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Internal(_) => 500,
        }
    }
}
