//! Error types for labbook.

use thiserror::Error;

/// Common error type for infrastructure failures.
///
/// Domain failures (bad credentials, slot conflicts, ...) have their own
/// enums in the `auth` and `booking` modules; this type covers the store,
/// the filesystem and configuration.
#[derive(Error, Debug)]
pub enum LabbookError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A store constraint rejected the write (duplicate key, row still referenced).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for LabbookError {
    fn from(e: sqlx::Error) -> Self {
        LabbookError::Database(e.to_string())
    }
}

/// Result type alias for labbook operations.
pub type Result<T> = std::result::Result<T, LabbookError>;
