//! Error Handling
//!
//! Storage-level error type for the application crate.
//! Uses thiserror for ergonomic error definitions.

use mailpilot_core::CoreError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors (pool, schema, corrupt rows)
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Errors from the shared taxonomy
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        Self::Database(format!("Failed to get connection: {}", err))
    }
}

/// Map storage failures onto the shared taxonomy at the provider boundary.
impl From<AppError> for CoreError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Core(inner) => inner,
            AppError::Validation(msg) | AppError::Config(msg) => CoreError::validation(msg),
            AppError::NotFound(msg) => CoreError::not_found(msg),
            AppError::Io(e) => CoreError::Io(e),
            AppError::Serialization(e) => CoreError::internal(format!("stored data is corrupt: {}", e)),
            other => CoreError::internal(other.to_string()),
        }
    }
}

/// Convert AppError to a string for embedding applications
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
