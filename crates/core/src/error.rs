//! Core Error Types
//!
//! Defines the error taxonomy shared by every crate in the workspace.
//! These types only depend on thiserror + serde so that the provider
//! traits and operation contracts can be implemented without pulling in
//! storage or HTTP dependencies.
//!
//! The root crate extends this with storage-specific variants (`AppError`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, serializable error category.
///
/// Carried inside operation results and step records so that failures can
/// be reported to the caller (and to the reasoning service) without
/// carrying the full error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AuthenticationRequired,
    PermissionDenied,
    RecordNotFound,
    ValidationError,
    ExternalServiceUnavailable,
    MaxIterationsExceeded,
    FatalInternalError,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::AuthenticationRequired => "AuthenticationRequired",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::RecordNotFound => "RecordNotFound",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::ExternalServiceUnavailable => "ExternalServiceUnavailable",
            ErrorKind::MaxIterationsExceeded => "MaxIterationsExceeded",
            ErrorKind::FatalInternalError => "FatalInternalError",
        };
        f.write_str(s)
    }
}

impl ErrorKind {
    /// Authentication and permission failures. These end a multi-step
    /// session instead of being recorded as an ordinary failed step.
    pub fn is_access_failure(self) -> bool {
        matches!(self, ErrorKind::AuthenticationRequired | ErrorKind::PermissionDenied)
    }
}

/// Core error type for the mailpilot workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The request carried no identity
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The identity may not access the requested resource
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The requested record does not exist (or is not visible)
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Malformed arguments, queries or declarations
    #[error("Validation error: {0}")]
    Validation(String),

    /// Search index or reasoning service failed or timed out
    #[error("{service} unavailable: {message}")]
    ExternalServiceUnavailable { service: String, message: String },

    /// Iteration ceiling reached
    #[error("Maximum iterations ({0}) reached")]
    MaxIterationsExceeded(u32),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-recoverable internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a permission denied error
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Create a record not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::RecordNotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an external service unavailable error
    pub fn unavailable(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExternalServiceUnavailable {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map this error onto the stable taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AuthenticationRequired => ErrorKind::AuthenticationRequired,
            CoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CoreError::RecordNotFound(_) => ErrorKind::RecordNotFound,
            CoreError::Validation(_) | CoreError::Serialization(_) => ErrorKind::ValidationError,
            CoreError::ExternalServiceUnavailable { .. } => ErrorKind::ExternalServiceUnavailable,
            CoreError::MaxIterationsExceeded(_) => ErrorKind::MaxIterationsExceeded,
            CoreError::Io(_) | CoreError::Internal(_) => ErrorKind::FatalInternalError,
        }
    }

    /// Whether the caller should try a degraded path instead of failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CoreError::ExternalServiceUnavailable { .. })
    }

    /// A message that is safe to show to the end user.
    ///
    /// Internal details (I/O paths, SQL) are not exposed.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::AuthenticationRequired => "You must be signed in to do that.".to_string(),
            CoreError::PermissionDenied(_) => {
                "You do not have access to the requested email.".to_string()
            }
            CoreError::RecordNotFound(_) => "The requested email could not be found.".to_string(),
            CoreError::Validation(msg) => format!("Invalid request: {}", msg),
            CoreError::ExternalServiceUnavailable { service, .. } => {
                format!("The {} is temporarily unavailable.", service)
            }
            CoreError::MaxIterationsExceeded(n) => {
                format!("Stopped after {} planning rounds.", n)
            }
            CoreError::Io(_) | CoreError::Serialization(_) | CoreError::Internal(_) => {
                "An internal error occurred.".to_string()
            }
        }
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
