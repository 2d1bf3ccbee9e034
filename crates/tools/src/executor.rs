//! Operation Result Types
//!
//! The uniform result every operation invocation produces, whether the body
//! ran or the call was rejected before it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mailpilot_core::error::{CoreError, ErrorKind};

/// Normalized failure of an operation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl OperationFailure {
    /// Normalize a `CoreError`. Internal failures carry the user-safe text.
    pub fn from_error(err: &CoreError) -> Self {
        let message = match err.kind() {
            ErrorKind::FatalInternalError => err.user_message(),
            _ => err.to_string(),
        };
        Self {
            kind: err.kind(),
            message,
        }
    }
}

/// Result of an operation execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Payload (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Failure (if not successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationFailure>,
    /// Wall-clock time of the call
    pub duration_ms: u64,
}

impl OperationResult {
    /// Create a successful result
    pub fn ok(payload: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
            duration_ms,
        }
    }

    /// Create an error result
    pub fn err(kind: ErrorKind, message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(OperationFailure {
                kind,
                message: message.into(),
            }),
            duration_ms,
        }
    }

    /// Create an error result from a `CoreError`
    pub fn from_error(err: &CoreError, duration_ms: u64) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(OperationFailure::from_error(err)),
            duration_ms,
        }
    }

    /// Failure category, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Convert to string for the reasoning service
    pub fn to_content(&self) -> String {
        if self.success {
            match &self.payload {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            }
        } else {
            match &self.error {
                Some(e) => format!("Error ({}): {}", e.kind, e.message),
                None => "Error: Unknown error".to_string(),
            }
        }
    }
}
