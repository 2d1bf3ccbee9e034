//! Reasoning Service Types
//!
//! Request/response shapes exchanged with the external reasoning service,
//! provider configuration and the error type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mailpilot_core::error::CoreError;
use mailpilot_core::operation_trait::OperationDescriptor;

/// Default request timeout for reasoning calls, in seconds.
pub const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 60;

/// Configuration for a reasoning provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (None for unauthenticated local endpoints)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override of the provider's default endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier
    pub model: String,
    /// Maximum output tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional proxy URL (`http://`, `https://` or `socks5://`)
    #[serde(default)]
    pub proxy_url: Option<String>,
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    DEFAULT_REASONING_TIMEOUT_SECS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            proxy_url: None,
        }
    }
}

/// One planning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// Fixed planner instructions (system prompt)
    pub instructions: String,
    /// Operations the service may request
    pub operation_catalog: Vec<OperationDescriptor>,
    /// Rendered session context: original request plus accumulated steps
    pub context: String,
}

/// An operation requested by the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    /// Call id assigned by the service (or generated when parsed from text)
    pub id: String,
    /// Requested operation name
    pub name: String,
    /// Arguments as a JSON object
    pub arguments: Value,
}

/// Why the service stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    OperationCall,
    Other,
}

impl From<&str> for StopReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" | "end_turn" => StopReason::EndTurn,
            "length" | "max_tokens" => StopReason::MaxTokens,
            "tool_calls" | "function_call" | "tool_use" => StopReason::OperationCall,
            _ => StopReason::Other,
        }
    }
}

/// Token usage reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Planning response.
///
/// An empty `operation_calls` list means the service considers the
/// request complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    /// Free text (reasoning summary or prompt-format calls)
    pub content: Option<String>,
    /// Natively returned operation calls
    pub operation_calls: Vec<OperationCall>,
    pub stop_reason: StopReason,
    pub usage: UsageStats,
    pub model: String,
}

impl ReasoningResponse {
    /// A plain-text response with no operation calls.
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            operation_calls: Vec::new(),
            stop_reason: StopReason::EndTurn,
            usage: UsageStats::default(),
            model: model.into(),
        }
    }

    /// A response requesting the given operations.
    pub fn with_calls(calls: Vec<OperationCall>, model: impl Into<String>) -> Self {
        Self {
            content: None,
            operation_calls: calls,
            stop_reason: StopReason::OperationCall,
            usage: UsageStats::default(),
            model: model.into(),
        }
    }

    pub fn has_operation_calls(&self) -> bool {
        !self.operation_calls.is_empty()
    }
}

/// Errors from the reasoning service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// Authentication failed (invalid or missing API key)
    AuthenticationFailed { message: String },
    /// Rate limit exceeded
    RateLimited {
        message: String,
        retry_after: Option<u32>,
    },
    /// Model not found or not available
    ModelNotFound { model: String },
    /// Invalid request (bad parameters)
    InvalidRequest { message: String },
    /// Server error from the provider
    ServerError {
        message: String,
        status: Option<u16>,
    },
    /// Network/connection error
    NetworkError { message: String },
    /// Call exceeded its deadline
    Timeout { seconds: u64 },
    /// Response parsing error
    ParseError { message: String },
    /// Provider not available
    ProviderUnavailable { message: String },
    /// Other error
    Other { message: String },
}

impl LlmError {
    /// Whether the failure is a connectivity problem (as opposed to a
    /// malformed request or response).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::ServerError { .. }
                | LlmError::NetworkError { .. }
                | LlmError::Timeout { .. }
                | LlmError::ProviderUnavailable { .. }
        )
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::AuthenticationFailed { message } => {
                write!(f, "Authentication failed: {}", message)
            }
            LlmError::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            LlmError::ModelNotFound { model } => write!(f, "Model not found: {}", model),
            LlmError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            LlmError::ServerError { message, status } => match status {
                Some(s) => write!(f, "Server error ({}): {}", s, message),
                None => write!(f, "Server error: {}", message),
            },
            LlmError::NetworkError { message } => write!(f, "Network error: {}", message),
            LlmError::Timeout { seconds } => write!(f, "Timed out after {}s", seconds),
            LlmError::ParseError { message } => write!(f, "Parse error: {}", message),
            LlmError::ProviderUnavailable { message } => {
                write!(f, "Provider unavailable: {}", message)
            }
            LlmError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Every reasoning-service failure surfaces as the service being unavailable.
impl From<LlmError> for CoreError {
    fn from(err: LlmError) -> Self {
        CoreError::unavailable("reasoning service", err.to_string())
    }
}

/// Result type for reasoning calls
pub type LlmResult<T> = Result<T, LlmError>;
