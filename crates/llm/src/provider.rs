//! Reasoning Provider Trait
//!
//! Defines the common interface for reasoning-service providers.

use async_trait::async_trait;

use super::types::{LlmError, LlmResult, ProviderConfig, ReasoningRequest, ReasoningResponse};

/// Trait that all reasoning providers must implement.
///
/// The orchestration loop only needs one call per iteration: send the
/// instructions, catalog and context, get back zero or more operation calls.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the provider name for identification.
    fn name(&self) -> &'static str;

    /// Returns the current model being used.
    fn model(&self) -> &str;

    /// Whether the provider returns operation calls natively. Providers that
    /// do not are prompted with the text call format instead.
    fn supports_native_calls(&self) -> bool {
        true
    }

    /// Ask the service which operations to run next.
    async fn plan(&self, request: ReasoningRequest) -> LlmResult<ReasoningResponse>;

    /// Check if the provider is healthy and reachable.
    async fn health_check(&self) -> LlmResult<()>;

    /// Get the configuration for this provider.
    fn config(&self) -> &ProviderConfig;
}

/// Helper function to create an error for missing API key
pub fn missing_api_key_error(provider: &str) -> LlmError {
    LlmError::AuthenticationFailed {
        message: format!("API key not configured for {}", provider),
    }
}

/// Helper function to parse HTTP error status codes
pub fn parse_http_error(status: u16, body: &str, provider: &str) -> LlmError {
    match status {
        401 => LlmError::AuthenticationFailed {
            message: format!("{}: Invalid API key", provider),
        },
        403 => LlmError::AuthenticationFailed {
            message: format!("{}: Access denied", provider),
        },
        404 => LlmError::ModelNotFound {
            model: body.to_string(),
        },
        408 | 504 => LlmError::NetworkError {
            message: format!("{}: gateway timeout", provider),
        },
        429 => LlmError::RateLimited {
            message: body.to_string(),
            retry_after: None,
        },
        400 => LlmError::InvalidRequest {
            message: body.to_string(),
        },
        500..=599 => LlmError::ServerError {
            message: body.to_string(),
            status: Some(status),
        },
        _ => LlmError::Other {
            message: format!("HTTP {}: {}", status, body),
        },
    }
}
