//! OpenAI-Compatible Provider
//!
//! Implementation of the LlmProvider trait for OpenAI's chat completions API
//! and compatible endpoints. Operations are offered as function tools.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::provider::{missing_api_key_error, parse_http_error, LlmProvider};
use super::types::{
    LlmError, LlmResult, OperationCall, ProviderConfig, ReasoningRequest, ReasoningResponse,
    StopReason, UsageStats,
};
use crate::http_client::build_http_client;
use mailpilot_core::operation_trait::OperationDescriptor;

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI provider
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    endpoint: Url,
}

impl OpenAIProvider {
    /// Create a new provider. Fails on a malformed base URL or proxy.
    pub fn new(config: ProviderConfig) -> LlmResult<Self> {
        let endpoint = Url::parse(config.base_url.as_deref().unwrap_or(OPENAI_API_URL)).map_err(
            |e| LlmError::InvalidRequest {
                message: format!("invalid base URL: {}", e),
            },
        )?;
        let client = build_http_client(
            Duration::from_secs(config.timeout_secs),
            config.proxy_url.as_deref(),
        )
        .map_err(|e| LlmError::ProviderUnavailable {
            message: format!("failed to build HTTP client: {}", e),
        })?;
        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    /// Sibling `models` endpoint of the chat completions URL.
    fn models_url(&self) -> LlmResult<Url> {
        self.endpoint
            .join("../models")
            .map_err(|e| LlmError::InvalidRequest {
                message: format!("invalid models URL: {}", e),
            })
    }

    /// Build the request body for the API
    fn build_request_body(&self, request: &ReasoningRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "stream": false,
            "messages": [
                { "role": "system", "content": request.instructions },
                { "role": "user", "content": request.context },
            ],
        });

        if !request.operation_catalog.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .operation_catalog
                .iter()
                .map(|op| self.operation_to_openai(op))
                .collect();
            body["tools"] = serde_json::json!(tools);
        }

        body
    }

    /// Convert an operation descriptor to an OpenAI function tool
    fn operation_to_openai(&self, op: &OperationDescriptor) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": op.name,
                "description": op.description,
                "parameters": op.input_schema
            }
        })
    }

    /// Parse a response from OpenAI API
    fn parse_response(&self, response: &OpenAIResponse) -> ReasoningResponse {
        let choice = response.choices.first();

        let mut content = None;
        let mut operation_calls = Vec::new();

        if let Some(msg) = choice.and_then(|c| c.message.as_ref()) {
            content = msg.content.clone();
            for tc in msg.tool_calls.iter().flatten() {
                // Unparsable arguments are kept as a string so the executor
                // rejects them as a validation failure on that step.
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| serde_json::Value::String(tc.function.arguments.clone()));
                operation_calls.push(OperationCall {
                    id: tc.id.clone(),
                    name: tc.function.name.clone(),
                    arguments,
                });
            }
        }

        let stop_reason = choice
            .and_then(|c| c.finish_reason.as_ref())
            .map(|r| StopReason::from(r.as_str()))
            .unwrap_or(StopReason::EndTurn);

        let usage = response
            .usage
            .as_ref()
            .map(|u| UsageStats {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        ReasoningResponse {
            content,
            operation_calls,
            stop_reason,
            usage,
            model: response.model.clone(),
        }
    }

    fn network_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                seconds: self.config.timeout_secs,
            }
        } else {
            LlmError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn plan(&self, request: ReasoningRequest) -> LlmResult<ReasoningResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let body = self.build_request_body(&request);
        debug!(
            model = %self.config.model,
            operations = request.operation_catalog.len(),
            context_chars = request.context.len(),
            "openai: sending planning request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| self.network_error(e))?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text, "openai"));
        }

        let openai_response: OpenAIResponse =
            serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(self.parse_response(&openai_response))
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| missing_api_key_error("openai"))?;

        let response = self
            .client
            .get(self.models_url()?)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status().as_u16();
        if status == 200 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(parse_http_error(status, &body, "openai"))
        }
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
