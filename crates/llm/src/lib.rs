//! Mailpilot LLM
//!
//! Client side of the external reasoning service:
//! - `LlmProvider` trait (one planning call per orchestration iteration)
//! - OpenAI-compatible HTTP provider (function calling)
//! - request/response types and `LlmError`
//! - the shared HTTP client factory

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::*;
