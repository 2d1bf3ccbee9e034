//! Settings Models
//!
//! Application configuration: index, search and orchestration policies plus
//! the reasoning provider settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use mailpilot_llm::ProviderConfig;

/// Index cache policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPolicy {
    /// Maximum age of an index before it is rebuilt, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Documents per upsert call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between upsert batches, in milliseconds (0 disables pacing)
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
}

fn default_ttl_secs() -> u64 {
    2 * 60 * 60
}

fn default_batch_size() -> usize {
    500
}

fn default_batch_delay_ms() -> u64 {
    250
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
        }
    }
}

impl IndexPolicy {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Search and relevance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPolicy {
    /// Base URL of the external search index service (None = fallback only)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Bearer token for the search service
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-call timeout, in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    /// Results scoring below `factor * best` are dropped
    #[serde(default = "default_relevance_factor")]
    pub relevance_factor: f32,
    /// Limit used when the caller does not give one
    #[serde(default = "default_result_limit")]
    pub default_limit: usize,
    /// Largest accepted limit
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Snippet length for fallback results, in characters
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_search_timeout_secs() -> u64 {
    5
}

fn default_relevance_factor() -> f32 {
    0.8
}

fn default_result_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_snippet_chars() -> usize {
    200
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_secs: default_search_timeout_secs(),
            relevance_factor: default_relevance_factor(),
            default_limit: default_result_limit(),
            max_limit: default_max_limit(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl SearchPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Orchestration loop policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationPolicy {
    /// Absolute ceiling on planning iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Timeout for one planning call, in seconds
    #[serde(default = "default_reasoning_timeout_secs")]
    pub reasoning_timeout_secs: u64,
    /// Timeout for one operation call, in seconds
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    /// Budget for free-text previews sent to the reasoning service, in characters
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_max_iterations() -> u32 {
    5
}

fn default_reasoning_timeout_secs() -> u64 {
    60
}

fn default_operation_timeout_secs() -> u64 {
    30
}

fn default_preview_chars() -> usize {
    1500
}

impl Default for OrchestrationPolicy {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reasoning_timeout_secs: default_reasoning_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl OrchestrationPolicy {
    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Application configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub index: IndexPolicy,
    #[serde(default)]
    pub search: SearchPolicy,
    #[serde(default)]
    pub orchestration: OrchestrationPolicy,
    /// Reasoning service provider
    #[serde(default)]
    pub reasoning: ProviderConfig,
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub index_ttl_secs: Option<u64>,
    pub index_batch_size: Option<usize>,
    pub index_batch_delay_ms: Option<u64>,
    pub search_base_url: Option<String>,
    pub search_timeout_secs: Option<u64>,
    pub relevance_factor: Option<f32>,
    pub max_iterations: Option<u32>,
    pub reasoning_timeout_secs: Option<u64>,
    pub operation_timeout_secs: Option<u64>,
    pub preview_chars: Option<usize>,
    pub reasoning_model: Option<String>,
    pub reasoning_base_url: Option<String>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(ttl) = update.index_ttl_secs {
            self.index.ttl_secs = ttl;
        }
        if let Some(size) = update.index_batch_size {
            self.index.batch_size = size;
        }
        if let Some(delay) = update.index_batch_delay_ms {
            self.index.batch_delay_ms = delay;
        }
        if let Some(url) = update.search_base_url {
            self.search.base_url = if url.trim().is_empty() { None } else { Some(url) };
        }
        if let Some(timeout) = update.search_timeout_secs {
            self.search.timeout_secs = timeout;
        }
        if let Some(factor) = update.relevance_factor {
            self.search.relevance_factor = factor;
        }
        if let Some(max) = update.max_iterations {
            self.orchestration.max_iterations = max;
        }
        if let Some(timeout) = update.reasoning_timeout_secs {
            self.orchestration.reasoning_timeout_secs = timeout;
        }
        if let Some(timeout) = update.operation_timeout_secs {
            self.orchestration.operation_timeout_secs = timeout;
        }
        if let Some(chars) = update.preview_chars {
            self.orchestration.preview_chars = chars;
        }
        if let Some(model) = update.reasoning_model {
            self.reasoning.model = model;
        }
        if let Some(url) = update.reasoning_base_url {
            self.reasoning.base_url = if url.trim().is_empty() { None } else { Some(url) };
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.index.ttl_secs == 0 {
            return Err("index.ttl_secs must be at least 1".to_string());
        }
        if self.index.batch_size == 0 {
            return Err("index.batch_size must be at least 1".to_string());
        }

        let factor = self.search.relevance_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(format!(
                "Invalid relevance_factor: {}. Must be in (0, 1]",
                factor
            ));
        }
        if self.search.timeout_secs == 0 {
            return Err("search.timeout_secs must be at least 1".to_string());
        }
        if self.search.default_limit == 0 || self.search.default_limit > self.search.max_limit {
            return Err("search.default_limit must be between 1 and search.max_limit".to_string());
        }
        if let Some(url) = &self.search.base_url {
            url::Url::parse(url).map_err(|e| format!("Invalid search.base_url: {}", e))?;
        }

        if self.orchestration.max_iterations == 0 || self.orchestration.max_iterations > 50 {
            return Err("orchestration.max_iterations must be between 1 and 50".to_string());
        }
        if self.orchestration.reasoning_timeout_secs == 0
            || self.orchestration.operation_timeout_secs == 0
        {
            return Err("orchestration timeouts must be at least 1 second".to_string());
        }
        if self.orchestration.preview_chars < 100 {
            return Err("orchestration.preview_chars must be at least 100".to_string());
        }

        if self.reasoning.model.trim().is_empty() {
            return Err("reasoning.model must not be empty".to_string());
        }
        if let Some(url) = &self.reasoning.base_url {
            url::Url::parse(url).map_err(|e| format!("Invalid reasoning.base_url: {}", e))?;
        }

        Ok(())
    }
}
