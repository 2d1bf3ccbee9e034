//! HTTP Search Backend
//!
//! JSON-over-HTTP client for an external search index service:
//!
//! - `POST {base}/collections/{id}/documents` with `{"documents": [...]}`
//! - `POST {base}/collections/{id}/query` with `{"query": "...", "limit": n}`
//!   answering `{"results": [{"id", "score", "snippet"}]}`

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use mailpilot_core::{CoreError, CoreResult};
use mailpilot_llm::build_http_client;

use super::adapter::{SearchBackend, SearchDocument, SearchResult, SEARCH_SERVICE};
use crate::models::settings::SearchPolicy;

pub struct HttpSearchBackend {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryHit>,
}

#[derive(Debug, Deserialize)]
struct QueryHit {
    id: String,
    score: f32,
    #[serde(default)]
    snippet: String,
}

impl HttpSearchBackend {
    pub fn new(base_url: &str, api_key: Option<String>, policy: &SearchPolicy) -> CoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CoreError::validation(format!("invalid search base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CoreError::validation(format!(
                "search base URL cannot be a base: {}",
                base_url
            )));
        }
        let client = build_http_client(policy.timeout(), None).map_err(|e| {
            CoreError::unavailable(SEARCH_SERVICE, format!("failed to build HTTP client: {}", e))
        })?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Build from policy; None when no base URL is configured.
    pub fn from_policy(policy: &SearchPolicy) -> CoreResult<Option<Self>> {
        match policy.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Self::new(url, policy.api_key.clone(), policy).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn collection_url(&self, collection_id: &str, action: &str) -> CoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::internal("search base URL cannot be a base"))?
            .pop_if_empty()
            .extend(["collections", collection_id, action]);
        Ok(url)
    }

    async fn post(&self, url: Url, body: serde_json::Value) -> CoreResult<String> {
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        let response = request
            .send()
            .await
            .map_err(|e| CoreError::unavailable(SEARCH_SERVICE, e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CoreError::unavailable(SEARCH_SERVICE, e.to_string()))?;
        if (200..300).contains(&status) {
            Ok(text)
        } else {
            Err(status_error(status, &text))
        }
    }
}

/// Map an HTTP status to the error taxonomy.
fn status_error(status: u16, body: &str) -> CoreError {
    let detail = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
    match status {
        400 | 422 => CoreError::validation(format!("search request rejected: {}", detail)),
        _ => CoreError::unavailable(SEARCH_SERVICE, detail),
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn upsert(&self, collection_id: &str, documents: &[SearchDocument]) -> CoreResult<()> {
        let url = self.collection_url(collection_id, "documents")?;
        debug!(collection = %collection_id, documents = documents.len(), "search http: upsert");
        self.post(url, serde_json::json!({ "documents": documents }))
            .await
            .map(|_| ())
    }

    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        limit: usize,
    ) -> CoreResult<Vec<SearchResult>> {
        let url = self.collection_url(collection_id, "query")?;
        let body = self
            .post(url, serde_json::json!({ "query": text, "limit": limit }))
            .await?;
        let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| {
            CoreError::unavailable(SEARCH_SERVICE, format!("unreadable query response: {}", e))
        })?;
        Ok(parsed
            .results
            .into_iter()
            .map(|hit| SearchResult {
                record_id: hit.id,
                relevance_score: hit.score,
                snippet: hit.snippet,
            })
            .collect())
    }
}
