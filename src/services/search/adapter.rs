//! Search Index Adapter
//!
//! Pushes documents to the external search service and queries it, with a
//! short timeout on every call. When the service is unavailable (error or
//! timeout) queries fall back to attribute/substring matching through the
//! Data Provider. The fallback builds a `RecordQuery` whose limit is the
//! terminal step, so permission and state filters always run first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mailpilot_core::data_provider::{DataProvider, RecordQuery};
use mailpilot_core::mail::{EmailRecord, Identity};
use mailpilot_core::{CoreError, CoreResult};

use crate::models::settings::SearchPolicy;

/// Service name used in unavailability errors.
pub const SEARCH_SERVICE: &str = "search index";

/// Document pushed to the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    pub title: String,
    pub sender: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl From<&EmailRecord> for SearchDocument {
    fn from(record: &EmailRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.subject.clone(),
            sender: record.sender.clone(),
            body: record.body.clone(),
            thread_id: record.thread_id.clone(),
        }
    }
}

/// One scored hit. Scores are normalized into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record_id: String,
    pub relevance_score: f32,
    pub snippet: String,
}

/// Where a result set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Index,
    Fallback,
}

/// Results of one adapter query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub source: SearchSource,
}

/// External full-text/semantic search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Insert or replace documents in a collection.
    async fn upsert(&self, collection_id: &str, documents: &[SearchDocument]) -> CoreResult<()>;

    /// Scored query. Scores may be unnormalized; the adapter clamps them.
    async fn query(
        &self,
        collection_id: &str,
        text: &str,
        limit: usize,
    ) -> CoreResult<Vec<SearchResult>>;
}

/// Adapter over an optional search backend with a Data Provider fallback.
pub struct SearchIndexAdapter {
    backend: Option<Arc<dyn SearchBackend>>,
    provider: Arc<dyn DataProvider>,
    policy: SearchPolicy,
}

impl SearchIndexAdapter {
    pub fn new(
        backend: Option<Arc<dyn SearchBackend>>,
        provider: Arc<dyn DataProvider>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            backend,
            provider,
            policy,
        }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Push records into a collection. A no-op without a backend.
    pub async fn upsert(&self, collection_id: &str, records: &[EmailRecord]) -> CoreResult<()> {
        let Some(backend) = &self.backend else {
            debug!(collection = %collection_id, "search adapter: no backend configured, skipping upsert");
            return Ok(());
        };
        let documents: Vec<SearchDocument> = records.iter().map(SearchDocument::from).collect();
        with_timeout(self.policy.timeout(), backend.upsert(collection_id, &documents)).await
    }

    /// Check query text and limit.
    pub fn validate_query(&self, text: &str, limit: usize) -> CoreResult<()> {
        if text.trim().is_empty() {
            return Err(CoreError::validation("query text must not be empty"));
        }
        if limit == 0 {
            return Err(CoreError::validation("limit must be at least 1"));
        }
        if limit > self.policy.max_limit {
            return Err(CoreError::validation(format!(
                "limit {} exceeds the maximum of {}",
                limit, self.policy.max_limit
            )));
        }
        Ok(())
    }

    /// Query the index, falling back to the Data Provider when it is unavailable.
    ///
    /// Results are sorted by descending score and hold at most `limit` entries.
    pub async fn query(
        &self,
        identity: &Identity,
        collection_id: &str,
        text: &str,
        limit: usize,
    ) -> CoreResult<SearchOutcome> {
        self.validate_query(text, limit)?;

        if let Some(backend) = &self.backend {
            match with_timeout(self.policy.timeout(), backend.query(collection_id, text, limit)).await
            {
                Ok(raw) => {
                    let results = normalize(raw, limit);
                    info!(
                        user = %identity.user_id,
                        backend = backend.name(),
                        results = results.len(),
                        "search adapter: index query served"
                    );
                    return Ok(SearchOutcome {
                        results,
                        source: SearchSource::Index,
                    });
                }
                Err(e) if e.is_unavailable() => {
                    warn!(
                        user = %identity.user_id,
                        backend = backend.name(),
                        error = %e,
                        "search adapter: index unavailable, using fallback"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let results = self.fallback_query(identity, text, limit).await?;
        Ok(SearchOutcome {
            results,
            source: SearchSource::Fallback,
        })
    }

    /// Attribute/substring search through the Data Provider.
    ///
    /// Candidates are fetched with every filter applied before the bound,
    /// then scored by term overlap. Archived mail is included, matching the
    /// indexable corpus, so both paths search the same record set.
    pub async fn fallback_query(
        &self,
        identity: &Identity,
        text: &str,
        limit: usize,
    ) -> CoreResult<Vec<SearchResult>> {
        let window = limit.max(self.policy.max_limit);
        let query = RecordQuery::new()
            .text(text)
            .include_archived(true)
            .limit(window);
        let terms = query.filter().terms();
        let candidates = self.provider.search_records(identity, query).await?;

        let scored: Vec<SearchResult> = candidates
            .iter()
            .map(|record| SearchResult {
                record_id: record.id.clone(),
                relevance_score: term_overlap(&terms, record),
                snippet: record.preview(self.policy.snippet_chars),
            })
            .collect();

        let results = normalize(scored, limit);
        info!(
            user = %identity.user_id,
            candidates = candidates.len(),
            results = results.len(),
            "search adapter: fallback query served"
        );
        Ok(results)
    }
}

/// Fraction of query terms found in subject, sender or body.
fn term_overlap(terms: &[String], record: &EmailRecord) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let haystack = format!(
        "{}\n{}\n{}",
        record.subject.to_lowercase(),
        record.sender.to_lowercase(),
        record.body.to_lowercase()
    );
    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}

/// Clamp scores into [0, 1], sort descending (stable), truncate to `limit`.
fn normalize(mut results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    for r in &mut results {
        r.relevance_score = if r.relevance_score.is_nan() {
            0.0
        } else {
            r.relevance_score.clamp(0.0, 1.0)
        };
    }
    results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    results.truncate(limit);
    results
}

/// Run a backend call under a deadline; a timeout is an unavailability.
async fn with_timeout<T, F>(timeout: Duration, fut: F) -> CoreResult<T>
where
    F: std::future::Future<Output = CoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::unavailable(
            SEARCH_SERVICE,
            format!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}
