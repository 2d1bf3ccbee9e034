//! Search Service
//!
//! End-to-end search for one identity: load the indexable corpus, make sure
//! the collection is fresh, query the adapter, then apply the relevance
//! filter.
//!
//! Index passes only add or replace documents, so the collection can still
//! hold records that were trashed or whose mailbox is no longer shared.
//! Hits are checked against the current corpus before filtering.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mailpilot_core::data_provider::DataProvider;
use mailpilot_core::mail::{EmailRecord, Identity};
use mailpilot_core::CoreResult;

use super::adapter::{SearchIndexAdapter, SearchResult, SearchSource};
use super::relevance::{self, FilterReport};
use crate::models::settings::SearchPolicy;
use crate::services::index::{IndexCacheManager, IndexOutcome};

/// Filtered search results plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub report: FilterReport,
    pub source: SearchSource,
    pub index: IndexOutcome,
}

pub struct SearchService {
    provider: Arc<dyn DataProvider>,
    cache: Arc<IndexCacheManager>,
    adapter: Arc<SearchIndexAdapter>,
    policy: SearchPolicy,
}

impl SearchService {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        cache: Arc<IndexCacheManager>,
        adapter: Arc<SearchIndexAdapter>,
        policy: SearchPolicy,
    ) -> Self {
        Self {
            provider,
            cache,
            adapter,
            policy,
        }
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Search the identity's mail. `limit` defaults to the policy default.
    pub async fn search(
        &self,
        identity: &Identity,
        text: &str,
        limit: Option<usize>,
    ) -> CoreResult<SearchResponse> {
        let limit = limit.unwrap_or(self.policy.default_limit);
        self.adapter.validate_query(text, limit)?;

        let corpus = self.provider.list_indexable_records(identity).await?;
        let index = self.cache.ensure_fresh(identity, &corpus).await?;
        let outcome = self
            .adapter
            .query(identity, &index.collection_id, text, limit)
            .await?;
        let results = retain_current(outcome.results, &corpus);
        let filtered = relevance::filter(results, self.policy.relevance_factor)?;

        info!(
            user = %identity.user_id,
            source = ?outcome.source,
            kept = filtered.report.kept_count,
            dropped = filtered.report.dropped_count,
            reindexed = index.reindexed,
            "search: completed"
        );

        Ok(SearchResponse {
            results: filtered.kept,
            report: filtered.report,
            source: outcome.source,
            index,
        })
    }
}

/// Drop hits whose record is not in the identity's current corpus.
fn retain_current(results: Vec<SearchResult>, corpus: &[EmailRecord]) -> Vec<SearchResult> {
    let current: HashSet<&str> = corpus.iter().map(|r| r.id.as_str()).collect();
    let before = results.len();
    let kept: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| current.contains(r.record_id.as_str()))
        .collect();
    if kept.len() < before {
        debug!(stale = before - kept.len(), "search: dropped hits outside the current corpus");
    }
    kept
}
