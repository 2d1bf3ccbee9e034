//! Index Cache Manager
//!
//! Keeps each user's search collection in step with their mail corpus.
//! A reindex happens when there is no prior index, when the corpus
//! fingerprint changed, or when the last pass is older than the TTL.
//!
//! All per-user work runs under a per-user async mutex so concurrent
//! requests for the same user never create two collections or interleave
//! two index passes. Different users proceed independently.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mailpilot_core::mail::{EmailRecord, Identity};
use mailpilot_core::{CoreError, CoreResult};

use super::collection_store::CollectionStore;
use super::fingerprint::{canonical_ids, fingerprint};
use crate::models::settings::IndexPolicy;
use crate::services::search::adapter::SearchIndexAdapter;

/// Why an index pass was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexReason {
    NoPriorIndex,
    FingerprintChanged,
    Expired,
    /// Persisted state could not be read
    UnreadableState,
}

/// Result of `ensure_fresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub collection_id: String,
    pub reindexed: bool,
    /// Why a pass was due; also set when the pass did not complete
    pub reason: Option<ReindexReason>,
    pub documents_upserted: usize,
    pub batches: usize,
    /// Set when pushing documents failed; the previous state is kept
    pub upsert_error: Option<String>,
}

pub struct IndexCacheManager {
    store: CollectionStore,
    adapter: Arc<SearchIndexAdapter>,
    policy: IndexPolicy,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IndexCacheManager {
    pub fn new(store: CollectionStore, adapter: Arc<SearchIndexAdapter>, policy: IndexPolicy) -> Self {
        Self {
            store,
            adapter,
            policy,
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &IndexPolicy {
        &self.policy
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Return the user's collection id, creating it on first use.
    pub async fn ensure_collection(&self, user_id: &str) -> CoreResult<String> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        Ok(self.store.ensure(user_id)?)
    }

    /// Decide whether the given corpus needs a new index pass at `now`.
    ///
    /// Unreadable state is logged and treated as needing a reindex.
    pub fn reindex_reason(
        &self,
        user_id: &str,
        records: &[EmailRecord],
        now: DateTime<Utc>,
    ) -> Option<ReindexReason> {
        let state = match self.store.load(user_id) {
            Ok(state) => state,
            Err(e) => {
                warn!(user = %user_id, error = %e, "index cache: unreadable state, forcing reindex");
                return Some(ReindexReason::UnreadableState);
            }
        };
        let Some(state) = state else {
            return Some(ReindexReason::NoPriorIndex);
        };
        let (Some(stored), Some(indexed_at)) = (state.fingerprint, state.last_indexed_at) else {
            return Some(ReindexReason::NoPriorIndex);
        };
        if stored != fingerprint(records.iter().map(|r| r.id.as_str())) {
            return Some(ReindexReason::FingerprintChanged);
        }
        if now - indexed_at > self.policy.ttl() {
            return Some(ReindexReason::Expired);
        }
        None
    }

    pub fn needs_reindex(&self, user_id: &str, records: &[EmailRecord]) -> bool {
        self.reindex_reason(user_id, records, Utc::now()).is_some()
    }

    /// Persist a successful pass over `records`.
    pub async fn record_indexed(
        &self,
        user_id: &str,
        collection_id: &str,
        records: &[EmailRecord],
        indexed_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.persist(user_id, collection_id, records, indexed_at)
    }

    fn persist(
        &self,
        user_id: &str,
        collection_id: &str,
        records: &[EmailRecord],
        indexed_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let ids = canonical_ids(records.iter().map(|r| r.id.as_str()));
        let fp = fingerprint(ids.iter().map(String::as_str));
        self.store
            .record_indexed(user_id, collection_id, &fp, &ids, indexed_at)?;
        Ok(())
    }

    /// Make sure the user's collection reflects `records`.
    ///
    /// Documents are pushed in batches of `batch_size` with `batch_delay`
    /// between them. State is only persisted after every batch succeeded;
    /// an upsert failure is reported in the outcome and the next call
    /// retries. Without a configured backend no pass runs and the stored
    /// state is left as it was.
    pub async fn ensure_fresh(
        &self,
        identity: &Identity,
        records: &[EmailRecord],
    ) -> CoreResult<IndexOutcome> {
        let user_id = identity.user_id.as_str();
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let collection_id = self.store.ensure(user_id)?;
        let Some(reason) = self.reindex_reason(user_id, records, Utc::now()) else {
            debug!(user = %user_id, collection = %collection_id, "index cache: fresh");
            return Ok(IndexOutcome {
                collection_id,
                reindexed: false,
                reason: None,
                documents_upserted: 0,
                batches: 0,
                upsert_error: None,
            });
        };

        // Without a backend nothing is pushed, so nothing may be recorded as indexed
        if !self.adapter.has_backend() {
            debug!(
                user = %user_id,
                collection = %collection_id,
                reason = ?reason,
                "index cache: no search backend, state left untouched"
            );
            return Ok(IndexOutcome {
                collection_id,
                reindexed: false,
                reason: Some(reason),
                documents_upserted: 0,
                batches: 0,
                upsert_error: None,
            });
        }

        info!(
            user = %user_id,
            collection = %collection_id,
            records = records.len(),
            reason = ?reason,
            "index cache: reindexing"
        );

        let batch_size = self.policy.batch_size.max(1);
        let mut upserted = 0;
        let mut batches = 0;
        for (i, chunk) in records.chunks(batch_size).enumerate() {
            if i > 0 && self.policy.batch_delay_ms > 0 {
                tokio::time::sleep(self.policy.batch_delay()).await;
            }
            if let Err(e) = self.adapter.upsert(&collection_id, chunk).await {
                warn!(
                    user = %user_id,
                    collection = %collection_id,
                    batch = i,
                    error = %e,
                    "index cache: upsert failed, keeping previous state"
                );
                return Ok(IndexOutcome {
                    collection_id,
                    reindexed: false,
                    reason: Some(reason),
                    documents_upserted: upserted,
                    batches,
                    upsert_error: Some(e.to_string()),
                });
            }
            upserted += chunk.len();
            batches += 1;
        }

        self.persist(user_id, &collection_id, records, Utc::now())?;
        info!(
            user = %user_id,
            collection = %collection_id,
            documents = upserted,
            batches,
            "index cache: reindex complete"
        );

        Ok(IndexOutcome {
            collection_id,
            reindexed: true,
            reason: Some(reason),
            documents_upserted: upserted,
            batches,
            upsert_error: None,
        })
    }

    /// Drop the user's persisted state. Returns whether anything existed.
    pub async fn reset_collection(&self, user_id: &str) -> CoreResult<bool> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        let removed = self.store.delete(user_id)?;
        if removed {
            info!(user = %user_id, "index cache: collection reset");
        }
        Ok(removed)
    }

    /// Collection id if one exists, without creating it.
    pub fn existing_collection(&self, user_id: &str) -> CoreResult<Option<String>> {
        self.store
            .load(user_id)
            .map(|s| s.map(|c| c.collection_id))
            .map_err(CoreError::from)
    }
}
