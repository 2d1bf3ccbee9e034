//! Index Cache Integration Tests
//!
//! Collection lifecycle against a real SQLite database:
//! - one collection per user under concurrent first access
//! - state survives reopening the database file
//! - fingerprint, TTL and failed-upsert handling

use std::sync::Arc;

use chrono::{Duration, Utc};

use mailpilot::models::settings::{IndexPolicy, SearchPolicy};
use mailpilot::services::index::{CollectionStore, IndexCacheManager, ReindexReason};
use mailpilot::services::search::{SearchBackend, SearchIndexAdapter};
use mailpilot::storage::Database;
use mailpilot_core::mail::MailFlags;

use crate::support::{Fixture, MemoryBackend, ScriptedReasoner};

fn cache_manager(fx: &Fixture, backend: Arc<MemoryBackend>) -> Arc<IndexCacheManager> {
    let adapter = Arc::new(SearchIndexAdapter::new(
        Some(backend as Arc<dyn SearchBackend>),
        fx.provider(),
        SearchPolicy::default(),
    ));
    Arc::new(IndexCacheManager::new(
        CollectionStore::new(fx.db.pool().clone()),
        adapter,
        IndexPolicy {
            batch_size: 2,
            batch_delay_ms: 0,
            ..IndexPolicy::default()
        },
    ))
}

// ============================================================================
// Collection creation
// ============================================================================

#[tokio::test]
async fn test_concurrent_first_access_creates_one_collection() {
    let fx = Fixture::new();
    let cache = cache_manager(&fx, MemoryBackend::new());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.ensure_collection("alice").await.unwrap()
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }

    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller must see the same collection");
    let store = CollectionStore::new(fx.db.pool().clone());
    assert_eq!(store.count_for_user("alice").unwrap(), 1);
}

#[tokio::test]
async fn test_collections_are_per_user() {
    let fx = Fixture::new();
    let cache = cache_manager(&fx, MemoryBackend::new());

    let alice = cache.ensure_collection("alice").await.unwrap();
    let bob = cache.ensure_collection("bob").await.unwrap();
    assert_ne!(alice, bob);
    assert_eq!(cache.ensure_collection("alice").await.unwrap(), alice);
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_index_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mail.db");
    let backend = MemoryBackend::new();
    let config = Fixture::config();

    let collection_id = {
        let mut fx = Fixture::with_database(Database::open(&path).unwrap());
        fx.add("r1", "carol@example.com", "Budget review", "Numbers for Q3");
        fx.add("r2", "dave@example.com", "Offsite", "Agenda for the offsite");
        let assistant = fx.assistant(&config, Some(backend.clone()), ScriptedReasoner::new(vec![]));

        let first = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();
        assert!(first.index.reindexed);
        first.index.collection_id
    };
    let upserts = backend.upserts();
    assert!(upserts > 0);

    // The reopened fixture adds an empty mailbox; the corpus is unchanged.
    let fx = Fixture::with_database(Database::open(&path).unwrap());
    let assistant = fx.assistant(&config, Some(backend.clone()), ScriptedReasoner::new(vec![]));
    let second = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();

    assert!(!second.index.reindexed);
    assert_eq!(second.index.collection_id, collection_id);
    assert_eq!(backend.upserts(), upserts);
    assert_eq!(second.results[0].record_id, "r1");
}

// ============================================================================
// Invalidation
// ============================================================================

#[tokio::test]
async fn test_new_record_changes_fingerprint() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget review", "Numbers for Q3");
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let first = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert_eq!(first.reason, Some(ReindexReason::NoPriorIndex));

    fx.add("r2", "dave@example.com", "Budget follow-up", "Revised numbers");
    let second = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(second.reindexed);
    assert_eq!(second.reason, Some(ReindexReason::FingerprintChanged));
    assert_eq!(backend.document_count(&second.collection_id), 2);
}

#[tokio::test]
async fn test_removed_record_triggers_exactly_one_reindex() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget review", "Budget numbers for Q3");
    fx.add("r2", "dave@example.com", "Budget follow-up", "Revised budget");
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let first = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert_eq!(first.reason, Some(ReindexReason::NoPriorIndex));
    assert_eq!(backend.upserts(), 1);

    fx.store
        .set_flags(
            "r2",
            MailFlags {
                trashed: true,
                ..MailFlags::default()
            },
        )
        .unwrap();

    let second = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(second.reindexed);
    assert_eq!(second.reason, Some(ReindexReason::FingerprintChanged));
    assert_eq!(second.documents_upserted, 1);

    let third = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(!third.reindexed);
    assert_eq!(third.reason, None);
    assert_eq!(backend.upserts(), 2);

    let response = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert!(!response.index.reindexed);
    let ids: Vec<&str> = response.results.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids, vec!["r1"]);
}

#[tokio::test]
async fn test_ttl_expiry_forces_reindex() {
    let mut fx = Fixture::new();
    let record = fx.add("r1", "carol@example.com", "Budget review", "Numbers for Q3");
    let cache = cache_manager(&fx, MemoryBackend::new());

    let outcome = cache.ensure_fresh(&fx.alice, &[record.clone()]).await.unwrap();
    assert!(outcome.reindexed);
    assert!(!cache.needs_reindex("alice", &[record.clone()]));

    let ttl = cache.policy().ttl();
    let within = Utc::now() + ttl - Duration::minutes(1);
    let beyond = Utc::now() + ttl + Duration::minutes(1);
    assert_eq!(cache.reindex_reason("alice", &[record.clone()], within), None);
    assert_eq!(
        cache.reindex_reason("alice", &[record], beyond),
        Some(ReindexReason::Expired)
    );
}

#[tokio::test]
async fn test_batches_follow_policy() {
    let mut fx = Fixture::new();
    for i in 0..5 {
        fx.add(&format!("r{}", i), "carol@example.com", "Status", "Weekly status");
    }
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let outcome = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert_eq!(outcome.documents_upserted, 5);
    assert_eq!(outcome.batches, 3);
    assert_eq!(backend.upserts(), 3);
}

#[tokio::test]
async fn test_failed_upsert_keeps_state_and_retries() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget review", "Numbers for Q3");
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    backend.set_unavailable(true);
    let degraded = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert!(!degraded.index.reindexed);
    assert!(degraded.index.upsert_error.is_some());
    assert_eq!(degraded.results[0].record_id, "r1");

    backend.set_unavailable(false);
    let recovered = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(recovered.reindexed);
    assert_eq!(recovered.reason, Some(ReindexReason::NoPriorIndex));
}

#[tokio::test]
async fn test_reset_forces_rebuild() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget review", "Numbers for Q3");
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(assistant.reset_index(Some(&fx.alice)).await.unwrap());
    assert!(!assistant.reset_index(Some(&fx.alice)).await.unwrap());

    let rebuilt = assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    assert!(rebuilt.reindexed);
    assert_eq!(rebuilt.reason, Some(ReindexReason::NoPriorIndex));
}
