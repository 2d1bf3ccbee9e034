//! Search Integration Tests
//!
//! End-to-end search through the assistant:
//! - first query reindexes, repeated query within the TTL does not
//! - relevance filtering against the best score
//! - fallback to the mail store when the index is unavailable
//! - access control and filter-before-limit in the fallback path

use mailpilot::services::index::ReindexReason;
use mailpilot::services::search::SearchSource;
use mailpilot_core::data_provider::{DataProvider, RecordQuery};
use mailpilot_core::mail::MailFlags;
use mailpilot_core::ErrorKind;

use crate::support::{Fixture, MemoryBackend, ScriptedReasoner};

fn seed_budget_mail(fx: &mut Fixture) {
    fx.add("r1", "carol@example.com", "Q3 budget", "Final budget numbers");
    fx.add("r2", "dave@example.com", "Budget questions", "Two budget questions");
    fx.add("r3", "erin@example.com", "Re: budget", "Budget looks fine");
    fx.add("r4", "frank@example.com", "Planning", "Budget planning notes");
    fx.add("r5", "gina@example.com", "Misc", "Mentions the budget once");
    fx.add("r6", "hank@example.com", "Lunch", "Tacos on Friday");
}

fn pin_scores(backend: &MemoryBackend) {
    backend.pin_score("r1", 0.92);
    backend.pin_score("r2", 0.88);
    backend.pin_score("r3", 0.75);
    backend.pin_score("r4", 0.70);
    backend.pin_score("r5", 0.40);
}

// ============================================================================
// Index path
// ============================================================================

#[tokio::test]
async fn test_first_query_reindexes_and_filters() {
    let mut fx = Fixture::new();
    seed_budget_mail(&mut fx);
    let backend = MemoryBackend::new();
    pin_scores(&backend);
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let response = assistant.search(Some(&fx.alice), "budget", Some(4)).await.unwrap();

    assert!(response.index.reindexed);
    assert_eq!(response.index.documents_upserted, 6);
    assert_eq!(response.source, SearchSource::Index);
    assert!(response.results.len() <= 4);

    let ids: Vec<&str> = response.results.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
    assert!((response.report.threshold - 0.736).abs() < 1e-4);
    assert_eq!(response.report.kept_count, 3);
    assert_eq!(response.report.dropped_count, 1);
    for pair in response.results.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    for result in &response.results {
        assert!(result.relevance_score >= response.report.threshold);
    }
}

#[tokio::test]
async fn test_repeated_query_skips_upsert() {
    let mut fx = Fixture::new();
    seed_budget_mail(&mut fx);
    let backend = MemoryBackend::new();
    pin_scores(&backend);
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let first = assistant.search(Some(&fx.alice), "budget", Some(4)).await.unwrap();
    let upserts = backend.upserts();
    let queries = backend.queries();

    let second = assistant.search(Some(&fx.alice), "budget", Some(4)).await.unwrap();
    assert!(!second.index.reindexed);
    assert_eq!(second.index.batches, 0);
    assert_eq!(backend.upserts(), upserts);
    assert_eq!(backend.queries(), queries + 1);
    assert_eq!(second.results, first.results);
}

#[tokio::test]
async fn test_unavailable_index_falls_back() {
    let mut fx = Fixture::new();
    seed_budget_mail(&mut fx);
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    assistant.refresh_index(Some(&fx.alice)).await.unwrap();
    backend.set_unavailable(true);

    let response = assistant.search(Some(&fx.alice), "tacos friday", None).await.unwrap();
    assert_eq!(response.source, SearchSource::Fallback);
    assert_eq!(response.results[0].record_id, "r6");
}

#[tokio::test]
async fn test_index_hits_outside_current_corpus_are_dropped() {
    let mut fx = Fixture::new();
    fx.add("keep", "carol@example.com", "Budget", "Budget numbers");
    fx.add("gone", "dave@example.com", "Budget draft", "Old budget");
    let bob_box = fx.store.create_mailbox("bob", "Bob inbox").unwrap();
    fx.store.grant_access(&bob_box.id, "alice").unwrap();
    fx.add_to(&bob_box.id, "shared", "bob@example.com", "Budget", "Shared budget");
    let backend = MemoryBackend::new();
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));

    let before = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert_eq!(before.source, SearchSource::Index);
    assert_eq!(before.results.len(), 3);

    fx.store
        .set_flags(
            "gone",
            MailFlags {
                trashed: true,
                ..MailFlags::default()
            },
        )
        .unwrap();
    assert!(fx.store.revoke_access(&bob_box.id, "alice").unwrap());

    let after = assistant.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert!(after.index.reindexed);
    assert_eq!(after.source, SearchSource::Index);
    // The backend still holds all three documents
    assert_eq!(backend.document_count(&after.index.collection_id), 3);
    let ids: Vec<&str> = after.results.iter().map(|r| r.record_id.as_str()).collect();
    assert_eq!(ids, vec!["keep"]);
    assert_eq!(after.report.kept_count, 1);
}

#[tokio::test]
async fn test_backend_added_later_triggers_first_index() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget", "Budget numbers");

    let bare = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));
    let first = bare.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert_eq!(first.source, SearchSource::Fallback);
    assert!(!first.index.reindexed);

    let backend = MemoryBackend::new();
    let backed = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));
    let second = backed.search(Some(&fx.alice), "budget", None).await.unwrap();
    assert!(second.index.reindexed);
    assert_eq!(second.index.reason, Some(ReindexReason::NoPriorIndex));
    assert_eq!(backend.upserts(), 1);
    assert_eq!(second.source, SearchSource::Index);
    assert_eq!(second.results[0].record_id, "r1");
}

#[tokio::test]
async fn test_archived_mail_is_found_on_both_paths() {
    let mut fx = Fixture::new();
    fx.add("old", "carol@example.com", "Contract", "Signed contract");
    fx.store
        .set_flags(
            "old",
            MailFlags {
                archived: true,
                ..MailFlags::default()
            },
        )
        .unwrap();

    let backend = MemoryBackend::new();
    let indexed = fx.assistant(&Fixture::config(), Some(backend.clone()), ScriptedReasoner::new(vec![]));
    let from_index = indexed.search(Some(&fx.alice), "contract", None).await.unwrap();
    assert_eq!(from_index.source, SearchSource::Index);
    assert_eq!(from_index.results[0].record_id, "old");

    backend.set_unavailable(true);
    let from_fallback = indexed.search(Some(&fx.alice), "contract", None).await.unwrap();
    assert_eq!(from_fallback.source, SearchSource::Fallback);
    assert_eq!(from_fallback.results[0].record_id, "old");
}

#[tokio::test]
async fn test_fallback_matches_non_ascii_case() {
    let mut fx = Fixture::new();
    fx.add("r1", "emile@example.com", "Notes from Émile", "Agenda attached");
    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));

    let response = assistant.search(Some(&fx.alice), "émile", None).await.unwrap();
    assert_eq!(response.source, SearchSource::Fallback);
    assert_eq!(response.results[0].record_id, "r1");
}

// ============================================================================
// Fallback path
// ============================================================================

#[tokio::test]
async fn test_fallback_without_backend() {
    let mut fx = Fixture::new();
    seed_budget_mail(&mut fx);
    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));

    let response = assistant.search(Some(&fx.alice), "budget numbers", Some(10)).await.unwrap();
    assert_eq!(response.source, SearchSource::Fallback);
    assert_eq!(response.results[0].record_id, "r1");
    assert!(response.results.iter().all(|r| r.record_id != "r6"));
}

#[tokio::test]
async fn test_fallback_filters_before_limit() {
    let mut fx = Fixture::new();
    // Oldest record is the only visible match; 120 newer matches are trashed.
    fx.add("visible", "carol@example.com", "Invoice 17", "Invoice attached");
    for i in 0..120 {
        let id = format!("trashed-{}", i);
        fx.add(&id, "billing@example.com", "Invoice", "Old invoice");
        fx.store
            .set_flags(
                &id,
                MailFlags {
                    trashed: true,
                    ..MailFlags::default()
                },
            )
            .unwrap();
    }

    let direct = fx
        .store
        .search_records(&fx.alice, RecordQuery::new().text("invoice").limit(1))
        .await
        .unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].id, "visible");

    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));
    let response = assistant.search(Some(&fx.alice), "invoice", Some(1)).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].record_id, "visible");
}

// ============================================================================
// Access control and validation
// ============================================================================

#[tokio::test]
async fn test_other_users_mail_is_invisible_until_shared() {
    let mut fx = Fixture::new();
    fx.add("mine", "carol@example.com", "Budget", "Budget numbers");
    let bob_box = fx.store.create_mailbox("bob", "Bob inbox").unwrap();
    fx.add_to(&bob_box.id, "bobs", "zed@example.com", "Merger", "Confidential merger plans");
    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));

    let hidden = assistant.search(Some(&fx.alice), "merger", None).await.unwrap();
    assert!(hidden.results.is_empty());

    fx.store.grant_access(&bob_box.id, "alice").unwrap();
    let shared = assistant.search(Some(&fx.alice), "merger", None).await.unwrap();
    assert_eq!(shared.results[0].record_id, "bobs");
}

#[tokio::test]
async fn test_search_requires_identity() {
    let fx = Fixture::new();
    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));
    let err = assistant.search(None, "budget", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationRequired);
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let fx = Fixture::new();
    let assistant = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));

    let empty = assistant.search(Some(&fx.alice), "   ", None).await.unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::ValidationError);

    let too_many = assistant.search(Some(&fx.alice), "budget", Some(1000)).await.unwrap_err();
    assert_eq!(too_many.kind(), ErrorKind::ValidationError);

    let zero = assistant.search(Some(&fx.alice), "budget", Some(0)).await.unwrap_err();
    assert_eq!(zero.kind(), ErrorKind::ValidationError);
}
