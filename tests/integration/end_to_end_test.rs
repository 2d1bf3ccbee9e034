//! End-to-End Tests
//!
//! Multi-step requests across search, retrieval and drafting, with the
//! index backend and reasoning service both scripted.

use serde_json::json;

use mailpilot::services::orchestrator::TerminalState;
use mailpilot_core::data_provider::{DataProvider, RecordQuery};
use mailpilot_core::mail::Identity;
use mailpilot_core::ErrorKind;

use crate::support::{calls, Fixture, MemoryBackend, ScriptedReasoner};

async fn draft_count(fx: &Fixture, identity: &Identity) -> usize {
    fx.store
        .search_records(identity, RecordQuery::new().include_drafts(true).limit(100))
        .await
        .unwrap()
        .iter()
        .filter(|r| r.flags.draft)
        .count()
}

#[tokio::test]
async fn test_summarize_then_draft_with_missing_record() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Budget", "Budget attached.");
    let reasoner = ScriptedReasoner::new(vec![
        Ok(calls(vec![("summarize_email", json!({"record_id": "r404"}))])),
        Ok(mailpilot_llm::ReasoningResponse::text(
            "That email does not exist, so there is nothing to reply to.",
            "scripted-1",
        )),
    ]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());

    let result = assistant
        .run(Some(&fx.alice), "Summarize email r404 and draft a reply")
        .await
        .unwrap();

    assert_eq!(result.terminal_state, TerminalState::Success);
    assert_eq!(result.steps_total, 1);
    assert_eq!(result.steps_failed, 1);
    assert_eq!(result.steps_successful, 0);
    assert!(result.final_payload.is_none());
    assert!(result
        .narrative
        .starts_with("Step 1 [summarize_email] failed (RecordNotFound)"));
    assert!(result.narrative.ends_with("0 of 1 steps succeeded."));
    assert_eq!(draft_count(&fx, &fx.alice).await, 0);
    assert_eq!(reasoner.rounds(), 2);
}

#[tokio::test]
async fn test_search_summarize_and_draft() {
    let mut fx = Fixture::new();
    fx.add(
        "r1",
        "carol@example.com",
        "Q3 budget",
        "Attached are the Q3 budget numbers. Please confirm by Friday.",
    );
    fx.add("r2", "dave@example.com", "Lunch", "Tacos on Friday?");
    let backend = MemoryBackend::new();
    let reasoner = ScriptedReasoner::new(vec![
        Ok(calls(vec![("search_emails", json!({"query": "budget", "limit": 5}))])),
        Ok(calls(vec![("summarize_email", json!({"record_id": "r1"}))])),
        Ok(calls(vec![(
            "draft_reply",
            json!({"record_id": "r1", "body": "Confirmed, thanks Carol."}),
        )])),
        Ok(mailpilot_llm::ReasoningResponse::text("Draft saved.", "scripted-1")),
    ]);
    let assistant = fx.assistant(&Fixture::config(), Some(backend.clone()), reasoner.clone());

    let result = assistant
        .run(Some(&fx.alice), "Find the budget mail, summarize it and draft a confirmation")
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.iterations, 4);
    assert_eq!(result.steps_successful, 3);
    assert_eq!(backend.upserts(), 1);

    let draft = result.final_payload.clone().unwrap();
    assert_eq!(draft["in_reply_to"], "r1");
    assert_eq!(draft["subject"], "Re: Q3 budget");
    assert_eq!(result.reasoning_summary.as_deref(), Some("Draft saved."));
    assert_eq!(draft_count(&fx, &fx.alice).await, 1);

    // Each round saw the previous results.
    let requests = reasoner.requests.lock().unwrap();
    assert!(requests[1].context.contains("\"record_id\":\"r1\""));
    assert!(requests[3].context.contains("Step 3 [draft_reply]"));
}

#[tokio::test]
async fn test_unauthenticated_run_is_rejected() {
    let fx = Fixture::new();
    let reasoner = ScriptedReasoner::new(vec![]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());

    let err = assistant.run(None, "Summarize my inbox").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthenticationRequired);
    assert_eq!(reasoner.rounds(), 0);

    let empty = assistant.run(Some(&fx.alice), "  ").await.unwrap_err();
    assert_eq!(empty.kind(), ErrorKind::ValidationError);
}
