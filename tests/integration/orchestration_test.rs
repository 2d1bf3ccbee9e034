//! Orchestration Integration Tests
//!
//! The planning loop driven through the assistant with scripted reasoning:
//! - iteration ceiling and termination states
//! - failed steps do not stop later steps
//! - cancellation between rounds
//! - reasoning timeouts and errors end the session with a synthesized result
//! - text-only reasoning services via fenced operation calls

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use mailpilot::services::orchestrator::{TerminalState, TRUNCATION_MARKER};
use mailpilot_core::ErrorKind;
use mailpilot_llm::{
    LlmError, LlmProvider, LlmResult, ProviderConfig, ReasoningRequest, ReasoningResponse,
};

use crate::support::{calls, Fixture, ScriptedReasoner};

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_iteration_ceiling_is_enforced() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Hello", "Hi.");
    let mut config = Fixture::config();
    config.orchestration.max_iterations = 3;
    let reasoner = ScriptedReasoner::repeating(calls(vec![(
        "classify_email",
        json!({"record_id": "r1"}),
    )]));
    let assistant = fx.assistant(&config, None, reasoner.clone());

    let result = assistant.run(Some(&fx.alice), "keep classifying").await.unwrap();

    assert_eq!(result.terminal_state, TerminalState::MaxIterations);
    assert_eq!(result.iterations, 3);
    assert_eq!(reasoner.rounds(), 3);
    assert_eq!(result.steps_total, 3);
    assert!(result
        .narrative
        .ends_with("Stopped at the limit of 3 planning rounds; 3 of 3 steps succeeded (steps 1, 2, 3)."));
}

#[tokio::test]
async fn test_failed_step_does_not_block_later_steps() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Please review", "Could you review the deck by Friday?");
    let reasoner = ScriptedReasoner::new(vec![Ok(calls(vec![
        ("get_email", json!({"record_id": "ghost"})),
        ("classify_email", json!({"record_id": "r1"})),
    ]))]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner);

    let result = assistant.run(Some(&fx.alice), "check my mail").await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.steps_failed, 1);
    assert_eq!(result.steps_successful, 1);
    assert_eq!(result.steps[0].operation_name, "get_email");
    assert!(!result.steps[0].succeeded());
    assert_eq!(result.final_payload.unwrap()["category"], "action_required");
}

#[tokio::test]
async fn test_reasoning_error_is_fatal_but_synthesized() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Hello", "Hi.");
    let reasoner = ScriptedReasoner::new(vec![
        Ok(calls(vec![("classify_email", json!({"record_id": "r1"}))])),
        Err(LlmError::ServerError {
            message: "upstream overloaded".to_string(),
            status: Some(503),
        }),
    ]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner);

    let result = assistant.run(Some(&fx.alice), "classify r1").await.unwrap();

    match &result.terminal_state {
        TerminalState::FatalError { message } => assert!(message.contains("upstream overloaded")),
        other => panic!("unexpected terminal state {:?}", other),
    }
    assert_eq!(result.steps_successful, 1);
    assert!(result.final_payload.is_some());
    assert!(result.narrative.contains("Stopped early"));
}

/// Never answers within any reasonable deadline.
struct StalledReasoner {
    config: ProviderConfig,
}

#[async_trait]
impl LlmProvider for StalledReasoner {
    fn name(&self) -> &'static str {
        "stalled"
    }
    fn model(&self) -> &str {
        "stalled-1"
    }
    async fn plan(&self, _request: ReasoningRequest) -> LlmResult<ReasoningResponse> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(ReasoningResponse::text("too late", "stalled-1"))
    }
    async fn health_check(&self) -> LlmResult<()> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }
    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[tokio::test(start_paused = true)]
async fn test_reasoning_timeout_ends_session() {
    let fx = Fixture::new();
    let provider: Arc<dyn LlmProvider> = Arc::new(StalledReasoner {
        config: ProviderConfig::default(),
    });
    let assistant = mailpilot::services::MailAssistant::new(
        &Fixture::config(),
        &fx.db,
        fx.provider(),
        None,
        provider,
    )
    .unwrap();

    let result = assistant.run(Some(&fx.alice), "anything").await.unwrap();
    assert!(matches!(result.terminal_state, TerminalState::FatalError { .. }));
    assert_eq!(result.steps_total, 0);
}

#[tokio::test(start_paused = true)]
async fn test_reasoning_health_check() {
    let fx = Fixture::new();
    let healthy = fx.assistant(&Fixture::config(), None, ScriptedReasoner::new(vec![]));
    assert!(healthy.check_reasoning_service().await.is_ok());

    let provider: Arc<dyn LlmProvider> = Arc::new(StalledReasoner {
        config: ProviderConfig::default(),
    });
    let stalled = mailpilot::services::MailAssistant::new(
        &Fixture::config(),
        &fx.db,
        fx.provider(),
        None,
        provider,
    )
    .unwrap();
    let err = stalled.check_reasoning_service().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalServiceUnavailable);
}

// ============================================================================
// Cancellation
// ============================================================================

/// Requests one classification and cancels the session while planning.
struct CancellingReasoner {
    token: CancellationToken,
    config: ProviderConfig,
}

#[async_trait]
impl LlmProvider for CancellingReasoner {
    fn name(&self) -> &'static str {
        "cancelling"
    }
    fn model(&self) -> &str {
        "cancelling-1"
    }
    async fn plan(&self, _request: ReasoningRequest) -> LlmResult<ReasoningResponse> {
        self.token.cancel();
        Ok(calls(vec![("classify_email", json!({"record_id": "r1"}))]))
    }
    async fn health_check(&self) -> LlmResult<()> {
        Ok(())
    }
    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[tokio::test]
async fn test_cancellation_stops_before_next_round() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Hello", "Hi.");
    let token = CancellationToken::new();
    let provider: Arc<dyn LlmProvider> = Arc::new(CancellingReasoner {
        token: token.clone(),
        config: ProviderConfig::default(),
    });
    let assistant = mailpilot::services::MailAssistant::new(
        &Fixture::config(),
        &fx.db,
        fx.provider(),
        None,
        provider,
    )
    .unwrap();

    let result = assistant
        .run_with_cancel(Some(&fx.alice), "classify", token)
        .await
        .unwrap();

    assert_eq!(result.terminal_state, TerminalState::Cancelled);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.steps_successful, 1, "the planned step still runs");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let fx = Fixture::new();
    let reasoner = ScriptedReasoner::new(vec![]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());
    let token = CancellationToken::new();
    token.cancel();

    let result = assistant
        .run_with_cancel(Some(&fx.alice), "anything", token)
        .await
        .unwrap();
    assert_eq!(result.terminal_state, TerminalState::Cancelled);
    assert_eq!(reasoner.rounds(), 0);
}

// ============================================================================
// Planning context
// ============================================================================

#[tokio::test]
async fn test_context_carries_bounded_results() {
    let mut fx = Fixture::new();
    let long_body = "word ".repeat(1000);
    fx.add("r1", "carol@example.com", "Long one", &long_body);
    let reasoner = ScriptedReasoner::new(vec![Ok(calls(vec![(
        "get_email",
        json!({"record_id": "r1"}),
    )]))]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());

    assistant.run(Some(&fx.alice), "read r1").await.unwrap();

    let requests = reasoner.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].context.contains("(none yet)"));
    assert_eq!(requests[0].operation_catalog.len(), 6);
    let second = &requests[1].context;
    assert!(second.contains("Step 1 [get_email] (iteration 1) succeeded"));
    assert!(second.contains("carol@example.com"));
    assert!(second.contains(TRUNCATION_MARKER));
    assert!(second.len() < long_body.len());
}

#[tokio::test]
async fn test_text_only_reasoning_service() {
    let mut fx = Fixture::new();
    fx.add("r1", "ops@example.com", "URGENT: outage", "Everything is down.");
    let text = "I'll classify it.\n\n```operation_call\n\
                {\"operation\": \"classify_email\", \"arguments\": {\"record_id\": \"r1\"}}\n```";
    let reasoner = ScriptedReasoner::text_only(vec![Ok(ReasoningResponse::text(text, "scripted-1"))]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());

    let result = assistant.run(Some(&fx.alice), "how urgent is r1?").await.unwrap();

    assert_eq!(result.steps_successful, 1);
    assert_eq!(result.final_payload.unwrap()["category"], "urgent");
    let requests = reasoner.requests.lock().unwrap();
    assert!(requests[0].instructions.contains("```operation_call"));
}

#[tokio::test]
async fn test_permission_denied_step_aborts_session() {
    let mut fx = Fixture::new();
    fx.add("r1", "carol@example.com", "Hello", "Hi.");
    let bob_box = fx.store.create_mailbox("bob", "Bob inbox").unwrap();
    fx.add_to(&bob_box.id, "bobs", "zed@example.com", "Private", "Not for alice.");
    let reasoner = ScriptedReasoner::repeating(calls(vec![
        ("get_email", json!({"record_id": "bobs"})),
        ("classify_email", json!({"record_id": "r1"})),
    ]));
    let assistant = fx.assistant(&Fixture::config(), None, reasoner.clone());

    let result = assistant.run(Some(&fx.alice), "read bob's mail").await.unwrap();

    match &result.terminal_state {
        TerminalState::FatalError { message } => {
            assert!(message.contains("You do not have access"));
            assert!(message.contains("[get_email]"));
        }
        other => panic!("unexpected terminal state {:?}", other),
    }
    assert_eq!(reasoner.rounds(), 1);
    assert_eq!(result.steps_total, 1);
    assert_eq!(result.steps_failed, 1);
    assert!(result.final_payload.is_none());
    assert!(result.narrative.ends_with("0 of 1 steps succeeded."));
}

#[tokio::test]
async fn test_unknown_operation_from_planner_is_a_failed_step() {
    let fx = Fixture::new();
    let reasoner = ScriptedReasoner::new(vec![Ok(calls(vec![("send_email", json!({}))]))]);
    let assistant = fx.assistant(&Fixture::config(), None, reasoner);

    let result = assistant.run(Some(&fx.alice), "send it").await.unwrap();
    assert!(result.is_success());
    assert_eq!(result.steps_failed, 1);
    match &result.steps[0].status {
        mailpilot::services::orchestrator::StepStatus::Failed { kind, .. } => {
            assert_eq!(*kind, ErrorKind::ValidationError)
        }
        other => panic!("unexpected status {:?}", other),
    }
}
