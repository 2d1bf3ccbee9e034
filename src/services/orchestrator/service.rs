//! Orchestrator Service
//!
//! Bounded multi-step loop: the reasoning service picks operations, the
//! executor runs them, results are folded into the context for the next
//! round. The loop is an explicit state machine:
//!
//! `Init -> Planning -> Executing -> Accumulating -> Planning ... -> Terminated`
//!
//! Termination: no operations requested (Success), the iteration ceiling
//! (MaxIterations), a planning failure or timeout (FatalError), a step
//! failing on authentication or permission (FatalError, with the rest of
//! the round skipped), or cancellation observed before a planning round
//! (Cancelled). Synthesis runs in every case.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mailpilot_core::mail::Identity;
use mailpilot_core::operation_trait::OperationRegistry;
use mailpilot_core::{CoreError, CoreResult, ErrorKind};
use mailpilot_llm::{LlmProvider, OperationCall, ReasoningRequest};
use mailpilot_tools::{
    build_operation_call_instructions, extract_text_without_operation_calls, parse_operation_calls,
};

use super::context::{
    entry_for_step, render_context, summarize_result, truncate_with_marker,
    PLANNING_INSTRUCTIONS,
};
use super::session::{LoopState, OrchestrationSession, Step, StepStatus, TerminalState};
use super::synthesizer::{synthesize, FinalResult};
use crate::models::settings::OrchestrationPolicy;
use crate::services::operations::OperationExecutor;

pub struct OrchestratorService {
    provider: Arc<dyn LlmProvider>,
    executor: Arc<OperationExecutor>,
    policy: OrchestrationPolicy,
}

impl OrchestratorService {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: Arc<OperationExecutor>,
        policy: OrchestrationPolicy,
    ) -> Self {
        Self {
            provider,
            executor,
            policy,
        }
    }

    pub fn policy(&self) -> &OrchestrationPolicy {
        &self.policy
    }

    fn registry(&self) -> &OperationRegistry {
        self.executor.registry()
    }

    /// Planner instructions, with the text call format appended for
    /// providers that cannot return calls natively.
    fn instructions(&self) -> String {
        if self.provider.supports_native_calls() {
            PLANNING_INSTRUCTIONS.to_string()
        } else {
            format!(
                "{}\n\n{}",
                PLANNING_INSTRUCTIONS,
                build_operation_call_instructions(&self.registry().catalog())
            )
        }
    }

    /// Probe the reasoning service under the planning deadline.
    pub async fn check_reasoning_service(&self) -> CoreResult<()> {
        let timeout = self.policy.reasoning_timeout();
        match tokio::time::timeout(timeout, self.provider.health_check()).await {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::unavailable(
                "reasoning service",
                format!("health check timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    /// Run one request to completion.
    ///
    /// Fails only when the request is rejected up front (no identity, empty
    /// request). Every other outcome is a `FinalResult`.
    pub async fn run(
        &self,
        identity: Option<&Identity>,
        request: &str,
        cancel: CancellationToken,
    ) -> CoreResult<FinalResult> {
        let identity = identity.ok_or(CoreError::AuthenticationRequired)?;
        if request.trim().is_empty() {
            return Err(CoreError::validation("request must not be empty"));
        }

        let mut session = OrchestrationSession::new(identity.user_id.clone(), request);
        info!(
            session = %session.session_id,
            user = %identity.user_id,
            provider = self.provider.name(),
            max_iterations = self.policy.max_iterations,
            "orchestrator: session started"
        );

        let mut state = LoopState::Init;
        loop {
            debug!(session = %session.session_id, state = state.name(), "orchestrator: transition");
            state = match state {
                LoopState::Init => LoopState::Planning,
                LoopState::Planning => self.plan(&mut session, &cancel).await,
                LoopState::Executing(calls) => {
                    LoopState::Accumulating(self.execute_calls(&session, identity, calls).await)
                }
                LoopState::Accumulating(steps) => {
                    let aborted = access_failure(&steps);
                    for step in steps {
                        let entry = entry_for_step(&step);
                        session.append_step(step, entry);
                    }
                    match aborted {
                        Some(terminal) => {
                            warn!(session = %session.session_id, "orchestrator: access failure, aborting");
                            LoopState::Terminated(terminal)
                        }
                        None => LoopState::Planning,
                    }
                }
                LoopState::Terminated(terminal) => {
                    session.terminal_state = Some(terminal);
                    break;
                }
            };
        }

        let result = synthesize(&session);
        info!(
            session = %session.session_id,
            terminal = result.terminal_state.label(),
            iterations = result.iterations,
            steps = result.steps_total,
            failed = result.steps_failed,
            "orchestrator: session finished"
        );
        Ok(result)
    }

    /// One planning round.
    async fn plan(
        &self,
        session: &mut OrchestrationSession,
        cancel: &CancellationToken,
    ) -> LoopState {
        if cancel.is_cancelled() {
            info!(session = %session.session_id, "orchestrator: cancelled");
            return LoopState::Terminated(TerminalState::Cancelled);
        }
        if session.iteration_count >= self.policy.max_iterations {
            warn!(
                session = %session.session_id,
                limit = self.policy.max_iterations,
                "orchestrator: iteration ceiling reached"
            );
            return LoopState::Terminated(TerminalState::MaxIterations);
        }

        session.iteration_count += 1;
        let request = ReasoningRequest {
            instructions: self.instructions(),
            operation_catalog: self.registry().catalog(),
            context: render_context(session, self.policy.max_iterations),
        };

        let timeout = self.policy.reasoning_timeout();
        let response = match tokio::time::timeout(timeout, self.provider.plan(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(session = %session.session_id, error = %e, "orchestrator: planning failed");
                return LoopState::Terminated(TerminalState::FatalError {
                    message: CoreError::from(e).to_string(),
                });
            }
            Err(_) => {
                warn!(
                    session = %session.session_id,
                    timeout_secs = timeout.as_secs(),
                    "orchestrator: planning timed out"
                );
                return LoopState::Terminated(TerminalState::FatalError {
                    message: format!(
                        "reasoning service unavailable: timed out after {}s",
                        timeout.as_secs()
                    ),
                });
            }
        };

        let mut calls = response.operation_calls;
        if let Some(text) = response.content.as_deref() {
            if calls.is_empty() {
                calls = parse_operation_calls(text);
            }
            let note = extract_text_without_operation_calls(text);
            let note = note.trim();
            if !note.is_empty() {
                session
                    .reasoning_notes
                    .push(truncate_with_marker(note, self.policy.preview_chars));
            }
        }

        if calls.is_empty() {
            LoopState::Terminated(TerminalState::Success)
        } else {
            debug!(
                session = %session.session_id,
                iteration = session.iteration_count,
                calls = calls.len(),
                "orchestrator: operations planned"
            );
            LoopState::Executing(calls)
        }
    }

    /// Run the planned calls in order. Failures become failed steps.
    async fn execute_calls(
        &self,
        session: &OrchestrationSession,
        identity: &Identity,
        calls: Vec<OperationCall>,
    ) -> Vec<Step> {
        let mut steps = Vec::with_capacity(calls.len());
        for (offset, call) in calls.into_iter().enumerate() {
            let result = self
                .executor
                .execute_in_session(
                    &call.name,
                    call.arguments.clone(),
                    Some(identity),
                    &session.session_id,
                    &call.id,
                )
                .await;

            let index = session.next_step_index() + offset;
            let status = match &result.error {
                None => StepStatus::Succeeded,
                Some(failure) => StepStatus::Failed {
                    kind: failure.kind,
                    message: failure.message.clone(),
                },
            };
            debug!(
                session = %session.session_id,
                step = index,
                operation = %call.name,
                success = result.success,
                "orchestrator: step recorded"
            );
            let abort = matches!(&status, StepStatus::Failed { kind, .. } if kind.is_access_failure());
            steps.push(Step {
                index,
                iteration: session.iteration_count,
                produces_artifact: self.registry().produces_artifact(&call.name),
                operation_name: call.name,
                arguments: call.arguments,
                status,
                result_summary: summarize_result(&result, self.policy.preview_chars),
                duration_ms: result.duration_ms,
                payload: result.payload,
            });
            if abort {
                break;
            }
        }
        steps
    }
}

/// Terminal state for the first step that failed on authentication or
/// permission. The message is safe to show to the end user.
fn access_failure(steps: &[Step]) -> Option<TerminalState> {
    steps.iter().find_map(|step| match &step.status {
        StepStatus::Failed { kind, .. } if kind.is_access_failure() => {
            let reason = match kind {
                ErrorKind::AuthenticationRequired => CoreError::AuthenticationRequired,
                _ => CoreError::permission_denied(step.operation_name.clone()),
            };
            let message = reason.user_message();
            Some(TerminalState::FatalError {
                message: format!(
                    "{} (step {} [{}])",
                    message.trim_end_matches('.'),
                    step.index,
                    step.operation_name
                ),
            })
        }
        _ => None,
    })
}
