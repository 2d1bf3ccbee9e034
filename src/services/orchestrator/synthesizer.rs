//! Response Synthesizer
//!
//! Turns a finished session into the caller-facing result. The narrative is
//! a deterministic rendering of every step (failed ones included) followed
//! by one terminal line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::truncate_with_marker;
use super::session::{OrchestrationSession, Step, StepStatus, TerminalState};

/// Characters of each step summary quoted in the narrative.
const NARRATIVE_SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub session_id: String,
    pub terminal_state: TerminalState,
    pub iterations: u32,
    pub steps_total: usize,
    pub steps_successful: usize,
    pub steps_failed: usize,
    /// Payload of the last successful artifact-producing step
    pub final_payload: Option<Value>,
    pub narrative: String,
    /// Last free-text note from the reasoning service
    pub reasoning_summary: Option<String>,
    pub steps: Vec<Step>,
}

impl FinalResult {
    pub fn is_success(&self) -> bool {
        self.terminal_state == TerminalState::Success
    }
}

fn step_line(step: &Step) -> String {
    let summary = truncate_with_marker(&step.result_summary, NARRATIVE_SUMMARY_CHARS);
    match &step.status {
        StepStatus::Succeeded => format!(
            "Step {} [{}] succeeded: {}",
            step.index, step.operation_name, summary
        ),
        StepStatus::Failed { kind, message } => format!(
            "Step {} [{}] failed ({}): {}",
            step.index, step.operation_name, kind, message
        ),
    }
}

fn terminal_line(session: &OrchestrationSession, state: &TerminalState) -> String {
    let succeeded: Vec<String> = session
        .steps
        .iter()
        .filter(|s| s.succeeded())
        .map(|s| s.index.to_string())
        .collect();
    let tally = if succeeded.is_empty() {
        format!("0 of {} steps succeeded", session.steps.len())
    } else {
        format!(
            "{} of {} steps succeeded (steps {})",
            succeeded.len(),
            session.steps.len(),
            succeeded.join(", ")
        )
    };
    let rounds = session.iteration_count;
    match state {
        TerminalState::Success => {
            format!("Completed after {} planning round(s); {}.", rounds, tally)
        }
        TerminalState::MaxIterations => format!(
            "Stopped at the limit of {} planning rounds; {}.",
            rounds, tally
        ),
        TerminalState::FatalError { message } => {
            format!("Stopped early: {}; {}.", message, tally)
        }
        TerminalState::Cancelled => {
            format!("Cancelled after {} planning round(s); {}.", rounds, tally)
        }
    }
}

pub fn synthesize(session: &OrchestrationSession) -> FinalResult {
    let terminal_state = session.terminal_state.clone().unwrap_or(TerminalState::FatalError {
        message: "session did not terminate".to_string(),
    });

    let final_payload = session
        .steps
        .iter()
        .rev()
        .find(|s| s.succeeded() && s.produces_artifact)
        .and_then(|s| s.payload.clone());

    let mut lines: Vec<String> = session.steps.iter().map(step_line).collect();
    lines.push(terminal_line(session, &terminal_state));

    let reasoning_summary = session
        .reasoning_notes
        .iter()
        .rev()
        .find(|n| !n.trim().is_empty())
        .cloned();

    FinalResult {
        session_id: session.session_id.clone(),
        terminal_state,
        iterations: session.iteration_count,
        steps_total: session.steps.len(),
        steps_successful: session.successful_steps(),
        steps_failed: session.failed_steps(),
        final_payload,
        narrative: lines.join("\n"),
        reasoning_summary,
        steps: session.steps.clone(),
    }
}
