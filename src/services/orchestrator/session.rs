//! Orchestration Session State
//!
//! One `OrchestrationSession` per inbound request. Steps are append-only
//! and numbered from 1 in execution order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use mailpilot_core::ErrorKind;
use mailpilot_llm::OperationCall;

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TerminalState {
    /// The reasoning service requested no further operations
    Success,
    /// The iteration ceiling was reached
    MaxIterations,
    /// Planning could not continue
    FatalError { message: String },
    /// The caller cancelled between iterations
    Cancelled,
}

impl TerminalState {
    pub fn label(&self) -> &'static str {
        match self {
            TerminalState::Success => "success",
            TerminalState::MaxIterations => "max_iterations",
            TerminalState::FatalError { .. } => "fatal_error",
            TerminalState::Cancelled => "cancelled",
        }
    }
}

/// Loop states. `Executing` carries the calls chosen by the last planning
/// round, `Accumulating` the steps they produced.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Init,
    Planning,
    Executing(Vec<OperationCall>),
    Accumulating(Vec<Step>),
    Terminated(TerminalState),
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            LoopState::Init => "init",
            LoopState::Planning => "planning",
            LoopState::Executing(_) => "executing",
            LoopState::Accumulating(_) => "accumulating",
            LoopState::Terminated(_) => "terminated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed { kind: ErrorKind, message: String },
}

/// One executed operation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based position in the session
    pub index: usize,
    /// Planning round that requested the call
    pub iteration: u32,
    pub operation_name: String,
    pub arguments: Value,
    pub status: StepStatus,
    /// Bounded rendering of the result, as shown to the reasoning service
    pub result_summary: String,
    pub duration_ms: u64,
    pub produces_artifact: bool,
    /// Full payload of a successful call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Step {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, StepStatus::Succeeded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationSession {
    pub session_id: String,
    pub user_id: String,
    pub original_request: String,
    pub steps: Vec<Step>,
    /// One bounded entry per step, in step order
    pub accumulated_context: Vec<String>,
    pub iteration_count: u32,
    pub terminal_state: Option<TerminalState>,
    /// Free text returned alongside planning decisions
    pub reasoning_notes: Vec<String>,
}

impl OrchestrationSession {
    pub fn new(user_id: impl Into<String>, original_request: impl Into<String>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            original_request: original_request.into(),
            steps: Vec::new(),
            accumulated_context: Vec::new(),
            iteration_count: 0,
            terminal_state: None,
            reasoning_notes: Vec::new(),
        }
    }

    /// Index the next appended step will receive.
    pub fn next_step_index(&self) -> usize {
        self.steps.len() + 1
    }

    /// Append a step and its context entry.
    pub fn append_step(&mut self, step: Step, context_entry: String) {
        self.accumulated_context.push(context_entry);
        self.steps.push(step);
    }

    pub fn successful_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.succeeded()).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.steps.len() - self.successful_steps()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal_state.is_some()
    }
}
