//! Orchestration
//!
//! Bounded plan/execute loop over the operation registry.

pub mod context;
pub mod service;
pub mod session;
pub mod synthesizer;

pub use context::{bound_free_text, render_context, truncate_with_marker, TRUNCATION_MARKER};
pub use service::OrchestratorService;
pub use session::{LoopState, OrchestrationSession, Step, StepStatus, TerminalState};
pub use synthesizer::{synthesize, FinalResult};
