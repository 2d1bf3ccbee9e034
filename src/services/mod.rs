//! Services
//!
//! Business logic: mail access, index cache, search, operations and the
//! orchestration loop, assembled by [`MailAssistant`].

pub mod assistant;
pub mod index;
pub mod mail_store;
pub mod operations;
pub mod orchestrator;
pub mod search;

pub use assistant::MailAssistant;
pub use index::{IndexCacheManager, IndexOutcome, ReindexReason};
pub use mail_store::SqliteMailStore;
pub use operations::{OperationDeps, OperationExecutor};
pub use orchestrator::{FinalResult, OrchestratorService, TerminalState};
pub use search::{SearchBackend, SearchResponse, SearchService, SearchSource};
