//! Mailpilot - email assistant backend
//!
//! This library provides:
//! - A per-user search index cache with fingerprint and TTL invalidation
//! - Relevance-filtered search with a mail store fallback
//! - Access-checked email operations behind a validated registry
//! - A bounded multi-step orchestration loop over a reasoning service
//! - Storage layer (SQLite, JSON config)

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::settings::{AppConfig, IndexPolicy, OrchestrationPolicy, SearchPolicy, SettingsUpdate};
pub use services::{FinalResult, MailAssistant, SearchResponse, TerminalState};
pub use storage::{ConfigService, Database};
pub use utils::error::{AppError, AppResult};
