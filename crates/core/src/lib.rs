//! Mailpilot Core
//!
//! Foundational types and contracts for the mailpilot workspace. This crate
//! has no dependency on storage, HTTP or reasoning-service code.
//!
//! ## Module Organization
//!
//! - `error` - Error taxonomy (`CoreError`, `ErrorKind`, `CoreResult`)
//! - `mail` - Records, mailboxes, identities, draft payloads
//! - `data_provider` - Permission-scoped data access contract and the typestate query builder
//! - `schema` - Parameter schema declaration and argument validation
//! - `context` - Per-call execution context
//! - `operation_trait` - Operation traits and the validated registry

pub mod error;
pub mod mail;
pub mod data_provider;
pub mod schema;
pub mod context;
pub mod operation_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult, ErrorKind};

// ── Mail Model ─────────────────────────────────────────────────────────
pub use mail::{truncate_chars, DraftPayload, EmailRecord, Identity, MailFlags, Mailbox};

// ── Data Provider ──────────────────────────────────────────────────────
pub use data_provider::{BoundedRecordQuery, DataProvider, RecordFilter, RecordQuery};

// ── Schemas & Context ──────────────────────────────────────────────────
pub use context::OperationContext;
pub use schema::ParameterSchema;

// ── Operations ─────────────────────────────────────────────────────────
pub use operation_trait::{
    EmailOperation, OperationDefinition, OperationDescriptor, OperationExecutable,
    OperationRegistry, RECORD_ID_PARAM,
};
