//! Built-in Email Operations
//!
//! Each operation is a separate struct implementing `OperationDefinition`
//! and `OperationExecutable`. Arguments arrive already validated against
//! the declared schema, so the helpers below only extract typed values.

pub mod classify;
pub mod draft_reply;
pub mod get_email;
pub mod list_thread;
pub mod search_emails;
pub mod summarize;


pub use classify::ClassifyEmailOperation;
pub use draft_reply::DraftReplyOperation;
pub use get_email::GetEmailOperation;
pub use list_thread::ListThreadOperation;
pub use search_emails::SearchEmailsOperation;
pub use summarize::SummarizeEmailOperation;

use serde_json::Value;

use mailpilot_core::mail::EmailRecord;
use mailpilot_core::{CoreError, CoreResult};

/// Required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, name: &str) -> CoreResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| CoreError::validation(format!("missing required argument '{}'", name)))
}

/// Optional non-negative integer argument.
pub(crate) fn optional_usize(args: &Value, name: &str) -> CoreResult<Option<usize>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                CoreError::validation(format!("argument '{}' must be a non-negative integer", name))
            }),
    }
}

/// Record metadata shared by several payloads.
pub(crate) fn record_metadata(record: &EmailRecord) -> Value {
    serde_json::json!({
        "record_id": record.id,
        "mailbox_id": record.mailbox_id,
        "thread_id": record.thread_id,
        "sender": record.sender,
        "recipients": record.recipients,
        "subject": record.subject,
        "sent_at": record.sent_at.to_rfc3339(),
        "received_at": record.received_at.to_rfc3339(),
        "flags": record.flags,
    })
}
