//! Mail Data Model
//!
//! Records, mailboxes and identities as seen through the Data Provider.
//! This crate never mutates records directly; the only write path is
//! draft creation through `DataProvider::create_draft`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

/// State flags carried by every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailFlags {
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub unread: bool,
}

/// A mailbox (container of records).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub id: String,
    pub owner_user_id: String,
    pub name: String,
}

/// A single email message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub mailbox_id: String,
    pub thread_id: Option<String>,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub flags: MailFlags,
}

impl EmailRecord {
    /// First `max_chars` characters of the body (char-boundary safe).
    pub fn preview(&self, max_chars: usize) -> String {
        truncate_chars(&self.body, max_chars)
    }
}

/// Payload for a new draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPayload {
    /// Mailbox the draft belongs to. When `None` the provider picks the
    /// identity's primary (owned) mailbox.
    pub mailbox_id: Option<String>,
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Truncate a string to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
