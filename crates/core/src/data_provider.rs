//! Data Provider Contract
//!
//! Permission-scoped access to mailboxes, threads and records, consumed
//! by the search fallback path and by the email operations.
//!
//! ## Query ordering
//!
//! `search_records` only accepts a [`BoundedRecordQuery`]. The only way to
//! obtain one is [`RecordQuery::limit`] (or [`RecordQuery::page`]), which
//! consumes the open query. A bounded query exposes no predicate methods,
//! so every ownership/state filter is necessarily part of the query before
//! the limit is applied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::mail::{DraftPayload, EmailRecord, Identity, Mailbox};

/// Predicates of a record query.
///
/// Ownership is implicit: providers always restrict to mailboxes the
/// identity can access. Trashed and draft records are excluded unless
/// explicitly included; archived records likewise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub text: Option<String>,
    pub sender: Option<String>,
    pub thread_id: Option<String>,
    pub mailbox_id: Option<String>,
    pub include_archived: bool,
    pub include_trashed: bool,
    pub include_drafts: bool,
    pub unread_only: bool,
}

impl RecordFilter {
    /// Case-insensitive terms of the free-text predicate.
    pub fn terms(&self) -> Vec<String> {
        self.text
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect()
    }

    /// Evaluate the state and attribute predicates against one record.
    ///
    /// Ownership is NOT checked here; callers restrict the candidate set
    /// to accessible mailboxes first. A record matches the text predicate
    /// when any term occurs in its subject, sender or body.
    pub fn matches(&self, record: &EmailRecord) -> bool {
        if record.flags.trashed && !self.include_trashed {
            return false;
        }
        if record.flags.draft && !self.include_drafts {
            return false;
        }
        if record.flags.archived && !self.include_archived {
            return false;
        }
        if self.unread_only && !record.flags.unread {
            return false;
        }
        if let Some(mailbox) = &self.mailbox_id {
            if &record.mailbox_id != mailbox {
                return false;
            }
        }
        if let Some(thread) = &self.thread_id {
            if record.thread_id.as_deref() != Some(thread.as_str()) {
                return false;
            }
        }
        if let Some(sender) = &self.sender {
            if !record.sender.to_lowercase().contains(&sender.to_lowercase()) {
                return false;
            }
        }
        let terms = self.terms();
        if terms.is_empty() {
            return true;
        }
        let haystack = format!(
            "{}\n{}\n{}",
            record.subject.to_lowercase(),
            record.sender.to_lowercase(),
            record.body.to_lowercase()
        );
        terms.iter().any(|t| haystack.contains(t.as_str()))
    }
}

/// Open record query: predicates may still be added.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    filter: RecordFilter,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text predicate over subject, sender and body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.filter.text = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.filter.sender = Some(sender.into());
        self
    }

    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.filter.thread_id = Some(thread_id.into());
        self
    }

    pub fn in_mailbox(mut self, mailbox_id: impl Into<String>) -> Self {
        self.filter.mailbox_id = Some(mailbox_id.into());
        self
    }

    pub fn include_archived(mut self, include: bool) -> Self {
        self.filter.include_archived = include;
        self
    }

    pub fn include_trashed(mut self, include: bool) -> Self {
        self.filter.include_trashed = include;
        self
    }

    pub fn include_drafts(mut self, include: bool) -> Self {
        self.filter.include_drafts = include;
        self
    }

    pub fn unread_only(mut self, unread_only: bool) -> Self {
        self.filter.unread_only = unread_only;
        self
    }

    /// Terminal step: bound the result set.
    pub fn limit(self, limit: usize) -> BoundedRecordQuery {
        self.page(0, limit)
    }

    /// Terminal step: bound the result set with an offset.
    pub fn page(self, offset: usize, limit: usize) -> BoundedRecordQuery {
        BoundedRecordQuery {
            filter: self.filter,
            offset,
            limit,
        }
    }
}

/// Query whose predicates are frozen and whose bounds are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedRecordQuery {
    filter: RecordFilter,
    offset: usize,
    limit: usize,
}

impl BoundedRecordQuery {
    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Apply this query to an in-memory candidate list.
    ///
    /// Candidates must already be restricted to accessible mailboxes.
    /// Matching happens first; offset and limit are applied last.
    pub fn apply<'a, I>(&self, candidates: I) -> Vec<EmailRecord>
    where
        I: IntoIterator<Item = &'a EmailRecord>,
    {
        candidates
            .into_iter()
            .filter(|r| self.filter.matches(r))
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Permission-scoped read access plus draft creation.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Mailboxes the identity owns or has been granted access to.
    async fn list_accessible_mailboxes(&self, identity: &Identity) -> CoreResult<Vec<Mailbox>>;

    /// Messages of a thread, restricted to accessible mailboxes, oldest first.
    async fn list_thread_messages(
        &self,
        thread_id: &str,
        identity: &Identity,
    ) -> CoreResult<Vec<EmailRecord>>;

    /// One record. `PermissionDenied` when it exists outside the identity's
    /// mailboxes, `RecordNotFound` when it does not exist.
    async fn get_record(&self, record_id: &str, identity: &Identity) -> CoreResult<EmailRecord>;

    /// Filtered search, newest first. Filters are applied before bounds.
    async fn search_records(
        &self,
        identity: &Identity,
        query: BoundedRecordQuery,
    ) -> CoreResult<Vec<EmailRecord>>;

    /// Create a draft and the link that makes it visible in its mailbox,
    /// in one transaction. Returns the new record id.
    async fn create_draft(&self, identity: &Identity, payload: DraftPayload) -> CoreResult<String>;

    /// The identity's indexable corpus: accessible, not trashed, not drafts.
    async fn list_indexable_records(&self, identity: &Identity) -> CoreResult<Vec<EmailRecord>>;
}
