//! SQLite Mail Store
//!
//! Reference `DataProvider` over the local database. A record is visible to
//! an identity when it is linked (`mailbox_entries`) into a mailbox the
//! identity owns or has been granted access to.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::{debug, info};

use mailpilot_core::data_provider::{BoundedRecordQuery, DataProvider};
use mailpilot_core::mail::{DraftPayload, EmailRecord, Identity, MailFlags, Mailbox};
use mailpilot_core::{CoreError, CoreResult};

use crate::storage::database::{fold_case, fold_search_text, DbPool};
use crate::utils::error::{AppError, AppResult};

const RECORD_COLUMNS: &str = "r.id, r.mailbox_id, r.thread_id, r.sender, r.recipients, r.subject, \
     r.body, r.sent_at, r.received_at, r.is_draft, r.is_trashed, r.is_archived, r.is_unread";

/// Mailbox ids accessible to the user bound at `?1`.
const ACCESSIBLE_MAILBOXES: &str = "SELECT id FROM mailboxes WHERE owner_user_id = ?1 \
     UNION SELECT mailbox_id FROM mailbox_access WHERE user_id = ?1";

fn visible_clause() -> String {
    format!(
        "r.id IN (SELECT e.record_id FROM mailbox_entries e WHERE e.mailbox_id IN ({}))",
        ACCESSIBLE_MAILBOXES
    )
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{}': {}", raw, e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EmailRecord> {
    let recipients_raw: String = row.get(4)?;
    let recipients: Vec<String> = serde_json::from_str(&recipients_raw)
        .map_err(|e| conversion_error(4, format!("bad recipients: {}", e)))?;
    let sent_at: String = row.get(7)?;
    let received_at: String = row.get(8)?;
    Ok(EmailRecord {
        id: row.get(0)?,
        mailbox_id: row.get(1)?,
        thread_id: row.get(2)?,
        sender: row.get(3)?,
        recipients,
        subject: row.get(5)?,
        body: row.get(6)?,
        sent_at: parse_ts(7, &sent_at)?,
        received_at: parse_ts(8, &received_at)?,
        flags: MailFlags {
            draft: row.get(9)?,
            trashed: row.get(10)?,
            archived: row.get(11)?,
            unread: row.get(12)?,
        },
    })
}

/// Push a bound value and return its placeholder. `?1` is the user id.
fn bind(values: &mut Vec<Value>, value: Value) -> String {
    values.push(value);
    format!("?{}", values.len() + 1)
}

/// Escape LIKE wildcards; used with `ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// SQLite-backed mail store.
#[derive(Debug, Clone)]
pub struct SqliteMailStore {
    pool: DbPool,
}

impl SqliteMailStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn get_connection(
        &self,
    ) -> AppResult<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Create a mailbox owned by `owner_user_id`.
    pub fn create_mailbox(&self, owner_user_id: &str, name: &str) -> AppResult<Mailbox> {
        let mailbox = Mailbox {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: owner_user_id.to_string(),
            name: name.to_string(),
        };
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO mailboxes (id, owner_user_id, name) VALUES (?1, ?2, ?3)",
            params![mailbox.id, mailbox.owner_user_id, mailbox.name],
        )?;
        Ok(mailbox)
    }

    /// Grant `user_id` access to a mailbox it does not own.
    pub fn grant_access(&self, mailbox_id: &str, user_id: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT OR IGNORE INTO mailbox_access (mailbox_id, user_id) VALUES (?1, ?2)",
            params![mailbox_id, user_id],
        )?;
        Ok(())
    }

    /// Withdraw a grant made with [`grant_access`](Self::grant_access).
    pub fn revoke_access(&self, mailbox_id: &str, user_id: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let removed = conn.execute(
            "DELETE FROM mailbox_access WHERE mailbox_id = ?1 AND user_id = ?2",
            params![mailbox_id, user_id],
        )?;
        Ok(removed > 0)
    }

    /// Insert a record and link it into its mailbox.
    pub fn insert_record(&self, record: &EmailRecord) -> AppResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;
        insert_record_row(&tx, record, None)?;
        tx.execute(
            "INSERT INTO mailbox_entries (mailbox_id, record_id) VALUES (?1, ?2)",
            params![record.mailbox_id, record.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Whether the record is linked into the mailbox.
    pub fn has_entry(&self, mailbox_id: &str, record_id: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM mailbox_entries WHERE mailbox_id = ?1 AND record_id = ?2",
                params![mailbox_id, record_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Update state flags of an existing record.
    pub fn set_flags(&self, record_id: &str, flags: MailFlags) -> AppResult<()> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE email_records SET is_draft = ?2, is_trashed = ?3, is_archived = ?4, is_unread = ?5
             WHERE id = ?1",
            params![record_id, flags.draft, flags.trashed, flags.archived, flags.unread],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(format!("record {}", record_id)));
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn accessible_mailboxes(&self, identity: &Identity) -> AppResult<Vec<Mailbox>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, owner_user_id, name FROM mailboxes WHERE id IN ({}) ORDER BY name, id",
            ACCESSIBLE_MAILBOXES
        ))?;
        let rows = stmt.query_map(params![identity.user_id], |row| {
            Ok(Mailbox {
                id: row.get(0)?,
                owner_user_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn visible_records(
        &self,
        identity: &Identity,
        extra_where: &str,
        order_by: &str,
        extra: Vec<Value>,
    ) -> AppResult<Vec<EmailRecord>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {} FROM email_records r WHERE {}{} ORDER BY {}",
            RECORD_COLUMNS,
            visible_clause(),
            extra_where,
            order_by
        );
        let mut values = vec![Value::Text(identity.user_id.clone())];
        values.extend(extra);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn fetch_record(&self, record_id: &str, identity: &Identity) -> AppResult<EmailRecord> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {} FROM email_records r WHERE r.id = ?2 AND {}",
            RECORD_COLUMNS,
            visible_clause()
        );
        let visible = conn
            .query_row(&sql, params![identity.user_id, record_id], row_to_record)
            .optional()?;
        if let Some(record) = visible {
            return Ok(record);
        }

        let exists = conn
            .query_row(
                "SELECT 1 FROM email_records WHERE id = ?1",
                params![record_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            Err(AppError::Core(CoreError::permission_denied(format!(
                "record {} is not in a mailbox you can access",
                record_id
            ))))
        } else {
            Err(AppError::not_found(format!("record {}", record_id)))
        }
    }

    fn run_search(&self, identity: &Identity, query: &BoundedRecordQuery) -> AppResult<Vec<EmailRecord>> {
        let filter = query.filter();
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.include_trashed {
            clauses.push("r.is_trashed = 0".to_string());
        }
        if !filter.include_drafts {
            clauses.push("r.is_draft = 0".to_string());
        }
        if !filter.include_archived {
            clauses.push("r.is_archived = 0".to_string());
        }
        if filter.unread_only {
            clauses.push("r.is_unread = 1".to_string());
        }
        if let Some(mailbox_id) = &filter.mailbox_id {
            let p = bind(&mut values, Value::Text(mailbox_id.clone()));
            clauses.push(format!("r.mailbox_id = {}", p));
        }
        if let Some(thread_id) = &filter.thread_id {
            let p = bind(&mut values, Value::Text(thread_id.clone()));
            clauses.push(format!("r.thread_id = {}", p));
        }
        if let Some(sender) = &filter.sender {
            let p = bind(&mut values, Value::Text(like_pattern(&fold_case(sender))));
            clauses.push(format!("r.sender_folded LIKE {} ESCAPE '\\'", p));
        }
        let terms = filter.terms();
        if !terms.is_empty() {
            let mut any: Vec<String> = Vec::new();
            for term in &terms {
                let p = bind(&mut values, Value::Text(like_pattern(term)));
                any.push(format!("r.search_text LIKE {} ESCAPE '\\'", p));
            }
            clauses.push(format!("({})", any.join(" OR ")));
        }

        let mut extra_where = String::new();
        for clause in &clauses {
            extra_where.push_str(" AND ");
            extra_where.push_str(clause);
        }

        // Bounds come last, after every predicate
        let limit = bind(
            &mut values,
            Value::Integer(i64::try_from(query.limit()).unwrap_or(i64::MAX)),
        );
        let offset = bind(
            &mut values,
            Value::Integer(i64::try_from(query.offset()).unwrap_or(i64::MAX)),
        );
        let order_by = format!("r.received_at DESC, r.id ASC LIMIT {} OFFSET {}", limit, offset);

        let records = self.visible_records(identity, &extra_where, &order_by, values)?;
        debug!(
            user = %identity.user_id,
            terms = terms.len(),
            returned = records.len(),
            "mail store: search"
        );
        Ok(records)
    }

    fn insert_draft(&self, identity: &Identity, payload: DraftPayload) -> AppResult<String> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        let mailbox_id = match payload.mailbox_id {
            Some(id) => {
                let owner: Option<String> = tx
                    .query_row(
                        "SELECT owner_user_id FROM mailboxes WHERE id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(owner) = owner else {
                    return Err(AppError::not_found(format!("mailbox {}", id)));
                };
                let granted = tx
                    .query_row(
                        "SELECT 1 FROM mailbox_access WHERE mailbox_id = ?1 AND user_id = ?2",
                        params![id, identity.user_id],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if owner != identity.user_id && !granted {
                    return Err(AppError::Core(CoreError::permission_denied(format!(
                        "no access to mailbox {}",
                        id
                    ))));
                }
                id
            }
            None => tx
                .query_row(
                    "SELECT id FROM mailboxes WHERE owner_user_id = ?1 ORDER BY created_at, id LIMIT 1",
                    params![identity.user_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| AppError::validation("no mailbox available for drafts"))?,
        };

        let now = Utc::now();
        let record = EmailRecord {
            id: uuid::Uuid::new_v4().to_string(),
            mailbox_id: mailbox_id.clone(),
            thread_id: payload.thread_id,
            sender: identity.email.clone(),
            recipients: payload.recipients,
            subject: payload.subject,
            body: payload.body,
            sent_at: now,
            received_at: now,
            flags: MailFlags {
                draft: true,
                ..MailFlags::default()
            },
        };
        insert_record_row(&tx, &record, payload.in_reply_to.as_deref())?;
        tx.execute(
            "INSERT INTO mailbox_entries (mailbox_id, record_id) VALUES (?1, ?2)",
            params![mailbox_id, record.id],
        )?;
        tx.commit()?;

        info!(user = %identity.user_id, draft = %record.id, mailbox = %mailbox_id, "mail store: draft created");
        Ok(record.id)
    }
}

fn insert_record_row(
    conn: &rusqlite::Connection,
    record: &EmailRecord,
    in_reply_to: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO email_records (id, mailbox_id, thread_id, in_reply_to, sender, recipients,
             subject, body, sent_at, received_at, is_draft, is_trashed, is_archived, is_unread,
             search_text, sender_folded)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            record.id,
            record.mailbox_id,
            record.thread_id,
            in_reply_to,
            record.sender,
            serde_json::to_string(&record.recipients)?,
            record.subject,
            record.body,
            format_ts(&record.sent_at),
            format_ts(&record.received_at),
            record.flags.draft,
            record.flags.trashed,
            record.flags.archived,
            record.flags.unread,
            fold_search_text(&record.subject, &record.sender, &record.body),
            fold_case(&record.sender),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl DataProvider for SqliteMailStore {
    async fn list_accessible_mailboxes(&self, identity: &Identity) -> CoreResult<Vec<Mailbox>> {
        Ok(self.accessible_mailboxes(identity)?)
    }

    async fn list_thread_messages(
        &self,
        thread_id: &str,
        identity: &Identity,
    ) -> CoreResult<Vec<EmailRecord>> {
        Ok(self.visible_records(
            identity,
            " AND r.thread_id = ?2 AND r.is_trashed = 0",
            "r.sent_at ASC, r.id ASC",
            vec![Value::Text(thread_id.to_string())],
        )?)
    }

    async fn get_record(&self, record_id: &str, identity: &Identity) -> CoreResult<EmailRecord> {
        Ok(self.fetch_record(record_id, identity)?)
    }

    async fn search_records(
        &self,
        identity: &Identity,
        query: BoundedRecordQuery,
    ) -> CoreResult<Vec<EmailRecord>> {
        Ok(self.run_search(identity, &query)?)
    }

    async fn create_draft(&self, identity: &Identity, payload: DraftPayload) -> CoreResult<String> {
        Ok(self.insert_draft(identity, payload)?)
    }

    async fn list_indexable_records(&self, identity: &Identity) -> CoreResult<Vec<EmailRecord>> {
        Ok(self.visible_records(
            identity,
            " AND r.is_trashed = 0 AND r.is_draft = 0",
            "r.id ASC",
            Vec::new(),
        )?)
    }
}
