//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//!
//! Tables:
//! - `index_collections` - per-user search index state (owned by the index cache)
//! - `mailboxes`, `mailbox_access` - containers and access grants
//! - `email_records` - messages
//! - `mailbox_entries` - visibility links; a record is only visible in a
//!   mailbox through an entry

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Unicode lowercase. SQLite's `lower()` only folds ASCII, so text matched
/// with `LIKE` is folded here and stored.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Folded subject, sender and body as stored in `email_records.search_text`.
pub fn fold_search_text(subject: &str, sender: &str, body: &str) -> String {
    fold_case(&format!("{}\n{}\n{}", subject, sender, body))
}

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a database from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory database for testing.
    ///
    /// Uses an in-memory SQLite database with the same schema as the
    /// production database. The pool holds a single connection so every
    /// caller sees the same database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open the database at ~/.mailpilot/data.db
    pub fn new() -> AppResult<Self> {
        Self::open(database_path()?)
    }

    /// Open (or create) a database file at `path`
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let db_path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        // One row per user; the primary key makes create-if-absent atomic
        conn.execute(
            "CREATE TABLE IF NOT EXISTS index_collections (
                user_id TEXT PRIMARY KEY,
                collection_id TEXT NOT NULL UNIQUE,
                fingerprint TEXT,
                last_indexed_at TEXT,
                indexed_record_ids TEXT NOT NULL DEFAULT '[]',
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS mailboxes (
                id TEXT PRIMARY KEY,
                owner_user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS mailbox_access (
                mailbox_id TEXT NOT NULL REFERENCES mailboxes(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                granted_at TEXT DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (mailbox_id, user_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS email_records (
                id TEXT PRIMARY KEY,
                mailbox_id TEXT NOT NULL REFERENCES mailboxes(id) ON DELETE CASCADE,
                thread_id TEXT,
                in_reply_to TEXT,
                sender TEXT NOT NULL,
                recipients TEXT NOT NULL DEFAULT '[]',
                subject TEXT NOT NULL DEFAULT '',
                body TEXT NOT NULL DEFAULT '',
                sent_at TEXT NOT NULL,
                received_at TEXT NOT NULL,
                is_draft INTEGER NOT NULL DEFAULT 0,
                is_trashed INTEGER NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                is_unread INTEGER NOT NULL DEFAULT 0,
                search_text TEXT NOT NULL DEFAULT '',
                sender_folded TEXT NOT NULL DEFAULT ''
            )",
            [],
        )?;

        // Older files predate the folded search columns; add and backfill them.
        if !Self::table_has_column(&conn, "email_records", "search_text") {
            conn.execute_batch(
                "ALTER TABLE email_records ADD COLUMN search_text TEXT NOT NULL DEFAULT '';
                 ALTER TABLE email_records ADD COLUMN sender_folded TEXT NOT NULL DEFAULT '';",
            )?;
            Self::backfill_search_text(&conn)?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS mailbox_entries (
                mailbox_id TEXT NOT NULL REFERENCES mailboxes(id) ON DELETE CASCADE,
                record_id TEXT NOT NULL REFERENCES email_records(id) ON DELETE CASCADE,
                linked_at TEXT DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (mailbox_id, record_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_email_records_thread ON email_records(thread_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_email_records_received ON email_records(received_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_mailbox_access_user ON mailbox_access(user_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_mailbox_entries_record ON mailbox_entries(record_id)",
            [],
        )?;

        Ok(())
    }

    fn table_has_column(conn: &rusqlite::Connection, table: &str, column: &str) -> bool {
        let Ok(mut stmt) = conn.prepare(&format!("PRAGMA table_info({})", table)) else {
            return false;
        };
        let Ok(names) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
            return false;
        };
        let found = names.flatten().any(|name| name == column);
        found
    }

    fn backfill_search_text(conn: &rusqlite::Connection) -> AppResult<()> {
        let rows: Vec<(String, String, String, String)> = {
            let mut stmt = conn.prepare("SELECT id, subject, sender, body FROM email_records")?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            mapped.collect::<Result<Vec<_>, _>>()?
        };
        for (id, subject, sender, body) in &rows {
            conn.execute(
                "UPDATE email_records SET search_text = ?2, sender_folded = ?3 WHERE id = ?1",
                rusqlite::params![id, fold_search_text(subject, sender, body), fold_case(sender)],
            )?;
        }
        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.state().connections)
            .finish()
    }
}
