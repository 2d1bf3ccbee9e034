//! SQLite Persistent Collection State
//!
//! Durable per-user `IndexCollection` rows. Uses the shared DbPool from
//! `storage::database`. Creation is an atomic create-if-absent keyed on
//! `user_id`, so two racing callers always end up with the same collection.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::storage::database::DbPool;
use crate::utils::error::{AppError, AppResult};

/// Persisted index state for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexCollection {
    pub user_id: String,
    pub collection_id: String,
    /// None until the first successful index pass
    pub fingerprint: Option<String>,
    pub last_indexed_at: Option<DateTime<Utc>>,
    pub indexed_record_ids: Vec<String>,
}

/// Persistent collection store backed by SQLite.
#[derive(Debug, Clone)]
pub struct CollectionStore {
    pool: DbPool,
}

impl CollectionStore {
    /// Create a new store wrapping the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Return the user's collection id, creating the row if absent.
    ///
    /// `INSERT ... ON CONFLICT(user_id) DO NOTHING` followed by a read of
    /// the winning row.
    pub fn ensure(&self, user_id: &str) -> AppResult<String> {
        let conn = self.get_connection()?;
        let candidate = format!("col-{}", uuid::Uuid::new_v4());
        conn.execute(
            "INSERT INTO index_collections (user_id, collection_id)
             VALUES (?1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, candidate],
        )?;
        let collection_id: String = conn.query_row(
            "SELECT collection_id FROM index_collections WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(collection_id)
    }

    /// Load the full state for a user.
    ///
    /// Fails with `AppError::Database` when the row exists but cannot be
    /// decoded (bad timestamp, corrupt id list).
    pub fn load(&self, user_id: &str) -> AppResult<Option<IndexCollection>> {
        let conn = self.get_connection()?;
        let row = conn
            .query_row(
                "SELECT collection_id, fingerprint, last_indexed_at, indexed_record_ids
                 FROM index_collections WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((collection_id, fingerprint, last_indexed_at, ids_json)) = row else {
            return Ok(None);
        };

        let last_indexed_at = match last_indexed_at {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| {
                        AppError::database(format!("unreadable last_indexed_at '{}': {}", raw, e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let indexed_record_ids: Vec<String> = match ids_json {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                AppError::database(format!("unreadable indexed_record_ids: {}", e))
            })?,
            None => Vec::new(),
        };

        Ok(Some(IndexCollection {
            user_id: user_id.to_string(),
            collection_id,
            fingerprint,
            last_indexed_at,
            indexed_record_ids,
        }))
    }

    /// Persist a successful index pass.
    ///
    /// Fails with `NotFound` if the collection was reset in the meantime.
    pub fn record_indexed(
        &self,
        user_id: &str,
        collection_id: &str,
        fingerprint: &str,
        record_ids: &[String],
        indexed_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let conn = self.get_connection()?;
        let ids_json = serde_json::to_string(record_ids)?;
        let updated = conn.execute(
            "UPDATE index_collections
             SET fingerprint = ?3, last_indexed_at = ?4, indexed_record_ids = ?5,
                 updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?1 AND collection_id = ?2",
            params![
                user_id,
                collection_id,
                fingerprint,
                indexed_at.to_rfc3339(),
                ids_json
            ],
        )?;
        if updated == 0 {
            return Err(AppError::not_found(format!(
                "index collection {} for user {}",
                collection_id, user_id
            )));
        }
        Ok(())
    }

    /// Delete the user's collection. Returns whether a row existed.
    pub fn delete(&self, user_id: &str) -> AppResult<bool> {
        let conn = self.get_connection()?;
        let deleted = conn.execute(
            "DELETE FROM index_collections WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Number of collection rows for a user (0 or 1).
    pub fn count_for_user(&self, user_id: &str) -> AppResult<usize> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM index_collections WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_connection(&self) -> AppResult<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }
}
