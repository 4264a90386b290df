use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use braid_core::ids::{ThreadId, ThreadRowId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;
use crate::track::Track;

/// Title every thread starts with until the summarization task lands.
pub const DEFAULT_TITLE: &str = "New Thread";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadRow {
    pub row_id: ThreadRowId,
    pub id: ThreadId,
    pub title: String,
    pub is_public: bool,
    pub owner_id: String,
    pub created_at: String,
}

/// Track-generic thread repository. One instance per (database, track) pair;
/// the track only selects which table pair SQL runs against.
pub struct ThreadRepo {
    db: Database,
    track: Track,
}

impl ThreadRepo {
    pub fn new(db: Database, track: Track) -> Self {
        Self { db, track }
    }

    /// Insert a new thread. `id` is the client-generated external key.
    #[instrument(skip(self), fields(track = %self.track, thread_id = %id, owner_id))]
    pub fn insert(
        &self,
        id: &ThreadId,
        title: &str,
        is_public: bool,
        owner_id: &str,
    ) -> Result<ThreadRow, StoreError> {
        let table = self.track.threads_table();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (id, title, is_public, owner_id, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                rusqlite::params![id.as_str(), title, is_public, owner_id, now],
            )?;

            Ok(ThreadRow {
                row_id: ThreadRowId::from_raw(conn.last_insert_rowid()),
                id: id.clone(),
                title: title.to_string(),
                is_public,
                owner_id: owner_id.to_string(),
                created_at: now,
            })
        })
    }

    /// Get a thread by its storage row id.
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn get(&self, row_id: ThreadRowId) -> Result<ThreadRow, StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, id, title, is_public, owner_id, created_at
                 FROM {table} WHERE row_id = ?1"
            ))?;
            let mut rows = stmt.query([row_id.as_i64()])?;
            match rows.next()? {
                Some(row) => row_to_thread(row),
                None => Err(StoreError::NotFound(format!("thread {row_id}"))),
            }
        })
    }

    /// Look up a thread by its external id. Returns the first match.
    #[instrument(skip(self), fields(track = %self.track, thread_id = %id))]
    pub fn get_by_external_id(&self, id: &ThreadId) -> Result<Option<ThreadRow>, StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, id, title, is_public, owner_id, created_at
                 FROM {table} WHERE id = ?1 ORDER BY row_id ASC LIMIT 1"
            ))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_thread(row)?)),
                None => Ok(None),
            }
        })
    }

    /// List an owner's threads, newest first.
    #[instrument(skip(self), fields(track = %self.track, owner_id))]
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ThreadRow>, StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, id, title, is_public, owner_id, created_at
                 FROM {table} WHERE owner_id = ?1 ORDER BY row_id DESC"
            ))?;
            let mut rows = stmt.query([owner_id])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_thread(row)?);
            }
            Ok(results)
        })
    }

    /// Overwrite a thread's title. Last write wins; both the user rename path
    /// and the title-generation task go through here.
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn update_title(&self, row_id: ThreadRowId, title: &str) -> Result<(), StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE {table} SET title = ?1 WHERE row_id = ?2"),
                rusqlite::params![title, row_id.as_i64()],
            )?;
            Ok(())
        })
    }

    /// Mark a thread public. Idempotent.
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn set_public(&self, row_id: ThreadRowId) -> Result<(), StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            conn.execute(
                &format!("UPDATE {table} SET is_public = 1 WHERE row_id = ?1"),
                [row_id.as_i64()],
            )?;
            Ok(())
        })
    }

    /// Delete a thread and every message of its owner under the same external
    /// id, in one transaction (messages first, then the thread row).
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id, thread_id = %external_id))]
    pub fn delete_cascade(
        &self,
        row_id: ThreadRowId,
        external_id: &ThreadId,
        owner_id: &str,
    ) -> Result<(), StoreError> {
        let threads = self.track.threads_table();
        let messages = self.track.messages_table();
        self.db.with_tx(|tx| {
            tx.execute(
                &format!("DELETE FROM {messages} WHERE thread_id = ?1 AND owner_id = ?2"),
                rusqlite::params![external_id.as_str(), owner_id],
            )?;
            tx.execute(
                &format!("DELETE FROM {threads} WHERE row_id = ?1"),
                [row_id.as_i64()],
            )?;
            Ok(())
        })
    }

    /// Delete a single thread row (used by promotion after copying).
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn delete(&self, row_id: ThreadRowId) -> Result<(), StoreError> {
        let table = self.track.threads_table();
        self.db.with_conn(|conn| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE row_id = ?1"),
                [row_id.as_i64()],
            )?;
            Ok(())
        })
    }
}

fn row_to_thread(row: &rusqlite::Row<'_>) -> Result<ThreadRow, StoreError> {
    Ok(ThreadRow {
        row_id: ThreadRowId::from_raw(row_helpers::get(row, 0, "threads", "row_id")?),
        id: ThreadId::from_raw(row_helpers::get::<String>(row, 1, "threads", "id")?),
        title: row_helpers::get(row, 2, "threads", "title")?,
        is_public: row_helpers::get(row, 3, "threads", "is_public")?,
        owner_id: row_helpers::get(row, 4, "threads", "owner_id")?,
        created_at: row_helpers::get(row, 5, "threads", "created_at")?,
    })
}
