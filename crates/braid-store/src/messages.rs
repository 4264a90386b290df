use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use braid_core::files::Attachment;
use braid_core::ids::{MessageRowId, ThreadId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;
use crate::track::Track;

/// Lifecycle of an AI reply row. Human messages are inserted `complete`;
/// placeholders move `pending → streaming → complete`, or `failed` when the
/// gateway errors. Content is never rolled back on failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Failed,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Streaming => write!(f, "streaming"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "streaming" => Ok(Self::Streaming),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown message status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageRow {
    pub row_id: MessageRowId,
    pub thread_id: ThreadId,
    pub content: String,
    pub author: String,
    pub owner_id: String,
    pub files: Vec<Attachment>,
    pub status: MessageStatus,
    pub created_at: String,
}

/// Track-generic message repository. Messages are ordered by insertion
/// (`row_id ASC`); there is no explicit sequence column.
pub struct MessageRepo {
    db: Database,
    track: Track,
}

impl MessageRepo {
    pub fn new(db: Database, track: Track) -> Self {
        Self { db, track }
    }

    #[instrument(skip(self, content, files), fields(track = %self.track, thread_id = %thread_id, author, owner_id))]
    pub fn insert(
        &self,
        thread_id: &ThreadId,
        content: &str,
        author: &str,
        owner_id: &str,
        files: &[Attachment],
        status: MessageStatus,
    ) -> Result<MessageRow, StoreError> {
        let table = self.track.messages_table();
        let now = Utc::now().to_rfc3339();
        let files_json = serde_json::to_string(files)?;

        self.db.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (thread_id, content, author, owner_id, files, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                rusqlite::params![
                    thread_id.as_str(),
                    content,
                    author,
                    owner_id,
                    files_json,
                    status.to_string(),
                    now,
                ],
            )?;

            Ok(MessageRow {
                row_id: MessageRowId::from_raw(conn.last_insert_rowid()),
                thread_id: thread_id.clone(),
                content: content.to_string(),
                author: author.to_string(),
                owner_id: owner_id.to_string(),
                files: files.to_vec(),
                status,
                created_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn get(&self, row_id: MessageRowId) -> Result<MessageRow, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, thread_id, content, author, owner_id, files, status, created_at
                 FROM {table} WHERE row_id = ?1"
            ))?;
            let mut rows = stmt.query([row_id.as_i64()])?;
            match rows.next()? {
                Some(row) => row_to_message(row),
                None => Err(StoreError::NotFound(format!("message {row_id}"))),
            }
        })
    }

    /// All messages of a thread in insertion order, regardless of owner.
    #[instrument(skip(self), fields(track = %self.track, thread_id = %thread_id))]
    pub fn list_by_thread(&self, thread_id: &ThreadId) -> Result<Vec<MessageRow>, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, thread_id, content, author, owner_id, files, status, created_at
                 FROM {table} WHERE thread_id = ?1 ORDER BY row_id ASC"
            ))?;
            let mut rows = stmt.query([thread_id.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }

    /// A thread's messages restricted to one owner, in insertion order.
    #[instrument(skip(self), fields(track = %self.track, thread_id = %thread_id, owner_id))]
    pub fn list_by_thread_for_owner(
        &self,
        thread_id: &ThreadId,
        owner_id: &str,
    ) -> Result<Vec<MessageRow>, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, thread_id, content, author, owner_id, files, status, created_at
                 FROM {table} WHERE thread_id = ?1 AND owner_id = ?2 ORDER BY row_id ASC"
            ))?;
            let mut rows = stmt.query(rusqlite::params![thread_id.as_str(), owner_id])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }

    /// Every message owned by an identity, across all threads.
    #[instrument(skip(self), fields(track = %self.track, owner_id))]
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<MessageRow>, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT row_id, thread_id, content, author, owner_id, files, status, created_at
                 FROM {table} WHERE owner_id = ?1 ORDER BY row_id ASC"
            ))?;
            let mut rows = stmt.query([owner_id])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_message(row)?);
            }
            Ok(results)
        })
    }

    /// Privileged full-content overwrite used by the streaming reply engine.
    /// Each call rewrites the whole accumulated text (last write wins) and
    /// advances the row to `streaming`. Returns the number of rows touched —
    /// zero when the row has been deleted mid-stream, which callers ignore.
    #[instrument(skip(self, content), fields(track = %self.track, row_id = %row_id))]
    pub fn update_content(
        &self,
        row_id: MessageRowId,
        content: &str,
    ) -> Result<usize, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let n = conn.execute(
                &format!("UPDATE {table} SET content = ?1, status = ?2 WHERE row_id = ?3"),
                rusqlite::params![content, MessageStatus::Streaming.to_string(), row_id.as_i64()],
            )?;
            Ok(n)
        })
    }

    /// Set the lifecycle status without touching content.
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id, status = %status))]
    pub fn set_status(
        &self,
        row_id: MessageRowId,
        status: MessageStatus,
    ) -> Result<usize, StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            let n = conn.execute(
                &format!("UPDATE {table} SET status = ?1 WHERE row_id = ?2"),
                rusqlite::params![status.to_string(), row_id.as_i64()],
            )?;
            Ok(n)
        })
    }

    /// Delete a single message row (used by promotion after copying).
    #[instrument(skip(self), fields(track = %self.track, row_id = %row_id))]
    pub fn delete(&self, row_id: MessageRowId) -> Result<(), StoreError> {
        let table = self.track.messages_table();
        self.db.with_conn(|conn| {
            conn.execute(
                &format!("DELETE FROM {table} WHERE row_id = ?1"),
                [row_id.as_i64()],
            )?;
            Ok(())
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<MessageRow, StoreError> {
    let files_raw: String = row_helpers::get(row, 5, "messages", "files")?;
    let status_raw: String = row_helpers::get(row, 6, "messages", "status")?;

    Ok(MessageRow {
        row_id: MessageRowId::from_raw(row_helpers::get(row, 0, "messages", "row_id")?),
        thread_id: ThreadId::from_raw(row_helpers::get::<String>(row, 1, "messages", "thread_id")?),
        content: row_helpers::get(row, 2, "messages", "content")?,
        author: row_helpers::get(row, 3, "messages", "author")?,
        owner_id: row_helpers::get(row, 4, "messages", "owner_id")?,
        files: row_helpers::parse_json(&files_raw, "messages", "files")?,
        status: row_helpers::parse_enum(&status_raw, "messages", "status")?,
        created_at: row_helpers::get(row, 7, "messages", "created_at")?,
    })
}
