//! Chat persistence seam. Implementations are synchronous and are driven from
//! `tokio::task::spawn_blocking`.

use crate::db::{DbPool, StoreError};

use super::ChatMessage;

pub trait ChatStore: Send + Sync + 'static {
    /// Append one message.
    fn insert(&self, message: &ChatMessage) -> Result<(), StoreError>;

    /// The most recent `limit` messages, oldest first.
    fn recent(&self, limit: u32) -> Result<Vec<ChatMessage>, StoreError>;

    /// Total stored messages. Not used on the serving path; tests read it to
    /// check that each chat line was stored once.
    fn count(&self) -> Result<u64, StoreError>;
}

/// `chat_messages` table in the shared SQLite database.
#[derive(Clone)]
pub struct SqliteChatStore {
    db: DbPool,
}

impl SqliteChatStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl ChatStore for SqliteChatStore {
    fn insert(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        conn.execute(
            "INSERT INTO chat_messages (user_name, message, timestamp) VALUES (?1, ?2, ?3)",
            rusqlite::params![message.user_name, message.message, message.timestamp],
        )?;
        Ok(())
    }

    fn recent(&self, limit: u32) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;

        // Newest `limit` rows by insertion id, re-sorted ascending.
        let mut stmt = conn.prepare(
            "SELECT user_name, message, timestamp FROM (
                 SELECT id, user_name, message, timestamp FROM chat_messages
                 ORDER BY id DESC LIMIT ?1
             ) ORDER BY id ASC",
        )?;

        let messages = stmt
            .query_map(rusqlite::params![limit], |row| {
                Ok(ChatMessage {
                    user_name: row.get(0)?,
                    message: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::LockPoisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Insert `message` without blocking the async runtime.
pub async fn persist(
    store: std::sync::Arc<dyn ChatStore>,
    message: ChatMessage,
) -> Result<(), StoreError> {
    tokio::task::spawn_blocking(move || store.insert(&message)).await?
}

/// Fetch recent history without blocking the async runtime.
pub async fn load_recent(
    store: std::sync::Arc<dyn ChatStore>,
    limit: u32,
) -> Result<Vec<ChatMessage>, StoreError> {
    tokio::task::spawn_blocking(move || store.recent(limit)).await?
}
