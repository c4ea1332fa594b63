//! libSQL-backed message persistence
//!
//! Implements the relay's [`MessageStore`] seam over a local libSQL
//! database. The store is append-only: the relay writes one row per
//! relayed message and never reads the log back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use libsql::Connection;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use rookery_relay::{MessageRecord, MessageStore, RelayError};

/// SQL schema for the message log.
pub const MESSAGES_SCHEMA: &str = r#"
-- Append-only chat message log
CREATE TABLE IF NOT EXISTS messages (
    -- Record ID: UUID v7, time-sortable
    id TEXT PRIMARY KEY,
    -- Identity of the sending user
    sender_id TEXT NOT NULL,
    -- Identity of the intended receiver
    receiver_id TEXT NOT NULL,
    -- Message body
    content TEXT NOT NULL,
    -- Timestamp when the relay accepted the message (RFC 3339)
    created_at TEXT NOT NULL
);

-- Index for reading a user's inbox in time order
CREATE INDEX IF NOT EXISTS idx_messages_receiver_created
    ON messages(receiver_id, created_at DESC);
"#;

/// libSQL-based implementation of [`MessageStore`].
#[derive(Clone)]
pub struct LibSqlMessageStore {
    /// Database connection.
    /// For in-memory databases, this must be a persistent connection.
    conn: Arc<Mutex<Connection>>,
    /// Whether the schema has been initialized.
    initialized: Arc<AtomicBool>,
}

impl LibSqlMessageStore {
    /// Create a store over an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Open a store at `path`; pass `:memory:` for an in-process database.
    pub async fn open(path: &str) -> Result<Self, RelayError> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RelayError::storage(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| RelayError::storage(e.to_string()))?;

        Ok(Self::new(conn))
    }

    /// Initialize the database schema if not already done.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<(), RelayError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let conn = self.conn.lock().await;
        conn.execute_batch(MESSAGES_SCHEMA)
            .await
            .map_err(|e| RelayError::storage(e.to_string()))?;

        self.initialized.store(true, Ordering::Release);
        debug!("Message log schema initialized");

        Ok(())
    }

    /// Check that the database answers queries.
    pub async fn health_check(&self) -> Result<bool, RelayError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query("SELECT 1", ())
            .await
            .map_err(|e| RelayError::storage(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| RelayError::storage(e.to_string()))?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl MessageStore for LibSqlMessageStore {
    #[instrument(skip(self, record), fields(message_id = %record.id))]
    async fn persist(&self, record: &MessageRecord) -> Result<(), RelayError> {
        // Ensure schema is initialized
        self.initialize().await?;

        let id = record.id.to_string();
        let created_at = record.created_at.to_rfc3339();

        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            (
                id.as_str(),
                record.sender_id.as_str(),
                record.receiver_id.as_str(),
                record.content.as_str(),
                created_at.as_str(),
            ),
        )
        .await
        .map_err(|e| RelayError::storage(e.to_string()))?;

        debug!("Message persisted");

        Ok(())
    }
}
