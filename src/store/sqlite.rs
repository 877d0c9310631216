//! SQLite-backed [`MessageStore`] for local runs and tests.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::trace;

use super::{bounded, effective_limit, Message, MessageStore, NewMessage, StoreError, STATUS_NEW};
use crate::config::DatabaseConfig;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient TEXT,
    source INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    body TEXT
)";

/// Message store over a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteMessageStore {
    /// Open the database at `url` (e.g. `sqlite::memory:` or
    /// `sqlite://receiver.db`), creating the file if missing.
    ///
    /// An in-memory database lives on exactly one pooled connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the file cannot be opened.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .pragma("trusted_schema", "OFF");

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };

        let pool = pool_options
            .acquire_timeout(config.timeout())
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, config.timeout()))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        bounded(self.timeout, sqlx::query(SCHEMA).execute(&self.pool)).await?;
        Ok(())
    }

    async fn create(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = bounded(
            self.timeout,
            sqlx::query_as::<_, Message>(
                "INSERT INTO messages (recipient, source, status, body) \
                 VALUES (?1, ?2, ?3, ?4) \
                 RETURNING id, recipient, source, status, body",
            )
            .bind(&new.recipient)
            .bind(new.source)
            .bind(STATUS_NEW)
            .bind(&new.body)
            .fetch_one(&self.pool),
        )
        .await?;
        trace!(id = message.id, source = message.source, "message inserted");
        Ok(message)
    }

    async fn get_by_id(&self, id: i64) -> Result<Message, StoreError> {
        bounded(
            self.timeout,
            sqlx::query_as::<_, Message>(
                "SELECT id, recipient, source, status, body FROM messages WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<Message>, StoreError> {
        // Negative LIMIT is unlimited in SQLite.
        bounded(
            self.timeout,
            sqlx::query_as::<_, Message>(
                "SELECT id, recipient, source, status, body FROM messages \
                 ORDER BY id ASC LIMIT ?1",
            )
            .bind(effective_limit(limit).unwrap_or(-1))
            .fetch_all(&self.pool),
        )
        .await
    }
}
