//! Postgres-backed [`MessageStore`].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::trace;

use super::{bounded, effective_limit, Message, MessageStore, NewMessage, StoreError, STATUS_NEW};
use crate::config::DatabaseConfig;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS messages (
    id BIGSERIAL PRIMARY KEY,
    recipient TEXT,
    source INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    body TEXT
)";

/// Message store over a shared Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgMessageStore {
    /// Connect a pool using `config.url` when set, otherwise the `DB_*` fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or the server is unreachable.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = match config.url.as_deref() {
            Some(url) => url.parse::<PgConnectOptions>()?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(&config.database),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.timeout())
            .connect_with(options)
            .await?;

        Ok(Self::from_pool(pool, config.timeout()))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        bounded(self.timeout, sqlx::query(SCHEMA).execute(&self.pool)).await?;
        Ok(())
    }

    async fn create(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = bounded(
            self.timeout,
            sqlx::query_as::<_, Message>(
                "INSERT INTO messages (recipient, source, status, body) \
                 VALUES ($1, $2, $3, $4) \
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
                "SELECT id, recipient, source, status, body FROM messages WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(StoreError::NotFound(id))
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<Message>, StoreError> {
        // LIMIT NULL is unlimited in Postgres.
        bounded(
            self.timeout,
            sqlx::query_as::<_, Message>(
                "SELECT id, recipient, source, status, body FROM messages \
                 ORDER BY id ASC LIMIT $1",
            )
            .bind(effective_limit(limit))
            .fetch_all(&self.pool),
        )
        .await
    }
}
