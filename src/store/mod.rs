//! Message persistence.
//!
//! [`MessageStore`] is the only gateway to the `messages` table. Two sqlx
//! backends implement it: [`PgMessageStore`] for production and
//! [`SqliteMessageStore`] for local runs and tests. Every call is bounded by
//! the configured store timeout.

pub mod postgres;
pub mod sqlite;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DatabaseConfig;

pub use self::postgres::PgMessageStore;
pub use self::sqlite::SqliteMessageStore;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Status assigned to every message on creation.
pub const STATUS_NEW: &str = "new";

/// A persisted message, serialized as a flat JSON object of its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    /// Store-assigned primary key.
    pub id: i64,
    /// Free-form addressee label.
    pub recipient: Option<String>,
    /// Routing origin; its decimal text is the broker routing key.
    pub source: i32,
    /// Lifecycle status, `"new"` on creation.
    pub status: String,
    /// Text payload.
    pub body: Option<String>,
}

impl Message {
    /// Routing key used when announcing this message on the broker.
    pub fn routing_key(&self) -> String {
        self.source.to_string()
    }
}

/// Fields accepted when creating a message.
///
/// Every field is optional here; the table decides what is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Addressee label.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Routing origin.
    #[serde(default)]
    pub source: Option<i32>,
    /// Text payload.
    #[serde(default)]
    pub body: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from message store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row has the requested id.
    #[error("message {0} not found")]
    NotFound(i64),

    /// The row violates a table constraint (e.g. missing `source`).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Query or connection failure.
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// The store did not answer within the configured timeout.
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if is_constraint_violation(db.kind()) => {
                Self::Constraint(db.message().to_owned())
            }
            other => Self::Database(other),
        }
    }
}

fn is_constraint_violation(kind: sqlx::error::ErrorKind) -> bool {
    use sqlx::error::ErrorKind;
    matches!(
        kind,
        ErrorKind::NotNullViolation
            | ErrorKind::UniqueViolation
            | ErrorKind::CheckViolation
            | ErrorKind::ForeignKeyViolation
    )
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Accessor over the `messages` table.
///
/// Implementations must be safe for concurrent use; they are shared across
/// all in-flight requests behind an `Arc`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create the `messages` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert a new message with status `"new"` and return the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] when the row is rejected by the
    /// table (a missing `source`), or a database/timeout error.
    async fn create(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Fetch one message by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no row matches.
    async fn get_by_id(&self, id: i64) -> Result<Message, StoreError>;

    /// List messages in insertion order.
    ///
    /// `limit <= 0` returns every row; otherwise at most `limit` rows.
    async fn list_all(&self, limit: i64) -> Result<Vec<Message>, StoreError>;
}

/// Open the backend selected by `config`, apply the schema, and return it.
///
/// `config.url` starting with `sqlite:` selects SQLite; anything else (or the
/// individual `DB_*` fields) selects Postgres.
///
/// # Errors
///
/// Returns an error if the pool cannot connect or the schema cannot be created.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn MessageStore>, StoreError> {
    let store: Arc<dyn MessageStore> = match config.url.as_deref() {
        Some(url) if url.starts_with("sqlite:") => {
            info!(backend = "sqlite", "opening message store");
            Arc::new(SqliteMessageStore::connect(url, config).await?)
        }
        _ => {
            info!(
                backend = "postgres",
                host = %config.host,
                port = config.port,
                database = %config.database,
                "opening message store"
            );
            Arc::new(PgMessageStore::connect(config).await?)
        }
    };
    store.ensure_schema().await?;
    info!("message store ready");
    Ok(store)
}

/// Run a store future under the configured timeout.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// `None` when `limit` asks for every row.
pub(crate) fn effective_limit(limit: i64) -> Option<i64> {
    (limit > 0).then_some(limit)
}
