//! HTTP request handlers.
//!
//! The create path persists first and publishes second. A publish failure
//! never touches the stored row; it is reported with the row's id.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppContext;
use crate::error::{ReceiverError, ReceiverResult};
use crate::store::{Message, NewMessage};

/// Body of a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    /// Id assigned by the store.
    pub id: i64,
}

/// `GET /`
pub async fn index() -> &'static str {
    "receiver"
}

/// `GET /message/:id`
pub async fn get_message(
    State(context): State<Arc<AppContext>>,
    Path(raw_id): Path<String>,
) -> ReceiverResult<Json<Message>> {
    let id: i64 = raw_id.parse().map_err(|_| ReceiverError::NotFound)?;
    let message = context.store.get_by_id(id).await?;
    Ok(Json(message))
}

/// `GET /messages` and `GET /messages/`
pub async fn list_all_messages(
    State(context): State<Arc<AppContext>>,
) -> ReceiverResult<Json<Vec<Message>>> {
    let messages = context.store.list_all(0).await?;
    Ok(Json(messages))
}

/// `GET /messages/:n`
pub async fn list_messages(
    State(context): State<Arc<AppContext>>,
    Path(raw_count): Path<String>,
) -> ReceiverResult<Json<Vec<Message>>> {
    let count = parse_count(&raw_count)?;
    let messages = context.store.list_all(count).await?;
    Ok(Json(messages))
}

/// `POST /messages`
pub async fn create_message(
    State(context): State<Arc<AppContext>>,
    body: Bytes,
) -> ReceiverResult<Json<Created>> {
    let new: NewMessage = serde_json::from_slice(&body)
        .map_err(|e| ReceiverError::InvalidPayload(e.to_string()))?;
    let message = submit(&context, new).await?;
    Ok(Json(Created { id: message.id }))
}

/// Persist `new`, then announce it on the broker.
///
/// Routing key is the textual `source`, payload the textual `id`.
///
/// # Errors
///
/// A store failure means nothing was persisted or published. A broker
/// failure leaves the persisted row untouched and carries its id.
pub async fn submit(context: &AppContext, new: NewMessage) -> ReceiverResult<Message> {
    let message = context.store.create(new).await?;
    info!(id = message.id, source = message.source, "message persisted");

    context
        .publisher
        .publish(&message.routing_key(), &message.id.to_string())
        .await
        .map_err(|e| ReceiverError::from_publish(message.id, e))?;

    Ok(message)
}

/// Parse the optional count segment: digits only, empty or `0` means all.
///
/// Anything else does not name a listing and is a 404. Counts beyond `i64`
/// saturate, which still means "everything".
fn parse_count(raw: &str) -> ReceiverResult<i64> {
    if raw.is_empty() {
        return Ok(0);
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ReceiverError::NotFound);
    }
    Ok(raw.parse().unwrap_or(i64::MAX))
}
