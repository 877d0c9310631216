//! Request-level error taxonomy and its HTTP mapping.
//!
//! Every handler returns [`ReceiverError`]. The variant decides the status
//! code; the body is always `{"error": <description>}` except for 404, which
//! has no body. Broker failures also report the `id` of the record that was
//! already persisted, so a client can tell "not created" from "created but
//! not announced".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::publisher::PublishError;
use crate::store::StoreError;

/// Result alias for handlers.
pub type ReceiverResult<T> = Result<T, ReceiverError>;

/// Errors surfaced at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// The requested record does not exist.
    #[error("not found")]
    NotFound,

    /// The request body is not a JSON object of the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Store create/query failed.
    #[error("{0}")]
    Persistence(StoreError),

    /// The record was persisted but the broker could not be reached.
    #[error("{cause}")]
    BrokerConnect {
        /// Id of the persisted record.
        id: i64,
        /// Underlying connection failure.
        cause: String,
    },

    /// The record was persisted but publishing to the broker failed.
    #[error("{cause}")]
    BrokerPublish {
        /// Id of the persisted record.
        id: i64,
        /// Underlying channel/exchange/publish/close failure.
        cause: String,
    },
}

impl ReceiverError {
    /// Classify a publish failure for the record `id`.
    pub fn from_publish(id: i64, err: PublishError) -> Self {
        match err {
            e @ PublishError::Connect(_) => Self::BrokerConnect {
                id,
                cause: e.to_string(),
            },
            e @ PublishError::Publish(_) => Self::BrokerPublish {
                id,
                cause: e.to_string(),
            },
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Persistence(StoreError::Constraint(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BrokerConnect { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::BrokerPublish { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Persistence(_) => "persistence",
            Self::BrokerConnect { .. } => "broker_connect",
            Self::BrokerPublish { .. } => "broker_publish",
        }
    }

    /// Id of the record persisted before the failure, if any.
    pub fn persisted_id(&self) -> Option<i64> {
        match self {
            Self::BrokerConnect { id, .. } | Self::BrokerPublish { id, .. } => Some(*id),
            _ => None,
        }
    }

    fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                kind = self.kind(),
                status = status.as_u16(),
                persisted_id = self.persisted_id(),
                "request failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                kind = self.kind(),
                status = status.as_u16(),
                "request rejected"
            );
        }
    }
}

impl From<StoreError> for ReceiverError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::NotFound,
            other => Self::Persistence(other),
        }
    }
}

impl IntoResponse for ReceiverError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        if status == StatusCode::NOT_FOUND {
            return status.into_response();
        }

        let body = match self.persisted_id() {
            Some(id) => json!({ "error": self.to_string(), "id": id }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
