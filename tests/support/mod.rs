//! Shared fixtures: in-memory store, fake publishers, and request helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use receiver::app::{self, AppContext};
use receiver::config::DatabaseConfig;
use receiver::publisher::{PublishError, Publisher};
use receiver::store::{MessageStore, SqliteMessageStore};

/// Open a fresh in-memory SQLite store with the schema applied.
pub async fn memory_store() -> Arc<SqliteMessageStore> {
    let store = SqliteMessageStore::connect("sqlite::memory:", &DatabaseConfig::default())
        .await
        .expect("in-memory store should open");
    store.ensure_schema().await.expect("schema should apply");
    Arc::new(store)
}

/// Publisher that records every call and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    /// `(routing_key, payload)` pairs in publish order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, routing_key: &str, payload: &str) -> Result<(), PublishError> {
        self.published
            .lock()
            .expect("lock poisoned")
            .push((routing_key.to_owned(), payload.to_owned()));
        Ok(())
    }
}

/// Publisher that fails every call with a fixed error.
#[derive(Debug)]
pub struct FailingPublisher {
    error: PublishError,
    attempts: AtomicUsize,
}

impl FailingPublisher {
    /// Fail with [`PublishError::Connect`].
    pub fn unreachable() -> Self {
        Self {
            error: PublishError::Connect("connection refused".to_owned()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Fail with [`PublishError::Publish`].
    pub fn rejecting() -> Self {
        Self {
            error: PublishError::Publish("declare exchange: access refused".to_owned()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of publish calls seen.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    async fn publish(&self, _routing_key: &str, _payload: &str) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Router over `store` and `publisher`.
pub fn router_with<P: Publisher + 'static>(
    store: Arc<SqliteMessageStore>,
    publisher: Arc<P>,
) -> Router {
    let context = AppContext::new(store, publisher);
    app::router(Arc::new(context))
}

/// Drive one request through the router and collect the response.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, body)
}

/// Build a `GET` request.
pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("request should build")
}

/// Build a `POST` request with a JSON body.
pub fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_owned()))
        .expect("request should build")
}

/// Parse a response body as JSON.
pub fn json(body: &Bytes) -> serde_json::Value {
    serde_json::from_slice(body).expect("body should be JSON")
}
