//! End-to-end create/read scenario over the router.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::support::{get, json, memory_store, post_json, router_with, send, RecordingPublisher};

#[tokio::test]
async fn alice_scenario() {
    let publisher = Arc::new(RecordingPublisher::default());
    let router = router_with(memory_store().await, Arc::clone(&publisher));

    let (status, body) = send(
        &router,
        post_json("/messages", r#"{"recipient":"alice","source":7,"body":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({"id": 1}));

    let (status, body) = send(&router, get("/message/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!({"id": 1, "recipient": "alice", "source": 7, "status": "new", "body": "hello"})
    );

    assert_eq!(publisher.published(), vec![("7".to_owned(), "1".to_owned())]);
}
