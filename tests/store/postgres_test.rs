//! Tests for `src/store/postgres.rs`.
//!
//! These need a live server and only run when `DATABASE_URL` points at
//! Postgres. Each test gets its own schema through `search_path`, so runs
//! never see each other's rows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use receiver::store::{MessageStore, NewMessage, PgMessageStore, StoreError, STATUS_NEW};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

static NEXT_SCHEMA: AtomicUsize = AtomicUsize::new(0);

fn postgres_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres://") || url.starts_with("postgresql://"))
}

/// Store scoped to a fresh schema, or `None` when no server is configured.
async fn scoped_store() -> Option<PgMessageStore> {
    let Some(url) = postgres_url() else {
        eprintln!("DATABASE_URL is not a Postgres URL; skipping");
        return None;
    };
    let schema = format!(
        "receiver_test_{}_{}",
        std::process::id(),
        NEXT_SCHEMA.fetch_add(1, Ordering::SeqCst)
    );

    let base: PgConnectOptions = url.parse().expect("DATABASE_URL should parse");
    let admin = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(base.clone())
        .await
        .expect("postgres should accept connections");
    sqlx::query(&format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
        .execute(&admin)
        .await
        .expect("drop stale schema");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("create schema");
    admin.close().await;

    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect_with(base.options([("search_path", schema.as_str())]))
        .await
        .expect("scoped pool should connect");
    let store = PgMessageStore::from_pool(pool, Duration::from_secs(5));
    store.ensure_schema().await.expect("schema should apply");
    Some(store)
}

fn new_message(recipient: &str, source: i32, body: &str) -> NewMessage {
    NewMessage {
        recipient: Some(recipient.to_owned()),
        source: Some(source),
        body: Some(body.to_owned()),
    }
}

#[tokio::test]
async fn pg_create_returns_row_from_insert_returning() {
    let Some(store) = scoped_store().await else {
        return;
    };

    let message = store
        .create(new_message("alice", 7, "hello"))
        .await
        .expect("create should succeed");

    assert_eq!(message.id, 1);
    assert_eq!(message.recipient.as_deref(), Some("alice"));
    assert_eq!(message.source, 7);
    assert_eq!(message.status, STATUS_NEW);
    assert_eq!(store.get_by_id(message.id).await.expect("get"), message);
}

#[tokio::test]
async fn pg_create_without_source_is_a_constraint_violation() {
    let Some(store) = scoped_store().await else {
        return;
    };

    let result = store
        .create(NewMessage {
            recipient: Some("alice".to_owned()),
            source: None,
            body: Some("hello".to_owned()),
        })
        .await;

    assert!(
        matches!(result, Err(StoreError::Constraint(_))),
        "expected constraint violation, got {result:?}"
    );
    assert!(store.list_all(0).await.expect("list").is_empty());
}

#[tokio::test]
async fn pg_get_by_id_missing_is_not_found() {
    let Some(store) = scoped_store().await else {
        return;
    };

    let result = store.get_by_id(999).await;

    assert!(matches!(result, Err(StoreError::NotFound(999))));
}

#[tokio::test]
async fn pg_list_all_on_empty_table_is_empty() {
    let Some(store) = scoped_store().await else {
        return;
    };

    assert!(store.list_all(0).await.expect("all").is_empty());
    assert!(store.list_all(5).await.expect("bounded").is_empty());
}

#[tokio::test]
async fn pg_list_all_respects_limit_and_insertion_order() {
    let Some(store) = scoped_store().await else {
        return;
    };
    for i in 0..5 {
        store
            .create(new_message("r", i, &format!("m{i}")))
            .await
            .expect("create");
    }

    let all = store.list_all(0).await.expect("unbounded");
    let sources: Vec<i32> = all.iter().map(|m| m.source).collect();
    assert_eq!(sources, vec![0, 1, 2, 3, 4]);

    assert_eq!(store.list_all(-1).await.expect("negative").len(), 5);
    assert_eq!(store.list_all(2).await.expect("two"), all[..2].to_vec());
    assert_eq!(store.list_all(50).await.expect("fifty").len(), 5);
}

#[tokio::test]
async fn pg_ensure_schema_is_idempotent() {
    let Some(store) = scoped_store().await else {
        return;
    };
    store.create(new_message("a", 1, "x")).await.expect("create");

    store.ensure_schema().await.expect("second apply");

    assert_eq!(store.list_all(0).await.expect("all").len(), 1);
}
