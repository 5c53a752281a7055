//! Integration test verifying that `#[instrument]` annotations produce the
//! expected spans for backend operations and the stores built on them.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use togo_storage::{
    BackendIdentityStore, BackendTaskStore, CalendarDay, IdentityStore, MemoryBackend,
    StorageBackend, Task, TaskStore, UserId,
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn assert_spans(recorded: &[String], expected: &[&str]) {
    for name in expected {
        assert!(recorded.iter().any(|s| s == name), "missing span '{name}', recorded: {recorded:?}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_operations_produce_distinct_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MemoryBackend::new();
    backend.set(b"k".to_vec(), b"v".to_vec()).await.expect("set");
    let _ = backend.get(b"k").await;
    let _ = backend.compare_and_set(b"k", Some(b"v".as_slice()), b"w".to_vec()).await;
    let _ = backend.get_range(b"a".to_vec()..b"z".to_vec()).await;
    let txn = backend.transaction().await.expect("transaction");
    txn.commit().await.expect("commit");
    let _ = backend.health_check().await;

    let recorded = spans.lock().expect("lock poisoned");
    assert_spans(
        &recorded,
        &["set", "get", "compare_and_set", "get_range", "transaction", "commit", "health_check"],
    );
}

#[tokio::test]
async fn store_operations_wrap_backend_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MemoryBackend::new();
    let identities = BackendIdentityStore::new(backend.clone());
    let tasks = BackendTaskStore::new(backend);
    let owner = UserId::parse("firstUser").expect("non-empty id");
    let day: CalendarDay = "2026-10-16".parse().expect("valid day");

    identities.create_user(&owner, "example", 5).await.expect("create user");
    let _ = identities.validate_credential(&owner, "example").await;
    let _ = identities.get_limit(&owner).await;

    let task =
        Task { id: Uuid::new_v4(), content: "x".into(), user_id: owner.clone(), created_date: day };
    tasks.insert_task_within_limit(&task, 5).await.expect("insert");
    let _ = tasks.count_tasks(&owner, day).await;
    let _ = tasks.list_tasks(&owner, None).await;

    let recorded = spans.lock().expect("lock poisoned");
    assert_spans(
        &recorded,
        &[
            "create_user",
            "validate_credential",
            "get_limit",
            "insert_task_within_limit",
            "count_tasks",
            "list_tasks",
            "commit",
        ],
    );
}
