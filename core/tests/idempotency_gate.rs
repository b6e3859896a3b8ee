//! Idempotency gate behaviour against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storefront_core::{GuardError, IdempotencyGate, IdempotencyKey};
use storefront_testing::{FailingKeyValueStore, InMemoryKeyValueStore, test_clock};

fn order_key(actor: &str) -> IdempotencyKey {
    IdempotencyKey::new(actor, "POST", "/api/orders")
}

#[tokio::test]
async fn first_request_acquires_and_stores_sentinel() {
    storefront_testing::init_test_tracing();
    let store = Arc::new(InMemoryKeyValueStore::with_clock(test_clock()));
    let gate = IdempotencyGate::new(Arc::clone(&store), Duration::from_secs(1));

    assert!(gate.try_acquire(&order_key("42")).await);
    assert!(store.contains_key("request-lock:42:POST:/api/orders"));
    assert_eq!(
        store.ttl("request-lock:42:POST:/api/orders"),
        Some(Duration::from_secs(1))
    );
}

#[tokio::test]
async fn repeat_within_ttl_is_rejected_and_released_after() {
    let clock = test_clock();
    let store = Arc::new(InMemoryKeyValueStore::with_clock(clock.clone()));
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));
    let key = order_key("42");

    assert!(gate.try_acquire(&key).await);
    clock.advance(Duration::from_millis(100));
    assert!(!gate.try_acquire(&key).await);

    clock.advance(Duration::from_millis(900));
    assert!(gate.try_acquire(&key).await);
}

#[tokio::test]
async fn different_actors_do_not_collide() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));

    assert!(gate.try_acquire(&order_key("1")).await);
    assert!(gate.try_acquire(&order_key("2")).await);
}

#[tokio::test]
async fn different_bodies_do_not_collide() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));

    let first = order_key("1").with_body(br#"{"productId":1}"#);
    let second = order_key("1").with_body(br#"{"productId":2}"#);
    let replay = order_key("1").with_body(br#"{"productId":1}"#);

    assert!(gate.try_acquire(&first).await);
    assert!(gate.try_acquire(&second).await);
    assert!(!gate.try_acquire(&replay).await);
}

#[tokio::test]
async fn path_suffix_does_not_collide_with_body_fingerprint() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(Arc::clone(&store), Duration::from_secs(1));
    let body = br#"{"productId":1}"#;
    let digest = storefront_core::idempotency::fingerprint(body);

    let bodyless = IdempotencyKey::new("7", "POST", format!("/api/orders:{digest}"));
    assert!(gate.try_acquire(&bodyless).await);
    assert!(gate.try_acquire(&order_key("7").with_body(body)).await);
    assert_eq!(store.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_admit_exactly_one() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.try_acquire(&order_key("42")).await })
        })
        .collect();

    let mut acquired = 0;
    for handle in handles {
        if handle.await.unwrap() {
            acquired += 1;
        }
    }
    assert_eq!(acquired, 1);
}

#[tokio::test]
async fn store_failure_rejects() {
    storefront_testing::init_test_tracing();
    let store = Arc::new(FailingKeyValueStore::new());
    let gate = IdempotencyGate::new(Arc::clone(&store), Duration::from_secs(1));

    assert!(!gate.try_acquire(&order_key("42")).await);
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn guard_runs_operation_once() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));
    let runs = Arc::new(AtomicUsize::new(0));

    let op = || {
        let runs = Arc::clone(&runs);
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>("created")
        }
    };

    let first = gate.guard(&order_key("42"), op).await;
    assert_eq!(first.unwrap(), "created");

    let second = gate.guard(&order_key("42"), op).await;
    match second {
        Err(GuardError::Duplicate { key }) => {
            assert_eq!(key, "request-lock:42:POST:/api/orders");
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn guard_surfaces_operation_error() {
    let store = Arc::new(InMemoryKeyValueStore::new());
    let gate = IdempotencyGate::new(store, Duration::from_secs(1));

    let result: Result<(), GuardError<String>> = gate
        .guard(&order_key("42"), || async { Err("out of stock".to_string()) })
        .await;

    match result {
        Err(GuardError::Operation(message)) => assert_eq!(message, "out of stock"),
        other => panic!("expected operation error, got {other:?}"),
    }
}

#[tokio::test]
async fn guard_does_not_run_when_store_is_down() {
    let gate = IdempotencyGate::new(Arc::new(FailingKeyValueStore::new()), Duration::from_secs(1));
    let ran = AtomicUsize::new(0);

    let result = gate
        .guard(&order_key("42"), || async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok::<_, std::io::Error>(())
        })
        .await;

    assert!(result.unwrap_err().is_duplicate());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}
