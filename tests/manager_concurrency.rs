//! Concurrency tests for lazy store initialization
//!
//! Exercises the per-name exclusive init: racing first use, shared failure,
//! retry after failure, parallelism across names and caller cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fake_manager, FakeBackend, FAKE_BACKEND};
use secretplane::secrets::{ComponentDescriptor, StoreInstanceManager};
use secretplane::ErrorKind;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_runs_init_once() {
    let backend = FakeBackend::new().with_init_delay(Duration::from_millis(50));
    let manager = fake_manager(&backend, &["shared"]);

    let callers: Vec<_> = (0..32)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.resolve("shared").await })
        })
        .collect();

    let mut stores = Vec::new();
    for caller in callers {
        stores.push(caller.await.unwrap().unwrap());
    }

    assert_eq!(backend.probe.inits(), 1);
    assert!(stores.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(manager.is_initialized("shared"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_init_failure() {
    let backend =
        FakeBackend::new().with_init_delay(Duration::from_millis(50)).with_init_failures(1);
    let manager = fake_manager(&backend, &["flaky"]);

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.resolve("flaky").await })
        })
        .collect();

    for caller in callers {
        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
        assert!(err.to_string().contains("connection refused"));
    }
    assert_eq!(backend.probe.inits(), 1);
    assert!(!manager.is_initialized("flaky"));
}

#[tokio::test]
async fn test_failed_init_retried_on_next_call() {
    let backend = FakeBackend::new().with_init_failures(1);
    let manager = fake_manager(&backend, &["flaky"]);

    assert!(manager.resolve("flaky").await.is_err());
    assert_eq!(backend.probe.inits(), 1);

    manager.resolve("flaky").await.unwrap();
    assert_eq!(backend.probe.inits(), 2);
    assert!(manager.is_initialized("flaky"));

    manager.resolve("flaky").await.unwrap();
    assert_eq!(backend.probe.inits(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_names_initialize_in_parallel() {
    // Each init waits for the other; serialized initialization would deadlock
    let barrier = Arc::new(Barrier::new(2));
    let backend = FakeBackend::new().with_init_barrier(barrier);
    let manager = fake_manager(&backend, &["left", "right"]);

    let both = async { tokio::join!(manager.resolve("left"), manager.resolve("right")) };
    let (left, right) = tokio::time::timeout(Duration::from_secs(5), both)
        .await
        .expect("inits for distinct names must not serialize");

    assert!(left.is_ok());
    assert!(right.is_ok());
    assert_eq!(backend.probe.inits(), 2);
}

#[tokio::test]
async fn test_same_backend_type_gets_separate_instances() {
    let backend = FakeBackend::new();
    let manager = fake_manager(&backend, &["first", "second"]);

    let first = manager.resolve("first").await.unwrap();
    let second = manager.resolve("second").await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(backend.probe.inits(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_caller_does_not_abort_init() {
    let backend = FakeBackend::new().with_init_delay(Duration::from_millis(100));
    let manager = fake_manager(&backend, &["slow"]);

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.resolve("slow").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    manager.resolve("slow").await.unwrap();
    assert_eq!(backend.probe.inits(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_init_after_cancelled_caller_is_retried() {
    let backend =
        FakeBackend::new().with_init_delay(Duration::from_millis(50)).with_init_failures(1);
    let manager = fake_manager(&backend, &["flaky"]);

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.resolve("flaky").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    // Let the abandoned attempt fail with nobody waiting on it
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.probe.inits(), 1);
    assert!(!manager.is_initialized("flaky"));

    manager.resolve("flaky").await.unwrap();
    assert_eq!(backend.probe.inits(), 2);
    assert!(manager.is_initialized("flaky"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_init_completes_without_any_waiting_caller() {
    let backend = FakeBackend::new().with_init_delay(Duration::from_millis(50));
    let manager = fake_manager(&backend, &["slow"]);

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.resolve("slow").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    first.abort();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.is_initialized("slow"));
    assert!(manager.instance("slow").is_some());
    assert_eq!(backend.probe.inits(), 1);
}

#[tokio::test]
async fn test_init_timeout_is_not_cached() {
    let backend = FakeBackend::new().with_init_delay(Duration::from_millis(500));
    let manager = StoreInstanceManager::with_init_timeout(
        Arc::new(backend.registry()),
        Duration::from_millis(20),
    );
    manager.configure(ComponentDescriptor::new("slow", FAKE_BACKEND)).unwrap();

    let err = manager.resolve("slow").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(err.is_retryable());
    assert!(!manager.is_initialized("slow"));
}

#[tokio::test]
async fn test_shutdown_closes_every_instance() {
    let backend = FakeBackend::new();
    let manager = fake_manager(&backend, &["a", "b", "c"]);

    for (name, outcome) in manager.initialize_all().await {
        assert!(outcome.is_ok(), "store {} failed to initialize", name);
    }
    manager.shutdown().await;

    assert_eq!(backend.probe.closes(), 3);
    assert!(manager.store_names().iter().all(|name| !manager.is_initialized(name)));
}
