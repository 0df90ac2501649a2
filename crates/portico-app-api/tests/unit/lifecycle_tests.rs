//! Unit tests for shutdown coordination

use std::sync::Arc;
use std::time::Duration;

use portico_app_api::{RunMode, ShutdownCoordinator};

/// Test the initial state of a coordinator
#[test]
fn test_coordinator_starts_running() {
    let coordinator = ShutdownCoordinator::new();
    assert!(!coordinator.is_shutting_down());
    assert!(format!("{coordinator:?}").contains("is_shutting_down: false"));
}

/// Test that waiting after a signal returns immediately
#[tokio::test]
async fn test_wait_after_signal_returns() {
    let coordinator = ShutdownCoordinator::new();
    coordinator.signal_shutdown();
    assert!(coordinator.is_shutting_down());

    tokio::time::timeout(Duration::from_millis(100), coordinator.wait_for_shutdown())
        .await
        .expect("wait_for_shutdown should return once shutdown was signalled");
}

/// Test that every waiter is woken by a signal from another task
#[tokio::test]
async fn test_signal_wakes_waiters() {
    let coordinator = Arc::new(ShutdownCoordinator::default());

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.wait_for_shutdown().await })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    coordinator.signal_shutdown();

    for waiter in waiters {
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .unwrap();
    }
}

/// Test that a second signal is harmless
#[test]
fn test_signal_twice() {
    let coordinator = ShutdownCoordinator::new();
    coordinator.signal_shutdown();
    coordinator.signal_shutdown();
    assert!(coordinator.is_shutting_down());
}

/// Test the default run mode
#[test]
fn test_default_run_mode() {
    assert_eq!(RunMode::default(), RunMode::UntilShutdown);
}
