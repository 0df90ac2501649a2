//! Unit tests for core service refs and built-in service types

use std::sync::{Arc, Mutex};

use portico_plugin_api::core_services::{
    self, PluginLogger, PluginMetadata, RootLifecycleService,
};
use portico_plugin_api::{Error, ServiceScope};

/// Test the scope of every core service ref
#[test]
fn test_core_service_scopes() {
    assert_eq!(core_services::plugin_metadata().scope(), ServiceScope::Plugin);
    assert_eq!(core_services::logger().scope(), ServiceScope::Plugin);
    assert_eq!(core_services::root_lifecycle().scope(), ServiceScope::Root);
    assert_eq!(core_services::root_config().scope(), ServiceScope::Root);
    assert_eq!(core_services::feature_discovery().scope(), ServiceScope::Root);
    assert_eq!(core_services::root_commander().scope(), ServiceScope::Root);
    assert_eq!(core_services::logger().id(), core_services::LOGGER_ID);
}

/// Test that plugin-bound services report their plugin
#[test]
fn test_plugin_bound_services() {
    assert_eq!(PluginMetadata::new("alpha").plugin_id(), "alpha");
    let logger = PluginLogger::new("beta");
    assert_eq!(logger.plugin_id(), "beta");
    logger.info("logging without a subscriber is a no-op");
}

// =============================================================================
// Root lifecycle
// =============================================================================

/// Test that shutdown hooks run most recently registered first
#[tokio::test]
async fn test_shutdown_hooks_run_in_reverse_order() {
    let lifecycle = RootLifecycleService::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        lifecycle.add_shutdown_hook(label, move || async move {
            order.lock().unwrap().push(label);
            Ok(())
        });
    }
    assert_eq!(lifecycle.pending_hooks(), 3);

    let failures = lifecycle.shutdown().await;
    assert!(failures.is_empty());
    assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    assert_eq!(lifecycle.pending_hooks(), 0);
}

/// Test that a failing hook does not stop the others and is reported
#[tokio::test]
async fn test_shutdown_hook_failures_are_collected() {
    let lifecycle = RootLifecycleService::new();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let ran_ok = Arc::clone(&ran);
    lifecycle.add_shutdown_hook("db", move || async move {
        ran_ok.lock().unwrap().push("db");
        Ok(())
    });
    lifecycle.add_shutdown_hook("cache", || async { Err(Error::init("flush failed")) });

    let failures = lifecycle.shutdown().await;
    assert_eq!(failures, vec!["cache: flush failed".to_string()]);
    assert_eq!(*ran.lock().unwrap(), vec!["db"]);
}

/// Test that hooks only run once
#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let lifecycle = RootLifecycleService::new();
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    lifecycle.add_shutdown_hook("count", move || async move {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    lifecycle.shutdown().await;
    lifecycle.shutdown().await;
    assert_eq!(*count.lock().unwrap(), 1);
}
