//! Unit tests for the service registry

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use portico_app_api::ServiceRegistry;
use portico_plugin_api::core_services::{self, PluginMetadata};
use portico_plugin_api::{Error, ServiceFactory, ServiceRef, ServiceScope, downcast_instance};

/// Plugin id recorded by a plugin-scoped test service
#[derive(Debug)]
struct Owner(String);

fn counting_factory(service: ServiceRef, counter: &Arc<AtomicUsize>) -> ServiceFactory {
    let counter = Arc::clone(counter);
    ServiceFactory::builder(service).factory(move |ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(Owner(ctx.plugin_id().to_string()))
        }
    })
}

async fn owner_of(registry: &ServiceRegistry, service: &ServiceRef, plugin_id: &str) -> Arc<Owner> {
    let instance = registry.get(service, plugin_id).await.unwrap().expect("registered");
    downcast_instance::<Owner>(&instance).expect("owner")
}

// =============================================================================
// Registration
// =============================================================================

/// Test that registering two factories for one id fails
#[test]
fn test_duplicate_factory_rejected() {
    let factory = || ServiceFactory::builder(ServiceRef::root("acme.db")).factory(|_| async { Ok(1_u8) });
    let err = ServiceRegistry::create([factory(), factory()]).unwrap_err();
    assert!(matches!(err, Error::DuplicateService { ref service_id } if service_id == "acme.db"));
}

/// Test registry introspection
#[test]
fn test_service_ids() {
    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::root("b")).factory(|_| async { Ok(()) }),
        ServiceFactory::builder(ServiceRef::root("a")).factory(|_| async { Ok(()) }),
    ])
    .unwrap();
    assert!(registry.has("a"));
    assert!(!registry.has("c"));
    assert_eq!(registry.service_ids(), vec!["a".to_string(), "b".to_string()]);
}

/// Test that an unknown service resolves to nothing
#[tokio::test]
async fn test_unknown_service_is_none() {
    let registry = ServiceRegistry::create(Vec::new()).unwrap();
    let result = registry.get(&ServiceRef::root("acme.missing"), "alpha").await.unwrap();
    assert!(result.is_none());
}

/// Test that plugin metadata is available without a factory
#[tokio::test]
async fn test_builtin_plugin_metadata() {
    let registry = ServiceRegistry::create(Vec::new()).unwrap();
    let instance = registry
        .get(&core_services::plugin_metadata(), "alpha")
        .await
        .unwrap()
        .unwrap();
    let metadata = downcast_instance::<PluginMetadata>(&instance).unwrap();
    assert_eq!(metadata.plugin_id(), "alpha");
}

// =============================================================================
// Scoping and memoization
// =============================================================================

/// Test that concurrent first access builds a root service once
#[tokio::test]
async fn test_root_service_instantiated_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let service = ServiceRef::root("acme.clock");
    let registry = ServiceRegistry::create([counting_factory(service.clone(), &counter)]).unwrap();

    let (a, b, c) = tokio::join!(
        owner_of(&registry, &service, "alpha"),
        owner_of(&registry, &service, "beta"),
        owner_of(&registry, &service, "gamma"),
    );

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b) && Arc::ptr_eq(&b, &c));
    assert_eq!(a.0, "root");
}

/// Test that plugin services are built once per plugin
#[tokio::test]
async fn test_plugin_service_instantiated_per_plugin() {
    let counter = Arc::new(AtomicUsize::new(0));
    let service = ServiceRef::plugin("acme.cache");
    let registry = ServiceRegistry::create([counting_factory(service.clone(), &counter)]).unwrap();

    let alpha = owner_of(&registry, &service, "alpha").await;
    let alpha_again = owner_of(&registry, &service, "alpha").await;
    let beta = owner_of(&registry, &service, "beta").await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert!(Arc::ptr_eq(&alpha, &alpha_again));
    assert_eq!(alpha.0, "alpha");
    assert_eq!(beta.0, "beta");
}

/// Test that looking up built instances never runs a factory
#[tokio::test]
async fn test_get_if_instantiated() {
    let counter = Arc::new(AtomicUsize::new(0));
    let service = ServiceRef::plugin("acme.cache");
    let registry = ServiceRegistry::create([counting_factory(service.clone(), &counter)]).unwrap();

    assert!(registry.get_if_instantiated(&service, "alpha").is_none());
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let alpha = owner_of(&registry, &service, "alpha").await;
    let cached = registry.get_if_instantiated(&service, "alpha").expect("built");
    assert!(Arc::ptr_eq(&alpha, &downcast_instance::<Owner>(&cached).unwrap()));
    assert!(registry.get_if_instantiated(&service, "beta").is_none());
    assert!(registry.get_if_instantiated(&ServiceRef::root("unknown"), "alpha").is_none());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

/// Test that factory dependencies are resolved and passed in
#[tokio::test]
async fn test_factory_dependencies_resolved() {
    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::root("acme.base")).factory(|_| async { Ok(40_u32) }),
        ServiceFactory::builder(ServiceRef::plugin("acme.derived"))
            .dependency("base", ServiceRef::root("acme.base"))
            .dependency("meta", core_services::plugin_metadata())
            .factory(|ctx| async move {
                let base = ctx.deps().get::<u32>("base")?;
                let meta = ctx.deps().get::<PluginMetadata>("meta")?;
                Ok(format!("{}:{}", meta.plugin_id(), *base + 2))
            }),
    ])
    .unwrap();

    let instance = registry
        .get(&ServiceRef::plugin("acme.derived"), "alpha")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(downcast_instance::<String>(&instance).unwrap().as_str(), "alpha:42");
}

/// Test that a root service cannot depend on a plugin service
#[tokio::test]
async fn test_root_cannot_depend_on_plugin_scope() {
    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::plugin("acme.scoped")).factory(|_| async { Ok(()) }),
        ServiceFactory::builder(ServiceRef::root("acme.global"))
            .dependency("scoped", ServiceRef::plugin("acme.scoped"))
            .factory(|_| async { Ok(()) }),
    ])
    .unwrap();

    let err = registry
        .get(&ServiceRef::root("acme.global"), "alpha")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ServiceInstantiation { .. }));
    assert!(err.to_string().contains("'root' scoped service cannot depend on 'plugin' scoped service"));
}

/// Test that missing factory dependencies are reported by ref
#[tokio::test]
async fn test_missing_factory_dependency() {
    let registry = ServiceRegistry::create([ServiceFactory::builder(ServiceRef::root("acme.app"))
        .dependency("db", ServiceRef::root("acme.db"))
        .factory(|_| async { Ok(()) })])
    .unwrap();

    let err = registry.get(&ServiceRef::root("acme.app"), "root").await.unwrap_err();
    assert!(err.to_string().contains("serviceRef{acme.db}"));
}

/// Test that a failing factory is wrapped and can be retried
#[tokio::test]
async fn test_factory_failure_wrapped() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let registry = ServiceRegistry::create([ServiceFactory::builder(ServiceRef::root("acme.flaky"))
        .factory(move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(Error::init("not yet"))
                } else {
                    Ok(attempt)
                }
            }
        })])
    .unwrap();
    let service = ServiceRef::root("acme.flaky");

    let err = registry.get(&service, "root").await.unwrap_err();
    assert!(matches!(err, Error::ServiceInstantiation { ref service_id, .. } if service_id == "acme.flaky"));
    assert!(registry.get(&service, "root").await.unwrap().is_some());
}

/// Test that factories cannot be added once their service exists
#[tokio::test]
async fn test_add_after_instantiation_rejected() {
    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::root("acme.db")).factory(|_| async { Ok(()) }),
    ])
    .unwrap();
    registry.get(&ServiceRef::root("acme.db"), "root").await.unwrap();

    let err = registry
        .add(ServiceFactory::builder(ServiceRef::root("acme.db")).factory(|_| async { Ok(()) }))
        .unwrap_err();
    assert!(err.to_string().contains("already been instantiated"));
}

// =============================================================================
// Cycles and eager services
// =============================================================================

/// Test that service dependency cycles are detected
#[test]
fn test_circular_service_dependencies() {
    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::root("a"))
            .dependency("b", ServiceRef::root("b"))
            .factory(|_| async { Ok(()) }),
        ServiceFactory::builder(ServiceRef::root("b"))
            .dependency("a", ServiceRef::root("a"))
            .factory(|_| async { Ok(()) }),
    ])
    .unwrap();

    let err = registry.check_for_circular_deps().unwrap_err();
    assert!(matches!(err, Error::CircularServiceDependency { ref cycle } if cycle == &["a", "b", "a"]));
}

/// Test that a service depending on itself is a cycle
#[test]
fn test_self_dependent_service_is_circular() {
    let registry = ServiceRegistry::create([ServiceFactory::builder(ServiceRef::root("a"))
        .dependency("me", ServiceRef::root("a"))
        .factory(|_| async { Ok(()) })])
    .unwrap();

    let err = registry.check_for_circular_deps().unwrap_err();
    assert!(matches!(err, Error::CircularServiceDependency { ref cycle } if cycle == &["a", "a"]));
}

/// Test that eager services are built per scope
#[tokio::test]
async fn test_eager_services_by_scope() {
    let root_count = Arc::new(AtomicUsize::new(0));
    let plugin_count = Arc::new(AtomicUsize::new(0));
    let root_counter = Arc::clone(&root_count);
    let plugin_counter = Arc::clone(&plugin_count);

    let registry = ServiceRegistry::create([
        ServiceFactory::builder(ServiceRef::root("acme.root"))
            .eager()
            .factory(move |_| {
                root_counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        ServiceFactory::builder(ServiceRef::plugin("acme.plugin"))
            .eager()
            .factory(move |_| {
                plugin_counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            }),
        ServiceFactory::builder(ServiceRef::root("acme.lazy")).factory(|_| async { Ok(()) }),
    ])
    .unwrap();

    registry
        .initialize_eager_services_with_scope(ServiceScope::Root, None)
        .await
        .unwrap();
    assert_eq!(root_count.load(Ordering::SeqCst), 1);
    assert_eq!(plugin_count.load(Ordering::SeqCst), 0);

    for plugin in ["alpha", "beta"] {
        registry
            .initialize_eager_services_with_scope(ServiceScope::Plugin, Some(plugin))
            .await
            .unwrap();
    }
    assert_eq!(plugin_count.load(Ordering::SeqCst), 2);
    assert_eq!(root_count.load(Ordering::SeqCst), 1);
}
