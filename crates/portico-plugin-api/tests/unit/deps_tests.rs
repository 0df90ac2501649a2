//! Unit tests for type-erased instances and resolved dependency maps

use std::sync::Arc;

use portico_plugin_api::{Error, ResolvedDeps, downcast_instance, into_instance};

#[derive(Debug, PartialEq)]
struct Clock {
    offset: i64,
}

/// Test that an erased instance downcasts back to its concrete type only
#[test]
fn test_instance_downcast() {
    let instance = into_instance(Clock { offset: 3 });

    let clock = downcast_instance::<Clock>(&instance).expect("clock");
    assert_eq!(clock.offset, 3);
    assert!(downcast_instance::<String>(&instance).is_none());
}

/// Test typed lookups in a resolved dependency map
#[test]
fn test_resolved_deps_get() {
    let mut deps = ResolvedDeps::new();
    deps.insert("clock", into_instance(Clock { offset: 1 }));

    assert_eq!(deps.len(), 1);
    assert!(deps.contains("clock"));
    assert_eq!(*deps.get::<Clock>("clock").unwrap(), Clock { offset: 1 });
    assert!(deps.raw("clock").is_some());
}

/// Test that a missing name or a wrong type is a dependency type error
#[test]
fn test_resolved_deps_errors() {
    let mut deps = ResolvedDeps::new();
    deps.insert("clock", Arc::new(Clock { offset: 0 }));

    let wrong_type = deps.get::<String>("clock").unwrap_err();
    assert!(matches!(wrong_type, Error::DependencyType { ref name, .. } if name == "clock"));

    let missing = deps.get::<Clock>("calendar").unwrap_err();
    assert!(matches!(missing, Error::DependencyType { ref name, .. } if name == "calendar"));
}

/// Test that the debug output lists dependency names
#[test]
fn test_resolved_deps_debug_lists_names() {
    let mut deps = ResolvedDeps::new();
    deps.insert("b", into_instance(1_u32));
    deps.insert("a", into_instance(2_u32));

    let debug = format!("{deps:?}");
    assert!(debug.contains("\"a\""));
    assert!(debug.contains("\"b\""));
}
