//! Unit tests for error messages and helpers

use portico_plugin_api::{DispatchError, Error};

/// Test that illegal extension point access names both plugins and the module
#[test]
fn test_illegal_extension_point_access_message() {
    let err = Error::illegal_extension_point_access("b", Some("m"), "ep.a", "a");
    assert_eq!(
        err.to_string(),
        "Illegal dependency: Module 'm' for plugin 'b' attempted to depend on extension point 'ep.a' for plugin 'a'. Extension points can only be used within their plugin's scope."
    );

    let err = Error::illegal_extension_point_access("b", None, "ep.a", "a");
    assert!(err.to_string().starts_with("Illegal dependency: Plugin 'b' attempted"));
}

/// Test that cycles are rendered in order with the first id repeated
#[test]
fn test_cycle_messages() {
    let services = Error::CircularServiceDependency {
        cycle: vec!["a".into(), "b".into(), "a".into()],
    };
    assert_eq!(services.to_string(), "Circular dependencies detected:\n  a -> b -> a");

    let modules = Error::CircularModuleDependency {
        plugin_id: "p".into(),
        cycle: vec!["x".into(), "y".into(), "x".into()],
    };
    assert_eq!(
        modules.to_string(),
        "Circular dependency detected for modules of plugin 'p', 'x' -> 'y' -> 'x'"
    );
}

/// Test that startup wrappers carry the cause in their message and source
#[test]
fn test_startup_wrappers_include_cause() {
    let err = Error::module_startup("p", "m", Error::init("boom"));
    assert_eq!(err.to_string(), "Module 'm' for plugin 'p' startup failed; caused by boom");
    assert!(std::error::Error::source(&err).is_some());

    let err = Error::plugin_startup("p", Error::init("boom"));
    assert_eq!(err.to_string(), "Plugin 'p' startup failed; caused by boom");
}

/// Test that missing dependencies are listed together
#[test]
fn test_missing_dependencies_message() {
    let err = Error::MissingDependencies {
        refs: vec!["serviceRef{a}".into(), "extensionPoint{b}".into()],
    };
    assert_eq!(
        err.to_string(),
        "No extension point or service available for the following ref(s): serviceRef{a}, extensionPoint{b}"
    );
}

/// Test that a single error is not wrapped when aggregated
#[test]
fn test_aggregate() {
    let single = Error::aggregate(vec![Error::init("only")]);
    assert!(matches!(single, Error::Init { ref message, .. } if message == "only"));

    let many = Error::aggregate(vec![Error::init("one"), Error::init("two")]);
    assert!(matches!(many, Error::Multiple { ref errors } if errors.len() == 2));
    assert_eq!(many.to_string(), "2 failures occurred: one; two");
}

/// Test string conversions into init errors
#[test]
fn test_error_from_str() {
    let err: Error = "bad input".into();
    assert_eq!(err.to_string(), "bad input");
    let err: Error = String::from("worse input").into();
    assert!(matches!(err, Error::Init { .. }));
}

/// Test dispatch error construction
#[test]
fn test_dispatch_error() {
    let err = DispatchError::new(2, "unknown command");
    assert_eq!(err.exit_code, 2);
    assert_eq!(err.to_string(), "unknown command");
}
