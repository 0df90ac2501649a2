//! Error handling types
//!
//! Every failure the backend kernel can surface is a variant of [`Error`].
//! Variants carry the identifiers involved (plugin ids, module ids, service
//! ids, extension point ids) so a single log line is enough to locate the
//! misconfigured feature.

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Portico backend kernel
#[derive(Error, Debug)]
pub enum Error {
    /// A feature failed shape or version validation at ingestion
    #[error("Failed to add feature, {message}")]
    InvalidFeature {
        /// Description of the invalid feature
        message: String,
    },

    /// An extension point id was registered more than once
    #[error("ExtensionPoint with ID '{id}' is already registered")]
    DuplicateExtensionPoint {
        /// The duplicated extension point id
        id: String,
    },

    /// A plugin id was registered more than once
    #[error("Plugin '{plugin_id}' is already registered")]
    DuplicatePlugin {
        /// The duplicated plugin id
        plugin_id: String,
    },

    /// A module id was registered more than once for the same plugin
    #[error("Module '{module_id}' for plugin '{plugin_id}' is already registered")]
    DuplicateModule {
        /// Plugin the module belongs to
        plugin_id: String,
        /// The duplicated module id
        module_id: String,
    },

    /// A service id received more than one factory
    #[error("Duplicate service implementations provided for {service_id}")]
    DuplicateService {
        /// The duplicated service id
        service_id: String,
    },

    /// A registration tried to use an extension point owned by another plugin
    #[error(
        "Illegal dependency: {consumer} attempted to depend on extension point '{extension_point_id}' for plugin '{owner_plugin_id}'. Extension points can only be used within their plugin's scope."
    )]
    IllegalExtensionPointAccess {
        /// Human readable consumer, e.g. `Module 'm' for plugin 'p'`
        consumer: String,
        /// Plugin the consumer is registered under
        plugin_id: String,
        /// Module id of the consumer, if it is a module
        module_id: Option<String>,
        /// The extension point being accessed
        extension_point_id: String,
        /// Plugin that owns the extension point
        owner_plugin_id: String,
    },

    /// One or more declared dependencies could not be resolved
    #[error("No extension point or service available for the following ref(s): {}", .refs.join(", "))]
    MissingDependencies {
        /// Display form of every unresolved ref
        refs: Vec<String>,
    },

    /// Service factories depend on each other in a cycle
    #[error("Circular dependencies detected:\n  {}", .cycle.join(" -> "))]
    CircularServiceDependency {
        /// Service ids along the cycle, first id repeated at the end
        cycle: Vec<String>,
    },

    /// Modules of a plugin depend on each other in a cycle
    #[error(
        "Circular dependency detected for modules of plugin '{plugin_id}', {}",
        .cycle.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(" -> ")
    )]
    CircularModuleDependency {
        /// Plugin whose modules form the cycle
        plugin_id: String,
        /// Module ids along the cycle, first id repeated at the end
        cycle: Vec<String>,
    },

    /// A module failed while resolving dependencies or running its init
    #[error("Module '{module_id}' for plugin '{plugin_id}' startup failed; caused by {source}")]
    ModuleStartup {
        /// Plugin the module belongs to
        plugin_id: String,
        /// The failing module
        module_id: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A plugin failed while resolving dependencies or running its init
    #[error("Plugin '{plugin_id}' startup failed; caused by {source}")]
    PluginStartup {
        /// The failing plugin
        plugin_id: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// A service factory could not produce an instance
    #[error("Failed to instantiate service '{service_id}' for '{plugin_id}': {message}")]
    ServiceInstantiation {
        /// Service being instantiated
        service_id: String,
        /// Scope the instance was requested for
        plugin_id: String,
        /// Description of the failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<Error>>,
    },

    /// `start()` was called more than once
    #[error("Backend has already started")]
    AlreadyStarted,

    /// `add()` was called after `start()`
    #[error("feature can not be added after the backend has started")]
    AddAfterStart,

    /// A feature's registration callback misbehaved
    #[error("Registration error: {message}")]
    Registration {
        /// Description of the registration problem
        message: String,
    },

    /// A resolved dependency is missing from the map or has another type
    #[error("Dependency '{name}' is not available as {expected}")]
    DependencyType {
        /// Dependency name as declared in the init descriptor
        name: String,
        /// Rust type that was requested
        expected: &'static str,
    },

    /// Several independent failures, e.g. more than one plugin failed
    #[error("{} failures occurred: {}", .errors.len(), .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple {
        /// The collected failures
        errors: Vec<Error>,
    },

    /// Shutdown hooks failed during `stop()`
    #[error("Shutdown failed: {}", .failures.join("; "))]
    Shutdown {
        /// One entry per failing hook
        failures: Vec<String>,
    },

    /// Error raised from inside a plugin, module or service init function
    #[error("{message}")]
    Init {
        /// Description of the failure
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

// Registration error creation methods
impl Error {
    /// Create an invalid feature error
    pub fn invalid_feature<S: Into<String>>(message: S) -> Self {
        Self::InvalidFeature {
            message: message.into(),
        }
    }

    /// Create a registration error
    pub fn registration<S: Into<String>>(message: S) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Create an illegal extension point access error
    pub fn illegal_extension_point_access(
        plugin_id: &str,
        module_id: Option<&str>,
        extension_point_id: &str,
        owner_plugin_id: &str,
    ) -> Self {
        let consumer = match module_id {
            Some(module_id) => format!("Module '{module_id}' for plugin '{plugin_id}'"),
            None => format!("Plugin '{plugin_id}'"),
        };
        Self::IllegalExtensionPointAccess {
            consumer,
            plugin_id: plugin_id.to_string(),
            module_id: module_id.map(str::to_string),
            extension_point_id: extension_point_id.to_string(),
            owner_plugin_id: owner_plugin_id.to_string(),
        }
    }
}

// Startup error creation methods
impl Error {
    /// Wrap a module failure with its plugin and module ids
    pub fn module_startup(plugin_id: &str, module_id: &str, source: Error) -> Self {
        Self::ModuleStartup {
            plugin_id: plugin_id.to_string(),
            module_id: module_id.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a plugin failure with its plugin id
    pub fn plugin_startup(plugin_id: &str, source: Error) -> Self {
        Self::PluginStartup {
            plugin_id: plugin_id.to_string(),
            source: Box::new(source),
        }
    }

    /// Create a service instantiation error
    pub fn service_instantiation<S: Into<String>>(
        service_id: &str,
        plugin_id: &str,
        message: S,
    ) -> Self {
        Self::ServiceInstantiation {
            service_id: service_id.to_string(),
            plugin_id: plugin_id.to_string(),
            message: message.into(),
            source: None,
        }
    }

    /// Collapse a list of failures: a single error stays as-is, anything
    /// else becomes [`Error::Multiple`]
    pub fn aggregate(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Multiple { errors }
        }
    }
}

// Init error creation methods
impl Error {
    /// Create an init error
    pub fn init<S: Into<String>>(message: S) -> Self {
        Self::Init {
            message: message.into(),
            source: None,
        }
    }

    /// Create an init error with source
    pub fn init_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Init {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Configuration and internal error creation methods
impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn configuration_with_source<
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    >(
        message: S,
        source: E,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::init(s)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::init(s)
    }
}

/// Error returned by a root command dispatcher
///
/// An exit code of zero marks a controlled exit (help output, version
/// output) that the initializer swallows silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DispatchError {
    /// Process exit code the dispatcher would like to report
    pub exit_code: i32,
    /// Human readable message
    pub message: String,
}

impl DispatchError {
    /// Create a dispatch error with an exit code
    pub fn new<S: Into<String>>(exit_code: i32, message: S) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }
}
