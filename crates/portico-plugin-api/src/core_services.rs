//! Core service references and the service types behind them
//!
//! | Ref | Scope | Instance type |
//! |-----|-------|---------------|
//! | [`plugin_metadata`] | plugin | [`PluginMetadata`] (built into the registry) |
//! | [`logger`] | plugin | [`PluginLogger`] |
//! | [`root_lifecycle`] | root | [`RootLifecycleService`] |
//! | [`root_config`] | root | provided by the app runtime |
//! | [`feature_discovery`] | root | `Arc<dyn FeatureDiscoveryService>` |
//! | [`root_commander`] | root | `Arc<dyn RootCommandDispatcher>` |

use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use crate::error::{DispatchError, Result};
use crate::feature::Feature;
use crate::refs::ServiceRef;

/// Id of the built-in plugin metadata service
pub const PLUGIN_METADATA_ID: &str = "core.pluginMetadata";
/// Id of the plugin logger service
pub const LOGGER_ID: &str = "core.logger";
/// Id of the root lifecycle service
pub const ROOT_LIFECYCLE_ID: &str = "core.rootLifecycle";
/// Id of the root config service
pub const ROOT_CONFIG_ID: &str = "core.rootConfig";
/// Id of the feature discovery service
pub const FEATURE_DISCOVERY_ID: &str = "core.featureDiscovery";
/// Id of the root command dispatcher service
pub const ROOT_COMMANDER_ID: &str = "core.rootCommander";

/// Metadata about the plugin a service instance belongs to
pub fn plugin_metadata() -> ServiceRef {
    ServiceRef::plugin(PLUGIN_METADATA_ID)
}

/// Plugin-scoped logger
pub fn logger() -> ServiceRef {
    ServiceRef::plugin(LOGGER_ID)
}

/// Process-wide shutdown hook registry
pub fn root_lifecycle() -> ServiceRef {
    ServiceRef::root(ROOT_LIFECYCLE_ID)
}

/// Loaded backend configuration
pub fn root_config() -> ServiceRef {
    ServiceRef::root(ROOT_CONFIG_ID)
}

/// Runtime discovery of additional features
pub fn feature_discovery() -> ServiceRef {
    ServiceRef::root(FEATURE_DISCOVERY_ID)
}

/// Command dispatcher run after startup
pub fn root_commander() -> ServiceRef {
    ServiceRef::root(ROOT_COMMANDER_ID)
}

/// Identity of the plugin a plugin-scoped service was built for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    plugin_id: String,
}

impl PluginMetadata {
    /// Create metadata for a plugin
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    /// Plugin id
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }
}

/// Logger that tags every event with the owning plugin id
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin_id: String,
}

impl PluginLogger {
    /// Create a logger for a plugin
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    /// Plugin this logger reports for
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    /// Log at debug level
    pub fn debug(&self, message: &str) {
        debug!(plugin_id = %self.plugin_id, "{}", message);
    }

    /// Log at info level
    pub fn info(&self, message: &str) {
        info!(plugin_id = %self.plugin_id, "{}", message);
    }

    /// Log at warn level
    pub fn warn(&self, message: &str) {
        warn!(plugin_id = %self.plugin_id, "{}", message);
    }

    /// Log at error level
    pub fn error(&self, message: &str) {
        error!(plugin_id = %self.plugin_id, "{}", message);
    }
}

type ShutdownHook = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Collects shutdown hooks run by the initializer's `stop()`
#[derive(Default)]
pub struct RootLifecycleService {
    hooks: Mutex<Vec<(String, ShutdownHook)>>,
}

impl RootLifecycleService {
    /// Create an empty lifecycle service
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named shutdown hook
    pub fn add_shutdown_hook<F, Fut>(&self, label: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let label = label.into();
        debug!(hook = %label, "Registering shutdown hook");
        let hook: ShutdownHook = Box::new(move || hook().boxed());
        self.hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((label, hook));
    }

    /// Number of hooks not yet run
    pub fn pending_hooks(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Run every pending hook, most recently registered first
    ///
    /// All hooks run even if some fail; the failures are returned as
    /// `label: error` strings.
    pub async fn shutdown(&self) -> Vec<String> {
        let hooks = std::mem::take(
            &mut *self
                .hooks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        let mut failures = Vec::new();
        for (label, hook) in hooks.into_iter().rev() {
            debug!(hook = %label, "Running shutdown hook");
            if let Err(e) = hook().await {
                error!(hook = %label, error = %e, "Shutdown hook failed");
                failures.push(format!("{label}: {e}"));
            }
        }
        failures
    }
}

impl std::fmt::Debug for RootLifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootLifecycleService")
            .field("pending_hooks", &self.pending_hooks())
            .finish()
    }
}

/// Source of features discovered at runtime, e.g. from installed packages
#[async_trait]
pub trait FeatureDiscoveryService: Send + Sync {
    /// Features to add on top of the explicitly registered ones
    async fn get_backend_features(&self) -> Result<Vec<Feature>>;
}

/// Root-level command handler run once startup has completed
#[async_trait]
pub trait RootCommandDispatcher: Send + Sync {
    /// Handle the raw process arguments
    async fn dispatch(&self, args: Vec<String>) -> std::result::Result<(), DispatchError>;
}
