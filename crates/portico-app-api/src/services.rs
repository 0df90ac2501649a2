//! Default service factories
//!
//! Factories every backend starts with. Hosts add more (root config,
//! feature discovery, root commander) as features.

use portico_plugin_api::core_services::{self, PluginLogger, RootLifecycleService};
use portico_plugin_api::ServiceFactory;

use crate::config::RootConfig;

/// Plugin logger and root lifecycle factories
pub fn default_service_factories() -> Vec<ServiceFactory> {
    vec![plugin_logger_factory(), root_lifecycle_factory()]
}

/// One [`PluginLogger`] per plugin
pub fn plugin_logger_factory() -> ServiceFactory {
    ServiceFactory::builder(core_services::logger())
        .factory(|ctx| async move { Ok(PluginLogger::new(ctx.plugin_id())) })
}

/// A single [`RootLifecycleService`] shared by every plugin
pub fn root_lifecycle_factory() -> ServiceFactory {
    ServiceFactory::builder(core_services::root_lifecycle())
        .factory(|_| async { Ok(RootLifecycleService::new()) })
}

/// Expose loaded configuration through the root config service
pub fn root_config_factory(config: RootConfig) -> ServiceFactory {
    ServiceFactory::builder(core_services::root_config()).factory(move |_| {
        let config = config.clone();
        async move { Ok(config) }
    })
}
