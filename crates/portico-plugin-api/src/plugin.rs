//! Plugin and module builders
//!
//! ```ignore
//! let plugin = create_backend_plugin("greeter", |env| {
//!     let greetings = Arc::new(GreetingRegistry::default());
//!     env.register_extension_point(&GREETINGS, greetings.clone());
//!     env.register_init(
//!         InitDescriptor::builder()
//!             .dependency("logger", core_services::logger())
//!             .init(move |deps| { /* ... */ }),
//!     );
//! });
//! ```

use std::any::Any;
use std::sync::Arc;

use crate::deps::ServiceInstance;
use crate::error::{Error, Result};
use crate::feature::{BackendFeature, FEATURE_VERSION, Registration};
use crate::init::InitDescriptor;
use crate::refs::ExtensionPointRef;

/// Collects what a plugin or module registers
#[derive(Debug, Default)]
pub struct RegistrationEnv {
    extension_points: Vec<(ExtensionPointRef, ServiceInstance)>,
    init: Option<InitDescriptor>,
    init_calls: usize,
}

impl RegistrationEnv {
    /// Expose an extension point implementation
    pub fn register_extension_point<T: Any + Send + Sync>(
        &mut self,
        extension_point: &ExtensionPointRef,
        implementation: Arc<T>,
    ) {
        self.extension_points
            .push((extension_point.clone(), implementation as ServiceInstance));
    }

    /// Register the init descriptor; must be called exactly once
    pub fn register_init(&mut self, init: InitDescriptor) {
        self.init_calls += 1;
        self.init = Some(init);
    }

    fn finish(self, plugin_id: &str, module_id: Option<&str>) -> Result<Registration> {
        let subject = match module_id {
            Some(module_id) => format!("module '{module_id}' for plugin '{plugin_id}'"),
            None => format!("plugin '{plugin_id}'"),
        };
        if self.init_calls > 1 {
            return Err(Error::registration(format!(
                "registerInit must only be called once in {subject}"
            )));
        }
        let init = self.init.ok_or_else(|| {
            Error::registration(format!("registerInit was not called by register in {subject}"))
        })?;
        Ok(Registration {
            plugin_id: plugin_id.to_string(),
            module_id: module_id.map(str::to_string),
            extension_points: self.extension_points,
            init,
        })
    }
}

/// Create a backend plugin feature
pub fn create_backend_plugin<F>(plugin_id: impl Into<String>, register: F) -> BackendFeature
where
    F: Fn(&mut RegistrationEnv) + Send + Sync + 'static,
{
    let plugin_id = plugin_id.into();
    let description = format!("plugin '{plugin_id}'");
    BackendFeature::from_parts(FEATURE_VERSION, description, move || {
        let mut env = RegistrationEnv::default();
        register(&mut env);
        Ok(vec![env.finish(&plugin_id, None)?])
    })
}

/// Create a backend module feature for `plugin_id`
pub fn create_backend_module<F>(
    plugin_id: impl Into<String>,
    module_id: impl Into<String>,
    register: F,
) -> BackendFeature
where
    F: Fn(&mut RegistrationEnv) + Send + Sync + 'static,
{
    let plugin_id = plugin_id.into();
    let module_id = module_id.into();
    let description = format!("module '{module_id}' for plugin '{plugin_id}'");
    BackendFeature::from_parts(FEATURE_VERSION, description, move || {
        let mut env = RegistrationEnv::default();
        register(&mut env);
        Ok(vec![env.finish(&plugin_id, Some(&module_id))?])
    })
}
