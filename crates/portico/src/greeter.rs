//! Greeter plugin
//!
//! A small plugin exercising the whole feature surface: an extension point
//! owned by the plugin, a module contributing to it, a config section, a
//! shutdown hook and a `greet` subcommand.
//!
//! ```toml
//! [greeter]
//! default_name = "Portico"
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use clap::{Arg, Command};
use portico_app_api::RootConfig;
use portico_plugin_api::core_services::{self, PluginLogger, RootLifecycleService};
use portico_plugin_api::{
    BackendFeature, ExtensionPointRef, InitDescriptor, create_backend_module,
    create_backend_plugin,
};
use serde::{Deserialize, Serialize};

use crate::commander::{ClapRootCommander, command_registry};

/// Plugin id
pub const PLUGIN_ID: &str = "greeter";

/// Id of the greetings extension point
pub const GREETINGS_EXTENSION_POINT_ID: &str = "greeter.greetings";

/// Extension point modules use to contribute greetings
pub fn greetings_extension_point() -> ExtensionPointRef {
    ExtensionPointRef::new(GREETINGS_EXTENSION_POINT_ID)
}

/// `[greeter]` config section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreeterConfig {
    /// Name greeted when the command gets none
    pub default_name: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            default_name: "world".to_string(),
        }
    }
}

/// Greeting templates contributed by modules; `{name}` is substituted
#[derive(Debug, Default)]
pub struct GreetingRegistry {
    templates: Mutex<Vec<String>>,
}

impl GreetingRegistry {
    /// Add a template
    pub fn add_greeting(&self, template: impl Into<String>) {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(template.into());
    }

    /// Every template added so far
    pub fn templates(&self) -> Vec<String> {
        self.templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Render every template for `name`
    pub fn render(&self, name: &str) -> Vec<String> {
        self.templates()
            .iter()
            .map(|template| template.replace("{name}", name))
            .collect()
    }
}

/// The greeter plugin
pub fn greeter_plugin() -> BackendFeature {
    create_backend_plugin(PLUGIN_ID, |env| {
        let greetings = Arc::new(GreetingRegistry::default());
        env.register_extension_point(&greetings_extension_point(), Arc::clone(&greetings));
        env.register_init(
            InitDescriptor::builder()
                .dependency("logger", core_services::logger())
                .dependency("config", core_services::root_config())
                .dependency("lifecycle", core_services::root_lifecycle())
                .dependency("commands", command_registry())
                .init(move |deps| {
                    let greetings = Arc::clone(&greetings);
                    async move {
                        let logger = deps.get::<PluginLogger>("logger")?;
                        let config = deps
                            .get::<RootConfig>("config")?
                            .extract::<GreeterConfig>(PLUGIN_ID)?
                            .unwrap_or_default();
                        let lifecycle = deps.get::<RootLifecycleService>("lifecycle")?;
                        let commands = deps.get::<ClapRootCommander>("commands")?;

                        if greetings.templates().is_empty() {
                            greetings.add_greeting("Hello, {name}!");
                        }

                        let default_name = config.default_name;
                        commands.add_command(
                            Command::new("greet")
                                .about("Print every registered greeting")
                                .arg(Arg::new("name").help("Who to greet")),
                            move |matches| {
                                let name = matches
                                    .get_one::<String>("name")
                                    .cloned()
                                    .unwrap_or_else(|| default_name.clone());
                                let lines = greetings.render(&name);
                                async move {
                                    for line in lines {
                                        println!("{line}");
                                    }
                                    Ok(())
                                }
                            },
                        )?;

                        let shutdown_logger = Arc::clone(&logger);
                        lifecycle.add_shutdown_hook(PLUGIN_ID, move || async move {
                            shutdown_logger.info("Greeter shutting down");
                            Ok(())
                        });

                        logger.info("Greeter plugin initialized");
                        Ok(())
                    }
                }),
        );
    })
}

/// Module contributing the built-in greetings
pub fn default_greetings_module() -> BackendFeature {
    create_backend_module(PLUGIN_ID, "default-greetings", |env| {
        env.register_init(
            InitDescriptor::builder()
                .dependency("greetings", greetings_extension_point())
                .init(|deps| async move {
                    let greetings = deps.get::<GreetingRegistry>("greetings")?;
                    greetings.add_greeting("Hello, {name}!");
                    greetings.add_greeting("Welcome aboard, {name}.");
                    Ok(())
                }),
        );
    })
}
