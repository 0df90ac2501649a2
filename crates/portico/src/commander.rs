//! Clap-backed root command dispatcher
//!
//! Plugins add subcommands through [`command_registry`]; once startup
//! completed, the initializer hands the process arguments to the
//! [`core_services::root_commander`] service built on top of it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use clap::{ArgMatches, Command};
use futures::FutureExt;
use futures::future::BoxFuture;
use portico_app_api::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use portico_plugin_api::core_services::{self, RootCommandDispatcher};
use portico_plugin_api::{DispatchError, Error, Result, ServiceFactory, ServiceRef};
use tracing::debug;

/// Id of the command registry service
pub const COMMAND_REGISTRY_ID: &str = "portico.commandRegistry";

/// Root-scoped [`ClapRootCommander`] plugins register commands with
pub fn command_registry() -> ServiceRef {
    ServiceRef::root(COMMAND_REGISTRY_ID)
}

type CommandHandler = Arc<dyn Fn(ArgMatches) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct RegisteredCommand {
    command: Command,
    handler: CommandHandler,
}

/// Collects subcommands and dispatches process arguments to them
pub struct ClapRootCommander {
    name: String,
    commands: Mutex<Vec<RegisteredCommand>>,
}

impl ClapRootCommander {
    /// Create a commander; `name` is used as the program name in help output
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Register a subcommand and its handler
    pub fn add_command<F, Fut>(&self, command: Command, handler: F) -> Result<()>
    where
        F: Fn(ArgMatches) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        let name = command.get_name().to_string();
        if commands.iter().any(|c| c.command.get_name() == name) {
            return Err(Error::registration(format!(
                "Command '{name}' is already registered"
            )));
        }
        debug!(command = %name, "Registered command");
        commands.push(RegisteredCommand {
            command,
            handler: Arc::new(move |matches| handler(matches).boxed()),
        });
        Ok(())
    }

    /// Names of the registered commands, in registration order
    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.command.get_name().to_string())
            .collect()
    }

    fn snapshot(&self) -> (Command, HashMap<String, CommandHandler>) {
        let commands = self.commands.lock().unwrap_or_else(PoisonError::into_inner);
        let mut cli = Command::new(self.name.clone()).subcommand_required(true);
        let mut handlers = HashMap::with_capacity(commands.len());
        for registered in commands.iter() {
            cli = cli.subcommand(registered.command.clone());
            handlers.insert(
                registered.command.get_name().to_string(),
                Arc::clone(&registered.handler),
            );
        }
        (cli, handlers)
    }
}

impl std::fmt::Debug for ClapRootCommander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClapRootCommander")
            .field("name", &self.name)
            .field("commands", &self.command_names())
            .finish()
    }
}

#[async_trait]
impl RootCommandDispatcher for ClapRootCommander {
    async fn dispatch(&self, args: Vec<String>) -> std::result::Result<(), DispatchError> {
        let (mut cli, handlers) = self.snapshot();

        // A bare invocation shows help, like `--help`
        if args.is_empty() {
            let help = cli.render_help();
            println!("{help}");
            return Err(DispatchError::new(EXIT_SUCCESS, help.to_string()));
        }

        let matches = cli
            .try_get_matches_from(std::iter::once(self.name.clone()).chain(args))
            .map_err(|e| {
                // Help and version output are regular exits
                if !e.use_stderr() {
                    let _ = e.print();
                }
                DispatchError::new(e.exit_code(), e.render().to_string())
            })?;

        let Some((name, sub_matches)) = matches.subcommand() else {
            return Err(DispatchError::new(EXIT_FAILURE, "No command given"));
        };
        let handler = handlers
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::new(EXIT_FAILURE, format!("Unknown command '{name}'")))?;

        debug!(command = %name, "Dispatching command");
        handler(sub_matches.clone())
            .await
            .map_err(|e| DispatchError::new(EXIT_FAILURE, format!("Command '{name}' failed: {e}")))
    }
}

/// Command registry and root commander factories sharing one commander
pub fn commander_factories(name: impl Into<String>) -> Vec<ServiceFactory> {
    let name = name.into();
    let registry = ServiceFactory::builder(command_registry()).factory(move |_| {
        let commander = ClapRootCommander::new(name.clone());
        async move { Ok(commander) }
    });
    let dispatcher = ServiceFactory::builder(core_services::root_commander())
        .dependency("commands", command_registry())
        .factory(|ctx| async move {
            let commander = ctx.deps().get::<ClapRootCommander>("commands")?;
            let dispatcher: Arc<dyn RootCommandDispatcher> = commander;
            Ok(dispatcher)
        });
    vec![registry, dispatcher]
}
