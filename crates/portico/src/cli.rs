//! Host wiring
//!
//! | Step | Provided by |
//! |------|-------------|
//! | configuration | `portico_app_api::ConfigLoader` |
//! | logging | `portico_app_api::init_logging` |
//! | services | default factories, root config, clap commander |
//! | features | bundled greeter plugin and module |
//! | signals and exit code | `portico_app_api::lifecycle` |

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use portico_app_api::{
    BackendInitializer, ConfigLoader, RootConfig, RunMode, ShutdownCoordinator,
    default_service_factories, init_logging, listen_for_signals, root_config_factory, run_backend,
};
use portico_plugin_api::Result;
use tracing::info;

use crate::commander::commander_factories;
use crate::greeter::{default_greetings_module, greeter_plugin};

/// Program name used in command help output
pub const PROGRAM_NAME: &str = "portico";

/// Command line interface for the Portico backend host
#[derive(Parser, Debug)]
#[command(name = "portico")]
#[command(about = "Portico - plugin-based backend host")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep running after the command finished, until SIGINT/SIGTERM
    #[arg(long)]
    pub serve: bool,

    /// Command and arguments handed to the plugins' commands
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Build an initializer with every bundled service and feature registered
pub fn build_backend(config: RootConfig, args: Vec<String>) -> Result<BackendInitializer> {
    let mut factories = default_service_factories();
    factories.push(root_config_factory(config));
    factories.extend(commander_factories(PROGRAM_NAME));

    let backend = BackendInitializer::new(factories)?.with_args(args);
    backend.add(greeter_plugin())?;
    backend.add(default_greetings_module())?;
    Ok(backend)
}

/// Run the host and return the process exit code
pub async fn run(cli: Cli) -> Result<i32> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let config = loader.load()?;
    init_logging(&config.backend().logging)?;

    let shutdown_timeout = config.backend().lifecycle.shutdown_timeout();
    let mode = if cli.serve {
        RunMode::UntilShutdown
    } else {
        RunMode::OneShot
    };

    let backend = build_backend(config, cli.args)?;
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let signals = listen_for_signals(Arc::clone(&coordinator));

    let exit_code = run_backend(&backend, &coordinator, mode, shutdown_timeout).await;
    signals.abort();

    info!(exit_code, "Portico exiting");
    Ok(exit_code)
}
