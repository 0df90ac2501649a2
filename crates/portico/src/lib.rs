//! # Portico
//!
//! Command line host for a Portico backend: loads configuration, installs
//! logging and signal handling, registers the bundled plugins and runs the
//! backend to completion.

pub mod cli;
pub mod commander;
pub mod greeter;

pub use cli::{Cli, build_backend, run};
pub use commander::{ClapRootCommander, command_registry, commander_factories};
