//! # Portico App API
//!
//! The runtime side of a Portico backend: it takes the features described
//! with `portico-plugin-api`, builds the services they need and starts them
//! in dependency order.
//!
//! ## Module Categories
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`initializer`] | Feature collection and the startup sequence |
//! | [`service_registry`] | Service factories and scoped instance caching |
//! | [`dependency_graph`] | Provide/consume graph, cycle detection, parallel traversal |
//! | [`services`] | Default service factories |
//! | [`lifecycle`] | Signals, shutdown coordination and exit codes |
//! | [`config`] | Figment-based configuration loading |
//! | [`logging`] | Tracing subscriber setup |
//! | [`constants`] | Runtime constants |

pub mod config;
pub mod constants;
pub mod dependency_graph;
pub mod initializer;
pub mod lifecycle;
pub mod logging;
pub mod service_registry;
pub mod services;

pub use config::{BackendConfig, ConfigLoader, LifecycleConfig, LoggingConfig, RootConfig};
pub use dependency_graph::{DependencyGraph, DependencyNode, TraversalError};
pub use initializer::{BackendInitializer, StartupPhase};
pub use lifecycle::{RunMode, ShutdownCoordinator, listen_for_signals, run_backend};
pub use logging::{init_logging, parse_log_level};
pub use service_registry::ServiceRegistry;
pub use services::{default_service_factories, root_config_factory};
