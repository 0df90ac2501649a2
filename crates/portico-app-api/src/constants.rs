//! Runtime constants

// ============================================================================
// SCOPE CONSTANTS
// ============================================================================

/// Scope key used for root-scoped service instances and root-level lookups
pub const ROOT_PLUGIN_ID: &str = "root";

// ============================================================================
// CONFIGURATION CONSTANTS
// ============================================================================

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "portico.toml";

/// Default configuration directory name
pub const DEFAULT_CONFIG_DIR: &str = "portico";

/// Environment variable prefix for configuration
pub const CONFIG_ENV_PREFIX: &str = "PORTICO";

/// Environment variable overriding the log filter
pub const LOG_FILTER_ENV: &str = "PORTICO_LOG";

// ============================================================================
// LOGGING CONSTANTS
// ============================================================================

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// LIFECYCLE CONSTANTS
// ============================================================================

/// Default bound on `stop()` when shutting down
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Exit code for a clean shutdown
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a failed startup or shutdown
pub const EXIT_FAILURE: i32 = 1;
