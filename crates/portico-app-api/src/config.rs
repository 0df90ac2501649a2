//! Configuration loading
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. Default values from `BackendConfig::default()`
//! 2. TOML configuration file (explicit path or the first default location found)
//! 3. Environment variables with the `PORTICO_` prefix, nested with `__`
//!    (e.g. `PORTICO_LOGGING__LEVEL=debug`)
//!
//! The merged figment is kept in [`RootConfig`] so plugins can extract their
//! own sections from the same sources.

use std::env;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use portico_plugin_api::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CONFIG_ENV_PREFIX, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME, DEFAULT_LOG_LEVEL,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
use crate::logging::{log_config_loaded, parse_log_level};

// ============================================================================
// Configuration types
// ============================================================================

/// Configuration consumed by the backend runtime itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Process lifecycle configuration
    pub lifecycle: LifecycleConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON output format
    pub json_format: bool,

    /// Log to a daily rolling file in addition to stdout
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// Process lifecycle configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Upper bound on `stop()` once a shutdown was requested
    pub shutdown_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl LifecycleConfig {
    /// Shutdown timeout as a duration
    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_timeout_secs)
    }
}

// ============================================================================
// Root config
// ============================================================================

/// Loaded configuration shared with plugins through the root config service
#[derive(Debug, Clone)]
pub struct RootConfig {
    figment: Figment,
    backend: BackendConfig,
}

impl RootConfig {
    /// Build from a figment, validating the runtime's own sections
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let backend: BackendConfig = figment.extract().map_err(|e| {
            Error::configuration_with_source("Failed to extract configuration", e)
        })?;
        validate_backend_config(&backend)?;
        Ok(Self { figment, backend })
    }

    /// The runtime's own configuration
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Extract the section at `key` (dotted path) into `T`
    ///
    /// Returns `Ok(None)` when the section is absent.
    pub fn extract<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        if !self.figment.contains(key) {
            return Ok(None);
        }
        self.figment
            .extract_inner(key)
            .map(Some)
            .map_err(|e| {
                Error::configuration_with_source(format!("Invalid configuration section '{key}'"), e)
            })
    }

    /// Whether a value exists at `key`
    pub fn contains(&self, key: &str) -> bool {
        self.figment.contains(key)
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(BackendConfig::default())),
            backend: BackendConfig::default(),
        }
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Configuration loader service
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: CONFIG_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Get the configured file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Merge every configuration source into a figment
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(BackendConfig::default()));

        if let Some(config_path) = &self.config_path {
            let found = config_path.exists();
            if found {
                figment = figment.merge(Toml::file(config_path));
            }
            log_config_loaded(config_path, found);
        } else if let Some(default_path) = Self::find_default_config_path() {
            figment = figment.merge(Toml::file(&default_path));
            log_config_loaded(&default_path, true);
        }

        figment.merge(Env::prefixed(&format!("{}_", self.env_prefix)).split("__"))
    }

    /// Load and validate configuration from all sources
    pub fn load(&self) -> Result<RootConfig> {
        RootConfig::from_figment(self.figment())
    }

    /// Save a backend configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, config: &BackendConfig, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(config).map_err(|e| {
            Error::configuration_with_source("Failed to serialize config to TOML", e)
        })?;
        std::fs::write(path.as_ref(), toml_string)?;
        Ok(())
    }

    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;

        let candidates = [
            Some(current_dir.join(DEFAULT_CONFIG_FILENAME)),
            Some(
                current_dir
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME),
            ),
            dirs::config_dir().map(|d| d.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILENAME)),
            dirs::home_dir().map(|d| {
                d.join(format!(".{DEFAULT_CONFIG_DIR}"))
                    .join(DEFAULT_CONFIG_FILENAME)
            }),
        ];

        candidates.into_iter().flatten().find(|path| path.exists())
    }
}

/// Validate the runtime's configuration sections
pub fn validate_backend_config(config: &BackendConfig) -> Result<()> {
    parse_log_level(&config.logging.level)?;
    if config.lifecycle.shutdown_timeout_secs == 0 {
        return Err(Error::configuration("Shutdown timeout cannot be 0"));
    }
    Ok(())
}
