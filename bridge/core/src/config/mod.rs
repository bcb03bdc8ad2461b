//! TOML Configuration File Support
//!
//! Centralized configuration loading for the bridge, from a TOML file at
//! `~/.config/brain-bridge/bridge.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [query]
//! context_collection = true
//! timeout_ms = 60000
//! verbose_mode = false
//!
//! [transport]
//! socket_path = "/run/user/1000/brain-bridge/brain.sock"
//! connect_timeout_ms = 5000
//! invoke_deadline_ms = 0
//!
//! [events]
//! max_listeners_per_event = 32
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::DEFAULT_MAX_LISTENERS;
use crate::messages::QueryConfig;
use crate::transport::config::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Highest-priority source that contributed to a configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[query]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryToml {
    /// Let the backend gather context before planning
    pub context_collection: Option<bool>,

    /// Advisory query timeout forwarded to the backend
    pub timeout_ms: Option<u64>,

    /// Ask the backend for detailed progress
    pub verbose_mode: Option<bool>,
}

/// `[transport]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Backend socket
    pub socket_path: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Hard deadline on every invoke in milliseconds (0 = none)
    pub invoke_deadline_ms: Option<u64>,
}

/// `[events]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsToml {
    /// Capacity of each listener set
    pub max_listeners_per_event: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeToml {
    /// Query options
    pub query: QueryToml,

    /// Transport options
    pub transport: TransportToml,

    /// Listener registry options
    pub events: EventsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved bridge configuration
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Options forwarded with every `processQuery`
    pub query: QueryConfig,

    /// Transport configuration
    pub transport: TransportConfig,

    /// Capacity of each listener set
    pub max_listeners_per_event: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            transport: TransportConfig::default(),
            max_listeners_per_event: DEFAULT_MAX_LISTENERS,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl BridgeConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest-priority source applied
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// `ValidationError` naming the first offending setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "query.timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_listeners_per_event == 0 {
            return Err(ConfigError::ValidationError(
                "events.max_listeners_per_event must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/brain-bridge/bridge.toml`, or
/// `~/.config/brain-bridge/bridge.toml` when `XDG_CONFIG_HOME` is unset.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("brain-bridge").join("bridge.toml"))
}

/// Load configuration from the default path, the environment and defaults
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<BridgeConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the result
/// fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<BridgeConfig, ConfigError> {
    load_config_with_env(path.as_deref(), |key| std::env::var(key).ok())
}

/// Load configuration with a custom environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<BridgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BridgeConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: BridgeToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut BridgeConfig, toml: &BridgeToml) {
    if let Some(enabled) = toml.query.context_collection {
        config.query.context_collection = enabled;
    }
    if let Some(timeout) = toml.query.timeout_ms {
        config.query.timeout_ms = timeout;
    }
    if let Some(verbose) = toml.query.verbose_mode {
        config.query.verbose_mode = verbose;
    }

    if let Some(ref path) = toml.transport.socket_path {
        config.transport.socket_path = PathBuf::from(path);
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }
    if let Some(deadline) = toml.transport.invoke_deadline_ms {
        config.transport.invoke_deadline_ms = deadline;
    }

    if let Some(max) = toml.events.max_listeners_per_event {
        config.max_listeners_per_event = max;
    }
}

fn parse_flag(value: &str) -> bool {
    value != "0" && !value.eq_ignore_ascii_case("false")
}

fn apply_env_config<F>(config: &mut BridgeConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env("BRAIN_BRIDGE_CONTEXT_COLLECTION") {
        config.query.context_collection = parse_flag(&value);
        config.source = ConfigSource::Env;
    }
    if let Some(value) = env("BRAIN_BRIDGE_TIMEOUT_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.query.timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(value) = env("BRAIN_BRIDGE_VERBOSE") {
        config.query.verbose_mode = parse_flag(&value);
        config.source = ConfigSource::Env;
    }

    if let Some(path) = env("BRAIN_BRIDGE_SOCKET") {
        config.transport.socket_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
    if let Some(value) = env("BRAIN_BRIDGE_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.transport.connect_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }
    if let Some(value) = env("BRAIN_BRIDGE_INVOKE_DEADLINE_MS") {
        if let Ok(ms) = value.parse::<u64>() {
            config.transport.invoke_deadline_ms = ms;
            config.source = ConfigSource::Env;
        }
    }

    if let Some(value) = env("BRAIN_BRIDGE_MAX_LISTENERS") {
        if let Ok(n) = value.parse::<usize>() {
            config.max_listeners_per_event = n;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Socket path override
    pub socket_path: Option<PathBuf>,

    /// Verbose progress override
    pub verbose_mode: Option<bool>,

    /// Advisory query timeout override
    pub timeout_ms: Option<u64>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket path override
    #[must_use]
    pub fn with_socket_path(mut self, path: PathBuf) -> Self {
        self.socket_path = Some(path);
        self
    }

    /// Set verbose progress override
    #[must_use]
    pub fn with_verbose_mode(mut self, verbose: bool) -> Self {
        self.verbose_mode = Some(verbose);
        self
    }

    /// Set advisory query timeout override
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// # Errors
    ///
    /// `ValidationError` if an override puts a value out of range.
    pub fn apply(&self, config: &mut BridgeConfig) -> Result<(), ConfigError> {
        if self.socket_path.is_some()
            || self.verbose_mode.is_some()
            || self.timeout_ms.is_some()
            || self.connect_timeout_ms.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref path) = self.socket_path {
            config.transport.socket_path = path.clone();
        }
        if let Some(verbose) = self.verbose_mode {
            config.query.verbose_mode = verbose;
        }
        if let Some(ms) = self.timeout_ms {
            config.query.timeout_ms = ms;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.transport.connect_timeout_ms = ms;
        }

        config.validate()
    }
}

// =============================================================================
// Tests
// =============================================================================
