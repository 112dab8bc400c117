//! Server configuration loading from file and environment variables.

use keel_db::{ConnectionString, DatabaseOptions, TraceConfig};
use serde::Deserialize;
use thiserror::Error;

/// Environment switch that turns on SQL tracing for every handle.
pub const TRACE_SQL_ENV: &str = "KEEL_TRACE_SQL";

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Extension hook settings.
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Connection descriptor and pool sizing.
    #[serde(flatten)]
    pub options: DatabaseOptions,

    /// SQL tracing. Read once at startup.
    #[serde(default)]
    pub trace: TraceConfig,
}

/// Extension hook configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksConfig {
    /// Enables hook dispatch. Feature modules that subscribe to domain
    /// events need this; leaving it off removes all dispatch overhead.
    #[serde(default)]
    pub enabled: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "keel_db=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `KEEL_DB_CONNECTION_STRING` overrides `database.connection_string`
/// - `KEEL_TRACE_SQL` overrides `database.trace.enabled` (set to "1" to enable)
/// - `KEEL_HOOKS_ENABLED` overrides `hooks.enabled` (set to "true" to enable)
/// - `KEEL_LOG_LEVEL` overrides `logging.level`
/// - `KEEL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies environment overrides, looking each variable up through `var`.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(conn) = var("KEEL_DB_CONNECTION_STRING") {
        config.database.options.connection_string = ConnectionString::new(conn);
    }
    if let Some(trace) = var(TRACE_SQL_ENV) {
        config.database.trace.enabled = trace == "1";
    }
    if let Some(hooks) = var("KEEL_HOOKS_ENABLED") {
        config.hooks.enabled = hooks == "true" || hooks == "1";
    }
    if let Some(level) = var("KEEL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("KEEL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
