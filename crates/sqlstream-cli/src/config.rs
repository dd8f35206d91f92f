//! Configuration for the sqlstream CLI
//!
//! Loaded from `sqlstream.yaml` when present, otherwise defaults.
//! Environment variables always override file values; a `.env` file is
//! loaded into the environment first.

use serde::{Deserialize, Serialize};
use sqlstream_dialect::{presets, DialectDescriptor};
use sqlstream_engine::OptimizerConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Invalid log filter: {0}")]
    LogFilter(#[from] tracing_subscriber::filter::ParseError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preset name, see `sqlstream_dialect::presets::by_name`
    pub dialect: String,
    pub optimizer: OptimizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: "duckdb".to_string(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn dialect(&self) -> Result<DialectDescriptor, ConfigError> {
        presets::by_name(&self.dialect).ok_or_else(|| ConfigError::UnknownDialect(self.dialect.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DuckDB database file; in-memory when unset
    pub path: Option<PathBuf>,

    /// SQL script run once after opening, e.g. fixtures for an in-memory
    /// database
    pub init_script: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stderr, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "stderr".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dialect) = lookup("SQLSTREAM_DIALECT") {
            self.engine.dialect = dialect;
        }
        if let Some(value) = lookup("SQLSTREAM_PUSHDOWN") {
            self.engine.optimizer.enable_pushdown = parse_flag(&value)
                .ok_or(ConfigError::InvalidValue {
                    var: "SQLSTREAM_PUSHDOWN",
                    value,
                })?;
        }
        if let Some(path) = lookup("SQLSTREAM_DATABASE") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.directory = dir;
        }

        // fail early rather than at the first query
        self.engine.dialect()?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
