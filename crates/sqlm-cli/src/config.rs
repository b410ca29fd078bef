//! Configuration for the sqlm CLI
//!
//! Loads configuration from:
//! 1. sqlm.yaml - store location, logging and model descriptors
//! 2. .env file - local overrides
//!
//! Environment variables always override sqlm.yaml values.

use serde::{Deserialize, Serialize};
use sqlm_duck::StoreConfig;
use sqlm_ir::{Field, Schema, SchemaError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid model: {0}")]
    Model(#[from] SchemaError),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: console, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "console".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// One record type the CLI can address by table name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub table: String,
    pub fields: Vec<Field>,
}

impl ModelConfig {
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        Schema::new(self.table.as_str(), self.fields.clone())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SQLM_DATABASE") {
            // ":memory:" selects an in-memory store
            self.store.path = match path.as_str() {
                "" | ":memory:" => None,
                _ => Some(PathBuf::from(path)),
            };
        }
        if let Some(threads) = lookup("SQLM_THREADS") {
            self.store.threads = Some(parse_env("SQLM_THREADS", &threads)?);
        }
        if let Some(limit) = lookup("SQLM_MEMORY_LIMIT_MB") {
            self.store.memory_limit_mb = Some(parse_env("SQLM_MEMORY_LIMIT_MB", &limit)?);
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

        Ok(())
    }

    /// Validated schema descriptors of every configured model
    pub fn schemas(&self) -> Result<Vec<Schema>, ConfigError> {
        self.models
            .iter()
            .map(|m| m.schema().map_err(ConfigError::from))
            .collect()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlm_ir::FieldType;
    use std::collections::HashMap;

    const CONFIG_YAML: &str = r#"
store:
  path: "./data/app.duckdb"
  threads: 2
logging:
  level: "info"
  format: "json"
  output: "console"
  directory: "./logs"
models:
  - table: users
    fields:
      - { name: id, type: uuid, primary_key: true }
      - { name: name, type: text, nullable: false }
      - { name: age, type: int }
"#;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.path, None);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.logging.output, "console");
        assert!(config.models.is_empty());
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlm.yaml");
        std::fs::write(&path, CONFIG_YAML).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.format, "json");

        let schemas = config.schemas().unwrap();
        assert_eq!(schemas.len(), 1);
        let users = &schemas[0];
        assert_eq!(users.table(), "users");
        assert_eq!(users.single_key().unwrap().ty, FieldType::Uuid);
        assert!(!users.require("name").unwrap().nullable);
        assert!(users.require("age").unwrap().nullable);
    }

    #[test]
    fn test_overrides() {
        let mut config: Config = serde_yaml::from_str(CONFIG_YAML).unwrap();
        let env: HashMap<&str, &str> = [
            ("SQLM_DATABASE", ":memory:"),
            ("SQLM_MEMORY_LIMIT_MB", "512"),
            ("LOG_FORMAT", "pretty"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store.path, None);
        assert_eq!(config.store.threads, Some(2));
        assert_eq!(config.store.memory_limit_mb, Some(512));
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|name| (name == "SQLM_THREADS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_invalid_model() {
        let config: Config = serde_yaml::from_str(
            "models:\n  - table: notes\n    fields:\n      - { name: body, type: text }\n",
        )
        .unwrap();
        assert!(matches!(
            config.schemas(),
            Err(ConfigError::Model(SchemaError::NoPrimaryKey(_)))
        ));
    }
}
