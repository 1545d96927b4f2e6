//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults.

use crate::storage::config::StorageConfig;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "blobstore.yaml";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "blobstore_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load `blobstore.yaml` if present, defaults otherwise. Environment
    /// overrides are applied on top either way.
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::load_from(DEFAULT_CONFIG_FILE)
        } else {
            warn!("Config file not found, using defaults");
            Ok(Self::with_env_overrides(Self::default()))
        }
    }

    /// Load configuration from an explicit YAML file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(Self::with_env_overrides(config))
    }

    fn with_env_overrides(mut config: Self) -> Self {
        config.storage = config.storage.with_env_overrides();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_generator::GeneratorKind;
    use crate::storage::config::StorageBackend;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_load_from_yaml() {
        std::env::remove_var("STORAGE_BACKEND");
        std::env::remove_var("STORAGE_ID_GENERATOR");
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "storage:\n  backend: sqlite\n  db_path: ':memory:'\n  generator: compact\nlogging:\n  config_file: custom_log.yaml"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.db_path, ":memory:");
        assert_eq!(config.storage.generator, GeneratorKind::Compact);
        assert_eq!(config.logging.config_file, "custom_log.yaml");
    }

    #[test]
    #[serial]
    fn test_partial_yaml_keeps_defaults() {
        std::env::remove_var("STORAGE_BACKEND");
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "storage:\n  backend: memory").unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.base_path, StorageConfig::default().base_path);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_overrides_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "storage:\n  backend: memory").unwrap();

        std::env::set_var("STORAGE_BACKEND", "sqlite");
        let config = AppConfig::load_from(file.path());
        std::env::remove_var("STORAGE_BACKEND");

        assert_eq!(config.unwrap().storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "storage:\n  backend: tape").unwrap();
        assert!(matches!(AppConfig::load_from(file.path()), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = AppConfig::load_from("/nonexistent/blobstore.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
