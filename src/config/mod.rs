//! Service configuration loaded from a YAML file.
//!
//! Everything carries a default so a minimal file (or none at all) still
//! yields a runnable configuration; only the source database path has no
//! sensible default and is validated on load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dispatch::DEFAULT_MAX_WORKERS;

/// Default rows fetched per source batch.
pub const DEFAULT_PREFETCH_ROWS: usize = 15_000;
/// Default seconds between full trigger-table reloads.
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 2 * 60 * 60;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML from a specific file.
    #[error("YAML parse error in '{path}': {source}")]
    YamlFileError {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Config-store backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// In-memory store (non-persistent, development only).
    #[serde(rename = "memory")]
    #[default]
    Memory,
    /// SQLite store.
    #[serde(rename = "sqlite")]
    Sqlite {
        /// Path to the database file.
        path: String,
    },
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Config-store backend.
    pub store: StoreConfig,
    /// Path to the source database exports query against.
    pub source_path: String,
    /// Concurrent export workers.
    pub workers: usize,
    /// Rows fetched per source batch.
    pub prefetch_rows: usize,
    /// Seconds between full trigger-table reloads.
    pub reload_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            source_path: String::new(),
            workers: DEFAULT_MAX_WORKERS,
            prefetch_rows: DEFAULT_PREFETCH_ROWS,
            reload_interval_secs: DEFAULT_RELOAD_INTERVAL_SECS,
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.source_path.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "source_path must be set".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.prefetch_rows == 0 {
            return Err(ConfigError::InvalidConfig(
                "prefetch_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
