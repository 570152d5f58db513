// SPDX-License-Identifier: MIT

//! Guard configuration
//!
//! Loaded from a TOML file; every field has a default so an empty or
//! missing file is valid.

use crate::coordination::DEFAULT_STALENESS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Registry database file
    pub database: PathBuf,
    /// Staleness window used when a caller does not give one
    #[serde(with = "humantime_serde")]
    pub default_staleness: Duration,
    /// How long to wait on a locked database before failing
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("functions_registry.db"),
            default_staleness: DEFAULT_STALENESS,
            busy_timeout: Duration::from_secs(5),
            log_filter: "warn".to_string(),
        }
    }
}

impl GuardConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load from `path`; relative database paths resolve against the file's directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if config.database.is_relative() {
            if let Some(dir) = path.parent() {
                config.database = dir.join(&config.database);
            }
        }
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise use defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
