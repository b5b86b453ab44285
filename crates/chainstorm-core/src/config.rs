//! Configuration for Chainstorm stores.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`CHAINSTORM__` prefix, `__` separator)
//! 2. Config file (`<prefix>.yaml`, `.toml` or `.json`)
//! 3. Defaults

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Result;

/// Top-level store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the JSON snapshot: one subdirectory per collection.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Logging setup for binaries embedding the store.
    #[serde(default)]
    pub log: LogConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    /// When false, no subscriber is installed at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_level")]
    pub level: String,

    /// `stderr`, `stdout`, a file path, or a comma-separated list of these.
    #[serde(default = "default_output")]
    pub output: String,
}

impl LogConfig {
    /// Split `output` into its individual targets, skipping blanks.
    pub fn outputs(&self) -> Vec<&str> {
        self.output
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("./data")
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_level(),
            output: default_output(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            log: LogConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load from an optional config file named `file_prefix` plus the
    /// environment. A file without a `store` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("CHAINSTORM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<StoreConfig>("store") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => {
                tracing::debug!(file_prefix, "No store configuration found, using defaults");
                Ok(StoreConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.data_path, PathBuf::from("./data"));
        assert!(config.log.enabled);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.outputs(), vec!["stderr"]);
    }

    #[test]
    fn test_multiple_log_outputs() {
        let log = LogConfig {
            output: "stderr, logs/chainstorm.log,".to_string(),
            ..Default::default()
        };
        assert_eq!(log.outputs(), vec!["stderr", "logs/chainstorm.log"]);
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainstorm.yaml");
        std::fs::write(
            &path,
            "store:\n  data_path: /var/lib/chainstorm\n  log:\n    level: debug\n",
        )
        .unwrap();

        let prefix = dir.path().join("chainstorm");
        let config = StoreConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.data_path, PathBuf::from("/var/lib/chainstorm"));
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.output, "stderr");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = StoreConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.data_path, PathBuf::from("./data"));
    }
}
