//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.
//! Every section is optional; missing values fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adapters::json_store::DEFAULT_STORE_FILE;
use crate::domain::LeverScope;
use crate::learning::{LearningConfig, LearningConfigError};

/// Default config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreSection,
    pub scope: ScopeSection,
    pub logging: LoggingSection,
    pub miner: MinerSection,
    pub learning: LearningConfig,
}

/// Store configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path of the JSON snapshot file (`~` is expanded)
    pub path: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: format!("data/{}", DEFAULT_STORE_FILE),
        }
    }
}

impl StoreSection {
    /// Get store path with environment variable override
    /// Checks LEVER_LEARNING_STORE env var first, falls back to config value
    pub fn get_path(&self) -> PathBuf {
        let raw = std::env::var("LEVER_LEARNING_STORE").unwrap_or_else(|_| self.path.clone());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

/// Lever scope configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSection {
    /// Owning module of the levers (e.g. "dm")
    pub module: String,
    /// Scope within the module (e.g. "global")
    pub scope: String,
}

impl Default for ScopeSection {
    fn default() -> Self {
        let scope = LeverScope::default();
        Self {
            module: scope.module,
            scope: scope.scope,
        }
    }
}

impl ScopeSection {
    /// Get module with environment variable override
    /// Checks LEVER_LEARNING_MODULE env var first, falls back to config value
    pub fn get_module(&self) -> String {
        std::env::var("LEVER_LEARNING_MODULE").unwrap_or_else(|_| self.module.clone())
    }

    pub fn lever_scope(&self) -> LeverScope {
        LeverScope::new(self.get_module(), self.scope.clone())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Mining scheduler configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerSection {
    /// Seconds between mining passes
    pub interval_secs: u64,
}

impl Default for MinerSection {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

impl MinerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid [learning] section: {0}")]
    LearningError(#[from] LearningConfigError),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load from `path` if given, else from `config.toml` when present, else defaults
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config(DEFAULT_CONFIG_FILE),
        None => Ok(Config::default()),
    }
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "store path cannot be empty".to_string(),
            ));
        }

        if self.scope.module.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "scope module cannot be empty".to_string(),
            ));
        }

        if self.scope.scope.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "scope cannot be empty".to_string(),
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log level must be trace/debug/info/warn/error, got {}",
                self.logging.level
            )));
        }

        if self.miner.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "miner interval_secs must be > 0".to_string(),
            ));
        }

        self.learning.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[store]
path = "/var/lib/lever-learning/store.json"

[scope]
module = "pm"
scope = "solana"

[logging]
level = "debug"

[miner]
interval_secs = 900

[learning]
tau_short_days = 7.0
n_min = 40
n_confident = 150

[learning.lever_base_weights]
curator = 1.2
"#
        .to_string()
    }

    #[test]
    fn test_load_valid_config() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(create_valid_config().as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();

        assert_eq!(config.scope.module, "pm");
        assert_eq!(config.scope.scope, "solana");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.miner.interval(), Duration::from_secs(900));
        assert_eq!(config.learning.tau_short_days, 7.0);
        assert_eq!(config.learning.n_min, 40);
        assert_eq!(config.learning.tau_long_days, 90.0);
        assert_eq!(config.learning.lever_base_weight("curator"), 1.2);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.learning, LearningConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[store\npath = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_learning_section() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[learning]\nn_min = 200\nn_confident = 100\n").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::LearningError(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.miner.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        assert!(load_config_or_default(Some(Path::new("/nonexistent/config.toml"))).is_err());
    }
}
