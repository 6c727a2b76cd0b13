//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, LoggingSection, MinerSection, ScopeSection, StoreSection,
    load_config, load_config_or_default, DEFAULT_CONFIG_FILE,
};
