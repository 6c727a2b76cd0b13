//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Memory store: process-local `LearningStore`
//! - JSON store: `LearningStore` persisted as a snapshot file
//! - CLI: Command-line interface definitions

pub mod memory_store;
pub mod json_store;
pub mod cli;

pub use memory_store::{InMemoryStore, StoreSnapshot};
pub use json_store::{JsonFileStore, DEFAULT_STORE_FILE};
pub use cli::{CliApp, Command};
