//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, the learning components never talk to a
//! database directly. They receive a `LearningStore` at construction.

pub mod store;
pub mod mocks;

pub use store::{ConfigRow, InteractionUpdate, LearningStore, LeverUpdate, StoreError};
pub use mocks::FailingStore;
