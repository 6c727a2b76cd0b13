//! Learning Store Port
//!
//! The persistent store is an external collaborator. The engine only needs
//! upsert-by-key, atomic read-modify-write for a single row, filtered scans
//! and a batch replacement of the mined lessons and overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    ActionCategory, InteractionPattern, Lesson, LeverCoefficient, LeverKey,
    PatternTradeEvent, PmOverride,
};

/// Store error type
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Failed to serialize store snapshot: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize store snapshot: {0}")]
    DeserializationError(String),

    #[error("Failed to write store file: {0}")]
    WriteError(String),

    #[error("Failed to read store file: {0}")]
    ReadError(String),
}

/// One persisted override of a tunable constant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRow {
    pub module: String,
    pub key: String,
    pub value: String,
}

impl ConfigRow {
    pub fn new(module: &str, key: &str, value: &str) -> Self {
        Self {
            module: module.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// Update function applied atomically to a lever row
pub type LeverUpdate<'a> = &'a dyn Fn(Option<&LeverCoefficient>) -> LeverCoefficient;

/// Update function applied atomically to an interaction row
pub type InteractionUpdate<'a> = &'a dyn Fn(Option<&InteractionPattern>) -> InteractionPattern;

/// Repository for all learned state.
///
/// Implementations must apply `modify_*` as a single atomic step per key so
/// that concurrent updates to the same lever serialize.
pub trait LearningStore: Send + Sync {
    // Lever coefficients

    fn lever(&self, key: &LeverKey) -> Result<Option<LeverCoefficient>, StoreError>;

    /// Atomically read, transform and write back one lever row
    fn modify_lever(
        &self,
        key: &LeverKey,
        update: LeverUpdate<'_>,
    ) -> Result<LeverCoefficient, StoreError>;

    /// All coefficients of one lever within a module/scope
    fn levers_named(
        &self,
        module: &str,
        scope: &str,
        name: &str,
    ) -> Result<Vec<LeverCoefficient>, StoreError>;

    // Interaction patterns

    fn interaction(&self, interaction_key: &str) -> Result<Option<InteractionPattern>, StoreError>;

    fn modify_interaction(
        &self,
        interaction_key: &str,
        update: InteractionUpdate<'_>,
    ) -> Result<InteractionPattern, StoreError>;

    // Pattern-trade facts

    fn append_events(&self, events: &[PatternTradeEvent]) -> Result<(), StoreError>;

    /// Events with `timestamp >= since`
    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<PatternTradeEvent>, StoreError>;

    // Lessons and overrides

    /// Replace the mined set in one step: upsert every given lesson and
    /// override, then drop stored rows that are not among them.
    /// Returns the number of rows removed.
    fn replace_mined(
        &self,
        lessons: Vec<Lesson>,
        overrides: Vec<PmOverride>,
    ) -> Result<usize, StoreError>;

    fn lessons(&self) -> Result<Vec<Lesson>, StoreError>;

    fn overrides_for(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
    ) -> Result<Vec<PmOverride>, StoreError>;

    // Config overrides

    fn config_rows(&self, module: &str) -> Result<Vec<ConfigRow>, StoreError>;

    fn put_config_row(&self, row: ConfigRow) -> Result<(), StoreError>;
}
