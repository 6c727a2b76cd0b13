use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

use super::store::{ConfigRow, InteractionUpdate, LearningStore, LeverUpdate, StoreError};
use crate::domain::{
    ActionCategory, InteractionPattern, Lesson, LeverCoefficient, LeverKey,
    PatternTradeEvent, PmOverride,
};

/// Store that fails every call and records which operations were attempted.
///
/// Used to check that readers degrade to cold-start values when learned
/// state is unreachable.
#[derive(Debug, Default, Clone)]
pub struct FailingStore {
    calls: Arc<Mutex<Vec<String>>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn fail<T>(&self, op: &str) -> Result<T, StoreError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(op.to_string());
        }
        Err(StoreError::Unavailable(format!("{} failed (test store)", op)))
    }
}

impl LearningStore for FailingStore {
    fn lever(&self, _key: &LeverKey) -> Result<Option<LeverCoefficient>, StoreError> {
        self.fail("lever")
    }

    fn modify_lever(
        &self,
        _key: &LeverKey,
        _update: LeverUpdate<'_>,
    ) -> Result<LeverCoefficient, StoreError> {
        self.fail("modify_lever")
    }

    fn levers_named(
        &self,
        _module: &str,
        _scope: &str,
        _name: &str,
    ) -> Result<Vec<LeverCoefficient>, StoreError> {
        self.fail("levers_named")
    }

    fn interaction(&self, _key: &str) -> Result<Option<InteractionPattern>, StoreError> {
        self.fail("interaction")
    }

    fn modify_interaction(
        &self,
        _key: &str,
        _update: InteractionUpdate<'_>,
    ) -> Result<InteractionPattern, StoreError> {
        self.fail("modify_interaction")
    }

    fn append_events(&self, _events: &[PatternTradeEvent]) -> Result<(), StoreError> {
        self.fail("append_events")
    }

    fn events_since(&self, _since: DateTime<Utc>) -> Result<Vec<PatternTradeEvent>, StoreError> {
        self.fail("events_since")
    }

    fn replace_mined(
        &self,
        _lessons: Vec<Lesson>,
        _overrides: Vec<PmOverride>,
    ) -> Result<usize, StoreError> {
        self.fail("replace_mined")
    }

    fn lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        self.fail("lessons")
    }

    fn overrides_for(
        &self,
        _pattern_key: &str,
        _action_category: ActionCategory,
    ) -> Result<Vec<PmOverride>, StoreError> {
        self.fail("overrides_for")
    }

    fn config_rows(&self, _module: &str) -> Result<Vec<ConfigRow>, StoreError> {
        self.fail("config_rows")
    }

    fn put_config_row(&self, _row: ConfigRow) -> Result<(), StoreError> {
        self.fail("put_config_row")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failing_store_records_calls() {
        let store = FailingStore::new();

        let key = LeverKey::new("dm", "global", "chain", "base");
        assert!(store.lever(&key).is_err());
        assert!(store.events_since(Utc::now()).is_err());

        assert_eq!(
            store.get_calls(),
            vec!["lever".to_string(), "events_since".to_string()]
        );
    }
}
