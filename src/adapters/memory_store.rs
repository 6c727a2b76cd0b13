//! In-Memory Learning Store
//!
//! `LearningStore` backed by ordered maps behind a single `RwLock`. Each
//! `modify_*` call runs under the write lock, which gives the per-key
//! serialization the updater relies on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::{
    ActionCategory, InteractionPattern, Lesson, LessonKey, LeverCoefficient, LeverKey,
    PatternTradeEvent, PmOverride,
};
use crate::ports::{ConfigRow, InteractionUpdate, LearningStore, LeverUpdate, StoreError};

/// Serializable copy of every table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub levers: Vec<LeverCoefficient>,
    #[serde(default)]
    pub interactions: Vec<InteractionPattern>,
    #[serde(default)]
    pub events: Vec<PatternTradeEvent>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
    #[serde(default)]
    pub overrides: Vec<PmOverride>,
    #[serde(default)]
    pub config: Vec<ConfigRow>,
}

#[derive(Debug, Default)]
struct Tables {
    levers: BTreeMap<LeverKey, LeverCoefficient>,
    interactions: BTreeMap<String, InteractionPattern>,
    events: Vec<PatternTradeEvent>,
    lessons: BTreeMap<LessonKey, Lesson>,
    overrides: BTreeMap<LessonKey, PmOverride>,
    config: BTreeMap<(String, String), String>,
}

impl Tables {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            levers: snapshot
                .levers
                .into_iter()
                .map(|l| (l.lever_key(), l))
                .collect(),
            interactions: snapshot
                .interactions
                .into_iter()
                .map(|i| (i.interaction_key.clone(), i))
                .collect(),
            events: snapshot.events,
            lessons: snapshot.lessons.into_iter().map(|l| (l.key(), l)).collect(),
            overrides: snapshot.overrides.into_iter().map(|o| (o.key(), o)).collect(),
            config: snapshot
                .config
                .into_iter()
                .map(|row| ((row.module, row.key), row.value))
                .collect(),
        }
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            levers: self.levers.values().cloned().collect(),
            interactions: self.interactions.values().cloned().collect(),
            events: self.events.clone(),
            lessons: self.lessons.values().cloned().collect(),
            overrides: self.overrides.values().cloned().collect(),
            config: self
                .config
                .iter()
                .map(|((module, key), value)| ConfigRow::new(module, key, value))
                .collect(),
        }
    }
}

/// Learning store kept entirely in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            tables: RwLock::new(Tables::from_snapshot(snapshot)),
        }
    }

    /// Copy every table
    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        Ok(self.read()?.to_snapshot())
    }

    /// Number of stored fact rows
    pub fn event_count(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.events.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl LearningStore for InMemoryStore {
    fn lever(&self, key: &LeverKey) -> Result<Option<LeverCoefficient>, StoreError> {
        Ok(self.read()?.levers.get(key).cloned())
    }

    fn modify_lever(
        &self,
        key: &LeverKey,
        update: LeverUpdate<'_>,
    ) -> Result<LeverCoefficient, StoreError> {
        let mut tables = self.write()?;
        let updated = update(tables.levers.get(key));
        tables.levers.insert(key.clone(), updated.clone());
        Ok(updated)
    }

    fn levers_named(
        &self,
        module: &str,
        scope: &str,
        name: &str,
    ) -> Result<Vec<LeverCoefficient>, StoreError> {
        Ok(self
            .read()?
            .levers
            .values()
            .filter(|l| l.module == module && l.scope == scope && l.name == name)
            .cloned()
            .collect())
    }

    fn interaction(&self, interaction_key: &str) -> Result<Option<InteractionPattern>, StoreError> {
        Ok(self.read()?.interactions.get(interaction_key).cloned())
    }

    fn modify_interaction(
        &self,
        interaction_key: &str,
        update: InteractionUpdate<'_>,
    ) -> Result<InteractionPattern, StoreError> {
        let mut tables = self.write()?;
        let updated = update(tables.interactions.get(interaction_key));
        tables
            .interactions
            .insert(interaction_key.to_string(), updated.clone());
        Ok(updated)
    }

    fn append_events(&self, events: &[PatternTradeEvent]) -> Result<(), StoreError> {
        self.write()?.events.extend_from_slice(events);
        Ok(())
    }

    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<PatternTradeEvent>, StoreError> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| e.timestamp >= since)
            .cloned()
            .collect())
    }

    fn replace_mined(
        &self,
        lessons: Vec<Lesson>,
        overrides: Vec<PmOverride>,
    ) -> Result<usize, StoreError> {
        let lessons: BTreeMap<LessonKey, Lesson> =
            lessons.into_iter().map(|l| (l.key(), l)).collect();
        let overrides: BTreeMap<LessonKey, PmOverride> =
            overrides.into_iter().map(|o| (o.key(), o)).collect();

        let mut tables = self.write()?;
        let removed = tables
            .lessons
            .keys()
            .filter(|k| !lessons.contains_key(*k))
            .count()
            + tables
                .overrides
                .keys()
                .filter(|k| !overrides.contains_key(*k))
                .count();
        tables.lessons = lessons;
        tables.overrides = overrides;
        Ok(removed)
    }

    fn lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        Ok(self.read()?.lessons.values().cloned().collect())
    }

    fn overrides_for(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
    ) -> Result<Vec<PmOverride>, StoreError> {
        Ok(self
            .read()?
            .overrides
            .values()
            .filter(|o| o.pattern_key == pattern_key && o.action_category == action_category)
            .cloned()
            .collect())
    }

    fn config_rows(&self, module: &str) -> Result<Vec<ConfigRow>, StoreError> {
        Ok(self
            .read()?
            .config
            .iter()
            .filter(|((m, _), _)| m == module)
            .map(|((m, k), v)| ConfigRow::new(m, k, v))
            .collect())
    }

    fn put_config_row(&self, row: ConfigRow) -> Result<(), StoreError> {
        self.write()?.config.insert((row.module, row.key), row.value);
        Ok(())
    }
}
