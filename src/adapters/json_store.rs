//! JSON Snapshot Store
//!
//! Durable `LearningStore` that keeps every table in memory and rewrites a
//! single JSON snapshot file after each mutation. Flushes are serialized so
//! concurrent writers never share a half-written temp file. The file is
//! reloaded on open.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::memory_store::{InMemoryStore, StoreSnapshot};
use crate::domain::{
    ActionCategory, InteractionPattern, Lesson, LeverCoefficient, LeverKey,
    PatternTradeEvent, PmOverride,
};
use crate::ports::{ConfigRow, InteractionUpdate, LearningStore, LeverUpdate, StoreError};

/// Default store file name
pub const DEFAULT_STORE_FILE: &str = "learning_store.json";

/// Learning store persisted as a JSON snapshot
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
    flush_lock: Mutex<()>,
    flushes: AtomicU64,
}

impl JsonFileStore {
    /// Open the store at `path`, creating an empty one if the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = Self::load(&path)?.unwrap_or_default();

        tracing::info!(
            "Learning store opened: {} ({} levers, {} events, {} lessons)",
            path.display(),
            snapshot.levers.len(),
            snapshot.events.len(),
            snapshot.lessons.len()
        );

        Ok(Self {
            path,
            inner: InMemoryStore::from_snapshot(snapshot),
            flush_lock: Mutex::new(()),
            flushes: AtomicU64::new(0),
        })
    }

    /// Get default store file path for a data directory
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join(DEFAULT_STORE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshot writes since open
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Copy of the current tables
    pub fn snapshot(&self) -> Result<StoreSnapshot, StoreError> {
        self.inner.snapshot()
    }

    fn load(path: &Path) -> Result<Option<StoreSnapshot>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(path).map_err(|e| StoreError::ReadError(e.to_string()))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: StoreSnapshot = serde_json::from_str(&content)
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;

        Ok(Some(snapshot))
    }

    /// Write the current snapshot to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        // Held across snapshot, write and rename so the last writer persists
        // the newest state
        let _guard = self
            .flush_lock
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::WriteError(e.to_string()))?;
            }
        }

        let snapshot = self.inner.snapshot()?;
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;

        // Readers only ever see a complete snapshot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::WriteError(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::WriteError(e.to_string()))?;
        self.flushes.fetch_add(1, Ordering::Relaxed);

        tracing::debug!("Learning store flushed: {}", self.path.display());
        Ok(())
    }
}

impl LearningStore for JsonFileStore {
    fn lever(&self, key: &LeverKey) -> Result<Option<LeverCoefficient>, StoreError> {
        self.inner.lever(key)
    }

    fn modify_lever(
        &self,
        key: &LeverKey,
        update: LeverUpdate<'_>,
    ) -> Result<LeverCoefficient, StoreError> {
        let updated = self.inner.modify_lever(key, update)?;
        self.flush()?;
        Ok(updated)
    }

    fn levers_named(
        &self,
        module: &str,
        scope: &str,
        name: &str,
    ) -> Result<Vec<LeverCoefficient>, StoreError> {
        self.inner.levers_named(module, scope, name)
    }

    fn interaction(&self, interaction_key: &str) -> Result<Option<InteractionPattern>, StoreError> {
        self.inner.interaction(interaction_key)
    }

    fn modify_interaction(
        &self,
        interaction_key: &str,
        update: InteractionUpdate<'_>,
    ) -> Result<InteractionPattern, StoreError> {
        let updated = self.inner.modify_interaction(interaction_key, update)?;
        self.flush()?;
        Ok(updated)
    }

    fn append_events(&self, events: &[PatternTradeEvent]) -> Result<(), StoreError> {
        self.inner.append_events(events)?;
        self.flush()
    }

    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<PatternTradeEvent>, StoreError> {
        self.inner.events_since(since)
    }

    fn replace_mined(
        &self,
        lessons: Vec<Lesson>,
        overrides: Vec<PmOverride>,
    ) -> Result<usize, StoreError> {
        let removed = self.inner.replace_mined(lessons, overrides)?;
        self.flush()?;
        Ok(removed)
    }

    fn lessons(&self) -> Result<Vec<Lesson>, StoreError> {
        self.inner.lessons()
    }

    fn overrides_for(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
    ) -> Result<Vec<PmOverride>, StoreError> {
        self.inner.overrides_for(pattern_key, action_category)
    }

    fn config_rows(&self, module: &str) -> Result<Vec<ConfigRow>, StoreError> {
        self.inner.config_rows(module)
    }

    fn put_config_row(&self, row: ConfigRow) -> Result<(), StoreError> {
        self.inner.put_config_row(row)?;
        self.flush()
    }
}
