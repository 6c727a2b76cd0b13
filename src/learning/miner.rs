//! Trajectory Miner
//!
//! Scans recent pattern-trade events for slices with enough support to
//! learn from. Events are grouped by `(pattern_key, action_category)`; every
//! group that clears the minimum sample becomes a global lesson, and its
//! events are then sliced by combinations of scope dimensions.
//!
//! Slicing walks a tree of subsets with an explicit work stack. A node only
//! extends with dimensions that come after its own last dimension in the
//! canonical order, so each subset is reached at most once. Children below
//! the minimum sample are neither kept nor expanded.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ActionCategory, Lesson, PatternTradeEvent, Scope, ScopeDimension};
use crate::learning::lesson_builder::LessonBuilder;
use crate::learning::params::LearningConfig;
use crate::ports::{LearningStore, StoreError};

/// Miner error type
#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Summary of one mining run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MiningReport {
    /// Events inside the lookback window
    pub events_scanned: usize,
    /// Events skipped for a non-finite R/R
    pub events_rejected: usize,
    /// `(pattern_key, action_category)` groups seen
    pub groups: usize,
    /// Slices that cleared the minimum sample
    pub lessons_written: usize,
    pub overrides_written: usize,
    /// Stale lessons and overrides removed
    pub pruned: usize,
}

/// One slice waiting to be visited
struct SliceNode<'a> {
    subset: Scope,
    /// Index of the last dimension in the canonical order
    last_dimension: Option<usize>,
    events: Vec<&'a PatternTradeEvent>,
}

/// Sole writer of lessons and overrides
pub struct TrajectoryMiner {
    store: Arc<dyn LearningStore>,
    config: LearningConfig,
    builder: LessonBuilder,
}

impl TrajectoryMiner {
    pub fn new(store: Arc<dyn LearningStore>, config: LearningConfig) -> Self {
        let builder = LessonBuilder::new(config.clone());
        Self {
            store,
            config,
            builder,
        }
    }

    /// Canonical slicing order: descending dimension weight, then enum order.
    /// Dimensions weighted zero are left out.
    pub fn dimension_order(&self, events: &[&PatternTradeEvent]) -> Vec<ScopeDimension> {
        let present: BTreeSet<ScopeDimension> = events
            .iter()
            .flat_map(|e| e.scope.dimensions().cloned())
            .collect();

        let mut ordered: Vec<(f64, ScopeDimension)> = present
            .into_iter()
            .map(|dim| (self.config.dimension_weight(&dim), dim))
            .filter(|(weight, _)| *weight > 0.0)
            .collect();

        ordered.sort_by(|(wa, da), (wb, db)| wb.total_cmp(wa).then_with(|| da.cmp(db)));
        ordered.into_iter().map(|(_, dim)| dim).collect()
    }

    /// Lessons for one `(pattern_key, action_category)` group
    pub fn mine_group(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
        events: &[&PatternTradeEvent],
        now: DateTime<Utc>,
    ) -> Vec<Lesson> {
        let mut lessons = Vec::new();
        if events.len() < self.config.n_min {
            return lessons;
        }

        let dimensions = self.dimension_order(events);
        let mut visited: HashSet<Scope> = HashSet::new();
        let mut stack = vec![SliceNode {
            subset: Scope::new(),
            last_dimension: None,
            events: events.to_vec(),
        }];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.subset.clone()) {
                continue;
            }

            if let Some(lesson) = self.builder.build_lesson(
                pattern_key,
                action_category,
                node.subset.clone(),
                &node.events,
                now,
            ) {
                lessons.push(lesson);
            }

            if node.subset.len() >= self.config.max_slice_depth {
                continue;
            }

            let start = node.last_dimension.map_or(0, |i| i + 1);
            for (index, dimension) in dimensions.iter().enumerate().skip(start) {
                let mut partitions: BTreeMap<&str, Vec<&PatternTradeEvent>> = BTreeMap::new();
                for event in &node.events {
                    // Events without this dimension stay in the parent only
                    if let Some(value) = event.scope.get(dimension) {
                        partitions.entry(value).or_default().push(*event);
                    }
                }

                for (value, child_events) in partitions {
                    if child_events.len() < self.config.n_min {
                        continue;
                    }
                    if child_events.len() == node.events.len() {
                        continue;
                    }

                    stack.push(SliceNode {
                        subset: node.subset.clone().with(dimension.clone(), value),
                        last_dimension: Some(index),
                        events: child_events,
                    });
                }
            }
        }

        lessons
    }

    /// Run one mining pass over the lookback window ending at `now`
    pub fn mine(&self, now: DateTime<Utc>) -> Result<MiningReport, MinerError> {
        let since = now - Duration::days(self.config.lookback_days);
        let events = self.store.events_since(since)?;

        let mut report = MiningReport {
            events_scanned: events.len(),
            ..Default::default()
        };

        let mut groups: BTreeMap<(&str, ActionCategory), Vec<&PatternTradeEvent>> = BTreeMap::new();
        for event in &events {
            if !event.rr.is_finite() {
                report.events_rejected += 1;
                continue;
            }
            groups
                .entry((event.pattern_key.as_str(), event.action_category))
                .or_default()
                .push(event);
        }
        report.groups = groups.len();

        if report.events_rejected > 0 {
            tracing::warn!("Skipped {} events with non-finite R/R", report.events_rejected);
        }

        let mut mined_lessons = Vec::new();
        let mut mined_overrides = Vec::new();

        for ((pattern_key, action_category), group) in &groups {
            let lessons = self.mine_group(pattern_key, *action_category, group, now);
            tracing::debug!(
                "Group {}:{} -> {} events, {} lessons",
                pattern_key,
                action_category,
                group.len(),
                lessons.len()
            );

            for lesson in lessons {
                if let Some(pm_override) = self.builder.derive_override(&lesson) {
                    mined_overrides.push(pm_override);
                }
                mined_lessons.push(lesson);
            }
        }

        report.lessons_written = mined_lessons.len();
        report.overrides_written = mined_overrides.len();
        report.pruned = self.store.replace_mined(mined_lessons, mined_overrides)?;

        tracing::info!(
            "Mining complete: {} events, {} groups, {} lessons, {} overrides, {} pruned",
            report.events_scanned,
            report.groups,
            report.lessons_written,
            report.overrides_written,
            report.pruned
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::ports::FailingStore;

    fn event(trade: usize, rr: f64, scope: Scope, timestamp: DateTime<Utc>) -> PatternTradeEvent {
        PatternTradeEvent {
            trade_id: format!("t-{}", trade),
            pattern_key: "dip".to_string(),
            action_category: ActionCategory::Add,
            scope,
            rr,
            timestamp,
        }
    }

    fn miner(store: Arc<InMemoryStore>) -> TrajectoryMiner {
        TrajectoryMiner::new(store, LearningConfig::default())
    }

    #[test]
    fn test_below_minimum_yields_nothing() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let events: Vec<_> = (0..32).map(|i| event(i, 1.2, Scope::new(), now)).collect();
        store.append_events(&events).unwrap();

        let report = miner(store.clone()).mine(now).unwrap();
        assert_eq!(report.events_scanned, 32);
        assert_eq!(report.lessons_written, 0);
        assert!(store.lessons().unwrap().is_empty());
    }

    #[test]
    fn test_minimum_sample_yields_one_lesson() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let events: Vec<_> = (0..33).map(|i| event(i, 1.2, Scope::new(), now)).collect();
        store.append_events(&events).unwrap();

        let report = miner(store.clone()).mine(now).unwrap();
        assert_eq!(report.lessons_written, 1);

        let lessons = store.lessons().unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].n, 33);
        assert!(lessons[0].scope_subset.is_empty());
        assert!((lessons[0].confidence - 33.0 / 124.0).abs() < 1e-12);
    }

    #[test]
    fn test_slices_by_dimension() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let solana = Scope::new().with(ScopeDimension::Chain, "solana");
        let base = Scope::new().with(ScopeDimension::Chain, "base");

        let mut events: Vec<_> = (0..40).map(|i| event(i, 1.5, solana.clone(), now)).collect();
        events.extend((40..50).map(|i| event(i, 0.5, base.clone(), now)));
        // No scope at all: counts toward the global lesson only
        events.extend((50..55).map(|i| event(i, 1.0, Scope::new(), now)));
        store.append_events(&events).unwrap();

        miner(store.clone()).mine(now).unwrap();

        let lessons = store.lessons().unwrap();
        assert_eq!(lessons.len(), 2);
        let global = lessons.iter().find(|l| l.scope_subset.is_empty()).unwrap();
        assert_eq!(global.n, 55);
        let sliced = lessons.iter().find(|l| l.scope_subset == solana).unwrap();
        assert_eq!(sliced.n, 40);
    }

    #[test]
    fn test_non_narrowing_slice_is_skipped() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let scope = Scope::new().with(ScopeDimension::Chain, "solana");
        let events: Vec<_> = (0..50).map(|i| event(i, 1.5, scope.clone(), now)).collect();
        store.append_events(&events).unwrap();

        miner(store.clone()).mine(now).unwrap();
        let lessons = store.lessons().unwrap();
        assert_eq!(lessons.len(), 1);
        assert!(lessons[0].scope_subset.is_empty());
    }

    #[test]
    fn test_multi_dimension_slices_and_depth() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let mut events = Vec::new();
        for i in 0..200 {
            let scope = Scope::new()
                .with(ScopeDimension::Chain, if i % 2 == 0 { "solana" } else { "base" })
                .with(ScopeDimension::Timeframe, if i % 4 < 2 { "1h" } else { "4h" });
            events.push(event(i, 1.0 + (i % 3) as f64 * 0.5, scope, now));
        }
        store.append_events(&events).unwrap();

        let config = LearningConfig::default();
        let miner = TrajectoryMiner::new(store.clone(), config.clone());
        miner.mine(now).unwrap();

        let lessons = store.lessons().unwrap();
        // global + 2 chains + 2 timeframes + 4 pairs
        assert_eq!(lessons.len(), 9);
        assert!(lessons.iter().all(|l| l.n >= config.n_min));
        assert!(lessons.iter().all(|l| l.scope_subset.len() <= config.max_slice_depth));

        let mut shallow = config.clone();
        shallow.max_slice_depth = 1;
        let store = Arc::new(InMemoryStore::new());
        store.append_events(&events).unwrap();
        TrajectoryMiner::new(store.clone(), shallow).mine(now).unwrap();
        assert_eq!(store.lessons().unwrap().len(), 5);
    }

    #[test]
    fn test_disabled_dimension_is_not_sliced() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let mut events = Vec::new();
        for i in 0..100 {
            let chain = if i % 2 == 0 { "solana" } else { "base" };
            events.push(event(i, 1.2, Scope::new().with(ScopeDimension::Chain, chain), now));
        }
        store.append_events(&events).unwrap();

        let mut config = LearningConfig::default();
        config.dimension_weights.insert("chain".to_string(), 0.0);
        TrajectoryMiner::new(store.clone(), config).mine(now).unwrap();
        assert_eq!(store.lessons().unwrap().len(), 1);
    }

    #[test]
    fn test_dimension_order_follows_weights() {
        let now = Utc::now();
        let scope = Scope::new()
            .with(ScopeDimension::Timeframe, "1h")
            .with(ScopeDimension::McapBucket, "1m-5m")
            .with(ScopeDimension::Other("lane".to_string()), "fast");
        let e = event(0, 1.0, scope, now);

        let order = miner(Arc::new(InMemoryStore::new())).dimension_order(&[&e]);
        assert_eq!(
            order,
            vec![
                ScopeDimension::McapBucket,
                ScopeDimension::Timeframe,
                ScopeDimension::Other("lane".to_string()),
            ]
        );
    }

    #[test]
    fn test_mining_is_idempotent_and_prunes() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let old = now - Duration::days(60);
        let events: Vec<_> = (0..40).map(|i| event(i, 1.3, Scope::new(), old)).collect();
        store.append_events(&events).unwrap();

        let miner = miner(store.clone());
        miner.mine(now).unwrap();
        let first = store.lessons().unwrap();
        miner.mine(now).unwrap();
        assert_eq!(store.lessons().unwrap(), first);

        // Events age out of the lookback window; the lesson goes with them
        let report = miner.mine(now + Duration::days(40)).unwrap();
        assert_eq!(report.events_scanned, 0);
        assert_eq!(report.pruned, 1);
        assert!(store.lessons().unwrap().is_empty());
    }

    #[test]
    fn test_mining_pass_writes_store_once() {
        use crate::adapters::JsonFileStore;

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(dir.path().join("store.json")).unwrap());
        let now = Utc::now();
        let events: Vec<_> = (0..80)
            .map(|i| {
                let chain = if i % 2 == 0 { "solana" } else { "base" };
                event(i, 1.3, Scope::new().with(ScopeDimension::Chain, chain), now)
            })
            .collect();
        store.append_events(&events).unwrap();
        let before = store.flush_count();

        let report = TrajectoryMiner::new(store.clone(), LearningConfig::default())
            .mine(now)
            .unwrap();
        assert_eq!(report.lessons_written, 3);
        assert_eq!(store.flush_count(), before + 1);
    }

    #[test]
    fn test_non_finite_events_are_skipped() {
        let now = Utc::now();
        let store = Arc::new(InMemoryStore::new());
        let mut events: Vec<_> = (0..33).map(|i| event(i, 1.2, Scope::new(), now)).collect();
        events.push(event(99, f64::NAN, Scope::new(), now));
        store.append_events(&events).unwrap();

        let report = miner(store.clone()).mine(now).unwrap();
        assert_eq!(report.events_rejected, 1);
        assert_eq!(store.lessons().unwrap()[0].n, 33);
    }

    #[test]
    fn test_store_failure_is_reported() {
        let miner = TrajectoryMiner::new(Arc::new(FailingStore::new()), LearningConfig::default());
        assert!(matches!(miner.mine(Utc::now()), Err(MinerError::Store(_))));
    }
}
