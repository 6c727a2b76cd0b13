//! Learning Engine Integration Tests
//!
//! Integration tests that verify the learning components work together:
//! 1. Closed trade -> events + lever coefficients -> allocation multiplier
//! 2. Recorded events -> TrajectoryMiner -> lessons and overrides
//! 3. JSON store persistence across engine restarts
//!
//! All tests are deterministic (fixed clock, no network) and use in-memory or
//! temp-file stores.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::tempdir;

use lever_learning::adapters::{InMemoryStore, JsonFileStore};
use lever_learning::application::LearningEngine;
use lever_learning::domain::{
    bucket_for, ActionCategory, ClosedTrade, Dimension, EntryContext, LeverKey, LeverScope, Scope,
    ScopeDimension, TradeActionRecord, TuningDirection,
};
use lever_learning::learning::{LearningConfig, TIMEFRAME_LEVER};
use lever_learning::ports::{ConfigRow, FailingStore, LearningStore};

// ============================================================================
// Test Fixtures
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Entry context as the decision path would capture it
fn create_context(curator: &str, mcap_usd: f64, timeframe: &str) -> EntryContext {
    EntryContext::new()
        .with("curator", curator)
        .with("mcap_bucket", bucket_for(Dimension::MarketCap, mcap_usd).unwrap_or(""))
        .with("timeframe", timeframe)
}

/// Closed trade with an entry and `adds` add actions, all under one pattern
fn create_trade(
    id: &str,
    rr: f64,
    closed_at: DateTime<Utc>,
    context: EntryContext,
    scope: Scope,
    adds: usize,
) -> ClosedTrade {
    let mut actions = vec![TradeActionRecord {
        action_category: ActionCategory::Entry,
        pattern_key: "dip".to_string(),
        scope: scope.clone(),
        timestamp: None,
    }];
    for _ in 0..adds {
        actions.push(TradeActionRecord {
            action_category: ActionCategory::Add,
            pattern_key: "dip".to_string(),
            scope: scope.clone(),
            timestamp: None,
        });
    }

    ClosedTrade {
        trade_id: id.to_string(),
        closed_at,
        entry_context: context,
        rr,
        actions,
    }
}

fn create_engine(store: Arc<dyn LearningStore>) -> LearningEngine {
    LearningEngine::new(store, LearningConfig::default(), LeverScope::default()).unwrap()
}

// ============================================================================
// Coefficient Learning
// ============================================================================

#[test]
fn test_cold_start_is_neutral() {
    let engine = create_engine(Arc::new(InMemoryStore::new()));
    let reader = engine.reader();

    assert_eq!(reader.allocation_multiplier(&EntryContext::new()), 1.0);
    assert_eq!(
        reader.allocation_multiplier(&create_context("alpha", 2_000_000.0, "1h")),
        1.0
    );
    assert!(reader.timeframe_weights().values().all(|w| *w == 1.0));
}

#[test]
fn test_recent_trades_dominate_short_horizon() {
    let now = fixed_now();
    let store = Arc::new(InMemoryStore::new());
    let engine = create_engine(store.clone());
    let ctx = create_context("alpha", 2_000_000.0, "1h");

    for (i, (days_ago, rr)) in [(30, 1.5), (7, 2.0), (1, 1.0)].iter().enumerate() {
        let trade = create_trade(
            &format!("t-{}", i),
            *rr,
            now - Duration::days(*days_ago),
            ctx.clone(),
            Scope::new(),
            0,
        );
        engine.record_closed_trade(&trade, now).unwrap();
    }

    let coeff = store
        .lever(&LeverKey::new("dm", "global", "curator", "alpha"))
        .unwrap()
        .unwrap();
    assert_eq!(coeff.n, 3);
    assert!((coeff.rr_short - 1.0).abs() < (coeff.rr_long - 1.0).abs());
    assert!(coeff.weight >= 0.5 && coeff.weight <= 2.0);

    // Bucketed lever values are stored under their canonical label
    let mcap = store
        .lever(&LeverKey::new("dm", "global", "mcap_bucket", "1m-5m"))
        .unwrap();
    assert!(mcap.is_some());
}

#[test]
fn test_winning_context_sizes_up() {
    let now = fixed_now();
    let engine = create_engine(Arc::new(InMemoryStore::new()));
    let winner = create_context("alpha", 2_000_000.0, "1h");
    let loser = create_context("rugger", 50_000.0, "1m");

    for i in 0..30 {
        let at = now - Duration::hours(i);
        engine
            .record_closed_trade(&create_trade(&format!("w-{}", i), 2.5, at, winner.clone(), Scope::new(), 0), now)
            .unwrap();
        engine
            .record_closed_trade(&create_trade(&format!("l-{}", i), -1.0, at, loser.clone(), Scope::new(), 0), now)
            .unwrap();
    }

    let reader = engine.reader();
    let up = reader.allocation_multiplier(&winner);
    let down = reader.allocation_multiplier(&loser);
    assert!(up > 1.0, "winner multiplier {}", up);
    assert!(down < 1.0, "loser multiplier {}", down);
    assert!((0.5..=2.0).contains(&up));
    assert!((0.5..=2.0).contains(&down));

    let timeframes = reader.timeframe_weights();
    assert!(timeframes["1h"] > 1.0);
    assert!(timeframes["1m"] < 1.0);
    assert_eq!(timeframes["4h"], 1.0);
}

#[test]
fn test_unreachable_store_degrades_to_neutral() {
    let store = FailingStore::new();
    let engine = LearningEngine::new(
        Arc::new(store.clone()),
        LearningConfig::default(),
        LeverScope::default(),
    )
    .unwrap();

    let ctx = create_context("alpha", 2_000_000.0, "1h");
    assert_eq!(engine.reader().allocation_multiplier(&ctx), 1.0);
    assert!(engine
        .reader()
        .timeframe_weights()
        .values()
        .all(|w| *w == 1.0));

    // Recording surfaces the failure instead of silently dropping the trade
    let trade = create_trade("t-1", 1.5, fixed_now(), ctx, Scope::new(), 0);
    assert!(engine.record_closed_trade(&trade, fixed_now()).is_err());
}

// ============================================================================
// Trajectory Mining
// ============================================================================

#[test]
fn test_minimum_sample_boundary() {
    let now = fixed_now();

    for (count, expected) in [(32usize, 0usize), (33, 1)] {
        let store = Arc::new(InMemoryStore::new());
        let engine = create_engine(store.clone());
        for i in 0..count {
            let trade = create_trade(
                &format!("t-{}", i),
                1.2,
                now - Duration::hours(i as i64),
                EntryContext::new(),
                Scope::new(),
                0,
            );
            engine.record_closed_trade(&trade, now).unwrap();
        }

        engine.mine(now).unwrap();
        let lessons = store.lessons().unwrap();
        assert_eq!(lessons.len(), expected, "{} events", count);
        if let Some(lesson) = lessons.first() {
            assert_eq!(lesson.n, 33);
            assert_eq!(lesson.action_category, ActionCategory::Entry);
        }
    }
}

#[test]
fn test_dense_losing_adds_spread_the_ladder() {
    let now = fixed_now();
    let store = Arc::new(InMemoryStore::new());
    let engine = create_engine(store.clone());
    let solana = Scope::new()
        .with(ScopeDimension::Chain, "solana")
        .with(ScopeDimension::McapBucket, "1m-5m");

    // Losers average three adds, winners one
    for i in 0..30 {
        let at = now - Duration::days(i % 20);
        engine
            .record_closed_trade(&create_trade(&format!("l-{}", i), 0.3, at, EntryContext::new(), solana.clone(), 3), now)
            .unwrap();
        engine
            .record_closed_trade(&create_trade(&format!("w-{}", i), 1.8, at, EntryContext::new(), solana.clone(), 1), now)
            .unwrap();
    }

    let report = engine.mine(now).unwrap();
    assert!(report.lessons_written >= 2);
    assert!(report.overrides_written >= 1);

    let candidate = solana.clone().with(ScopeDimension::Timeframe, "1h");
    let pm = engine
        .reader()
        .best_override("dip", ActionCategory::Add, &candidate)
        .unwrap();
    assert_eq!(pm.tuning.direction, TuningDirection::Spread);
    assert!(pm.tuning.ladder_spacing_delta > 0.0);
    assert!(pm.confidence > 0.0 && pm.confidence <= 1.0);

    // Re-mining the same window changes nothing
    let before = store.lessons().unwrap();
    engine.mine(now).unwrap();
    assert_eq!(store.lessons().unwrap(), before);
}

#[test]
fn test_old_events_fall_out_of_lookback() {
    let now = fixed_now();
    let store = Arc::new(InMemoryStore::new());
    let engine = create_engine(store.clone());

    for i in 0..40 {
        let trade = create_trade(
            &format!("t-{}", i),
            1.4,
            now - Duration::days(120),
            EntryContext::new(),
            Scope::new(),
            0,
        );
        engine.record_closed_trade(&trade, now).unwrap();
    }

    let report = engine.mine(now).unwrap();
    assert_eq!(report.events_scanned, 0);
    assert!(store.lessons().unwrap().is_empty());
}

// ============================================================================
// Persistence & Configuration
// ============================================================================

#[test]
fn test_json_store_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("learning_store.json");
    let now = fixed_now();
    let ctx = create_context("alpha", 2_000_000.0, "4h");

    let multiplier = {
        let engine = create_engine(Arc::new(JsonFileStore::open(&path).unwrap()));
        for i in 0..10 {
            let trade = create_trade(&format!("t-{}", i), 2.0, now, ctx.clone(), Scope::new(), 1);
            engine.record_closed_trade(&trade, now).unwrap();
        }
        engine.reader().allocation_multiplier(&ctx)
    };
    assert!(multiplier > 1.0);

    let reopened = create_engine(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert_relative_eq!(
        reopened.reader().allocation_multiplier(&ctx),
        multiplier,
        epsilon = 1e-9
    );
    assert!(reopened.reader().timeframe_weights()["4h"] > 1.0);
    assert_eq!(reopened.status(now).unwrap().events_in_window, 20);
}

#[test]
fn test_persisted_overrides_change_behavior() {
    let store = Arc::new(InMemoryStore::new());
    store.put_config_row(ConfigRow::new("dm", "n_min", "5")).unwrap();
    store.put_config_row(ConfigRow::new("dm", "n_confident", "10")).unwrap();
    store
        .put_config_row(ConfigRow::new("dm", "lever_weight.timeframe", "0"))
        .unwrap();
    // Overrides for another module never leak
    store.put_config_row(ConfigRow::new("pm", "n_min", "1")).unwrap();

    let engine = create_engine(store.clone());
    assert_eq!(engine.config().n_min, 5);
    assert_eq!(engine.config().lever_base_weight(TIMEFRAME_LEVER), 0.0);

    let now = fixed_now();
    for i in 0..5 {
        let trade = create_trade(
            &format!("t-{}", i),
            3.0,
            now,
            create_context("alpha", 2_000_000.0, "1h"),
            Scope::new(),
            0,
        );
        engine.record_closed_trade(&trade, now).unwrap();
    }

    assert_eq!(engine.mine(now).unwrap().lessons_written, 1);
    // A zero base weight pins the lever to neutral
    assert_eq!(engine.reader().timeframe_weights()["1h"], 1.0);
}
