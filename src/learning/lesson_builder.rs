//! Lesson Builder
//!
//! Turns one slice of trade-action events into a `Lesson`, and a lesson into
//! an actionable `PmOverride` when its evidence points one way.
//!
//! Asymmetric edge weights losses more heavily than gains:
//!
//! ```text
//! edge = mean( gain_i - ASYMMETRY_RATIO · loss_i )   measured from rr_baseline
//! ```
//!
//! Overrides come from action density: how many actions of this kind a
//! trade carried. If failed trades carry noticeably more of them than
//! successful ones, the ladder is spread; the reverse tightens it.

use chrono::{DateTime, Utc};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::collections::HashMap;

use crate::domain::{
    ActionCategory, Lesson, LessonStats, PatternTradeEvent, PmOverride, Scope, TuningDirection,
    TuningParams,
};
use crate::learning::params::LearningConfig;

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Builds lessons and overrides from event slices
#[derive(Debug, Clone)]
pub struct LessonBuilder {
    config: LearningConfig,
}

impl LessonBuilder {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Aggregate statistics over a slice. `events` must not be empty.
    pub fn compute_stats(&self, events: &[&PatternTradeEvent]) -> LessonStats {
        let baseline = self.config.rr_baseline;
        let rrs: Vec<f64> = events.iter().map(|e| e.rr).collect();

        let mean_rr = finite_or_zero(rrs.iter().mean());
        let std_rr = if rrs.len() > 1 {
            finite_or_zero(rrs.iter().std_dev())
        } else {
            0.0
        };
        let median_rr = finite_or_zero(Data::new(rrs.clone()).median());

        let wins = rrs.iter().filter(|rr| **rr > baseline).count();
        let win_rate = if rrs.is_empty() {
            0.0
        } else {
            wins as f64 / rrs.len() as f64
        };

        let asymmetric_edge = finite_or_zero(
            rrs.iter()
                .map(|rr| {
                    let delta = rr - baseline;
                    if delta >= 0.0 {
                        delta
                    } else {
                        delta * self.config.asymmetry_ratio
                    }
                })
                .mean(),
        );

        let (density_failures, density_successes) = self.action_densities(events);

        LessonStats {
            mean_rr,
            std_rr,
            median_rr,
            win_rate,
            asymmetric_edge,
            density_failures,
            density_successes,
        }
    }

    /// Mean actions per trade among failed and successful trades
    fn action_densities(&self, events: &[&PatternTradeEvent]) -> (Option<f64>, Option<f64>) {
        let mut per_trade: HashMap<&str, (usize, f64)> = HashMap::new();
        for event in events {
            per_trade
                .entry(event.trade_id.as_str())
                .or_insert((0, event.rr))
                .0 += 1;
        }

        let mut failures = Vec::new();
        let mut successes = Vec::new();
        for (count, rr) in per_trade.into_values() {
            if rr > self.config.rr_baseline {
                successes.push(count as f64);
            } else {
                failures.push(count as f64);
            }
        }

        let mean_of = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                Some(finite_or_zero(values.iter().mean()))
            }
        };

        (mean_of(failures), mean_of(successes))
    }

    /// Lesson for a slice, or `None` when the slice is below the minimum sample
    pub fn build_lesson(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
        scope_subset: Scope,
        events: &[&PatternTradeEvent],
        now: DateTime<Utc>,
    ) -> Option<Lesson> {
        let n = events.len();
        if n == 0 || n < self.config.n_min {
            return None;
        }

        let mut trades: Vec<&str> = events.iter().map(|e| e.trade_id.as_str()).collect();
        trades.sort_unstable();
        trades.dedup();

        Some(Lesson {
            pattern_key: pattern_key.to_string(),
            action_category,
            scope_subset,
            n,
            trade_count: trades.len(),
            stats: self.compute_stats(events),
            confidence: self.config.confidence_for(n),
            mined_at: now,
        })
    }

    /// Tuning override implied by a lesson, if its evidence is actionable
    pub fn derive_override(&self, lesson: &Lesson) -> Option<PmOverride> {
        let config = &self.config;
        let stats = &lesson.stats;

        let (failures, successes) = (stats.density_failures?, stats.density_successes?);
        if successes <= 0.0 {
            return None;
        }
        if stats.asymmetric_edge.abs() < config.min_actionable_edge {
            return None;
        }

        let ratio = failures / successes;
        let direction = if ratio > 1.0 + config.density_margin {
            TuningDirection::Spread
        } else if ratio < 1.0 - config.density_margin {
            TuningDirection::Tighten
        } else {
            return None;
        };

        let magnitude = (ratio - 1.0).abs().min(1.0) * config.max_ladder_delta * lesson.confidence;
        let ladder_spacing_delta = match direction {
            TuningDirection::Spread => magnitude,
            TuningDirection::Tighten => -magnitude,
        };
        let size_delta = (stats.asymmetric_edge * config.size_sensitivity)
            .clamp(-config.max_size_delta, config.max_size_delta)
            * lesson.confidence;

        Some(PmOverride {
            pattern_key: lesson.pattern_key.clone(),
            action_category: lesson.action_category,
            scope_subset: lesson.scope_subset.clone(),
            tuning: TuningParams {
                direction,
                ladder_spacing_delta,
                size_delta,
            },
            confidence: lesson.confidence,
            n: lesson.n,
            mined_at: lesson.mined_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn event(trade_id: &str, rr: f64) -> PatternTradeEvent {
        PatternTradeEvent {
            trade_id: trade_id.to_string(),
            pattern_key: "dip".to_string(),
            action_category: ActionCategory::Add,
            scope: Scope::new(),
            rr,
            timestamp: Utc::now(),
        }
    }

    fn builder() -> LessonBuilder {
        LessonBuilder::new(LearningConfig::default().with_sample_thresholds(4, 8))
    }

    #[test]
    fn test_compute_stats() {
        let events = [event("a", 2.0), event("b", 0.0), event("c", 1.5), event("d", 0.5)];
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let stats = builder().compute_stats(&refs);

        assert_relative_eq!(stats.mean_rr, 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.median_rr, 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.win_rate, 0.5, epsilon = 1e-12);
        // gains 1.0 + 0.5, losses 1.0 + 0.5 at 1.69x
        assert_relative_eq!(stats.asymmetric_edge, (1.5 - 1.69 * 1.5) / 4.0, epsilon = 1e-12);
        assert!(stats.std_rr > 0.0);
    }

    #[test]
    fn test_single_event_stats_are_finite() {
        let events = [event("a", 1.2)];
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let stats = builder().compute_stats(&refs);
        assert_eq!(stats.std_rr, 0.0);
        assert_relative_eq!(stats.median_rr, 1.2);
        assert_eq!(stats.density_failures, None);
        assert_eq!(stats.density_successes, Some(1.0));
    }

    #[test]
    fn test_build_lesson_respects_minimum() {
        let builder = builder();
        let events: Vec<PatternTradeEvent> = (0..3).map(|i| event(&i.to_string(), 1.0)).collect();
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        assert!(builder
            .build_lesson("dip", ActionCategory::Add, Scope::new(), &refs, Utc::now())
            .is_none());

        let events: Vec<PatternTradeEvent> = (0..6).map(|i| event(&(i / 2).to_string(), 1.0)).collect();
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let lesson = builder
            .build_lesson("dip", ActionCategory::Add, Scope::new(), &refs, Utc::now())
            .unwrap();
        assert_eq!(lesson.n, 6);
        assert_eq!(lesson.trade_count, 3);
        assert_relative_eq!(lesson.confidence, 0.75);
    }

    #[test]
    fn test_override_spreads_when_failures_are_dense() {
        let builder = builder();
        // Losing trades added three times, winners once
        let mut events = Vec::new();
        for t in 0..4 {
            for _ in 0..3 {
                events.push(event(&format!("loss-{}", t), 0.2));
            }
            events.push(event(&format!("win-{}", t), 1.5));
        }
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let lesson = builder
            .build_lesson("dip", ActionCategory::Add, Scope::new(), &refs, Utc::now())
            .unwrap();

        let pm = builder.derive_override(&lesson).unwrap();
        assert_eq!(pm.tuning.direction, TuningDirection::Spread);
        assert!(pm.tuning.ladder_spacing_delta > 0.0);
        assert!(pm.tuning.ladder_spacing_delta <= 0.25);
        // Negative edge shrinks size
        assert!(pm.tuning.size_delta < 0.0);
        assert_eq!(pm.key(), lesson.key());
    }

    #[test]
    fn test_override_tightens_when_successes_are_dense() {
        let builder = builder();
        let mut events = Vec::new();
        for t in 0..4 {
            for _ in 0..3 {
                events.push(event(&format!("win-{}", t), 2.5));
            }
            events.push(event(&format!("loss-{}", t), 0.8));
        }
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let lesson = builder
            .build_lesson("dip", ActionCategory::Add, Scope::new(), &refs, Utc::now())
            .unwrap();

        let pm = builder.derive_override(&lesson).unwrap();
        assert_eq!(pm.tuning.direction, TuningDirection::Tighten);
        assert!(pm.tuning.ladder_spacing_delta < 0.0);
        assert!(pm.tuning.size_delta > 0.0);
    }

    #[test]
    fn test_no_override_without_contrast() {
        let builder = builder();
        let events: Vec<PatternTradeEvent> = (0..8)
            .map(|i| event(&i.to_string(), if i % 2 == 0 { 2.0 } else { 0.5 }))
            .collect();
        let refs: Vec<&PatternTradeEvent> = events.iter().collect();
        let lesson = builder
            .build_lesson("dip", ActionCategory::Add, Scope::new(), &refs, Utc::now())
            .unwrap();

        // Equal densities on both sides
        assert!(builder.derive_override(&lesson).is_none());
    }
}
