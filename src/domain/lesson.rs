//! Mined Lessons and Overrides
//!
//! A `Lesson` summarizes one significance-gated slice of trade-action events.
//! A `PmOverride` is the actionable tuning delta derived from a lesson and
//! consumed by position management.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::ActionCategory;
use super::scope::Scope;

/// Identity of a lesson (and of the override derived from it)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LessonKey {
    pub pattern_key: String,
    pub action_category: ActionCategory,
    pub scope_subset: Scope,
}

impl LessonKey {
    pub fn new(pattern_key: &str, action_category: ActionCategory, scope_subset: Scope) -> Self {
        Self {
            pattern_key: pattern_key.to_string(),
            action_category,
            scope_subset,
        }
    }
}

impl fmt::Display for LessonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}]",
            self.pattern_key, self.action_category, self.scope_subset
        )
    }
}

/// Aggregate statistics over a slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonStats {
    pub mean_rr: f64,
    pub std_rr: f64,
    pub median_rr: f64,
    /// Fraction of events whose trade beat the R/R baseline
    pub win_rate: f64,
    /// Mean of gains minus asymmetry-weighted losses
    pub asymmetric_edge: f64,
    /// Mean actions-per-trade among failed trades
    pub density_failures: Option<f64>,
    /// Mean actions-per-trade among successful trades
    pub density_successes: Option<f64>,
}

/// A mined summary of one slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub pattern_key: String,
    pub action_category: ActionCategory,
    /// Exact dimension values defining the slice (empty = whole group)
    pub scope_subset: Scope,
    /// Number of events in the slice
    pub n: usize,
    /// Number of distinct trades in the slice
    pub trade_count: usize,
    pub stats: LessonStats,
    /// 0..=1, reaches 1 at the confident sample size
    pub confidence: f64,
    pub mined_at: DateTime<Utc>,
}

impl Lesson {
    pub fn key(&self) -> LessonKey {
        LessonKey::new(&self.pattern_key, self.action_category, self.scope_subset.clone())
    }
}

/// Which way to move the ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TuningDirection {
    /// Spread the ladder out (failures cluster on dense action sequences)
    Spread,
    /// Tighten the ladder (successes cluster on dense action sequences)
    Tighten,
}

impl fmt::Display for TuningDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuningDirection::Spread => write!(f, "spread"),
            TuningDirection::Tighten => write!(f, "tighten"),
        }
    }
}

/// Signed tuning deltas; positive ladder delta widens spacing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    pub direction: TuningDirection,
    pub ladder_spacing_delta: f64,
    pub size_delta: f64,
}

/// Actionable override for one pattern/action within a slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmOverride {
    pub pattern_key: String,
    pub action_category: ActionCategory,
    pub scope_subset: Scope,
    pub tuning: TuningParams,
    pub confidence: f64,
    pub n: usize,
    pub mined_at: DateTime<Utc>,
}

impl PmOverride {
    pub fn key(&self) -> LessonKey {
        LessonKey::new(&self.pattern_key, self.action_category, self.scope_subset.clone())
    }

    /// True when this override's slice covers the given scope
    pub fn applies_to(&self, scope: &Scope) -> bool {
        scope.contains(&self.scope_subset)
    }
}
