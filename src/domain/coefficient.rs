//! Learned Coefficients
//!
//! Persistent weights produced by the coefficient updater:
//! - `LeverCoefficient`: strength of one categorical value of one lever
//! - `InteractionPattern`: strength of a full combination of lever values

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::decay::DecayedMean;

/// Neutral weight, meaning "no learned effect"
pub const NEUTRAL_WEIGHT: f64 = 1.0;

/// Lowest weight a lever can carry
pub const MIN_LEVER_WEIGHT: f64 = 0.5;

/// Highest weight a lever can carry
pub const MAX_LEVER_WEIGHT: f64 = 2.0;

/// Clamp a weight into the lever bounds; non-finite values become neutral
pub fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(MIN_LEVER_WEIGHT, MAX_LEVER_WEIGHT)
    } else {
        NEUTRAL_WEIGHT
    }
}

/// Module and scope a set of levers lives in (e.g. `dm` / `global`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeverScope {
    pub module: String,
    pub scope: String,
}

impl LeverScope {
    pub fn new(module: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            scope: scope.into(),
        }
    }

    /// Key for one lever value inside this scope
    pub fn key(&self, name: &str, key: &str) -> LeverKey {
        LeverKey::new(&self.module, &self.scope, name, key)
    }
}

impl Default for LeverScope {
    fn default() -> Self {
        Self::new("dm", "global")
    }
}

/// Identity of one lever coefficient
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeverKey {
    pub module: String,
    pub scope: String,
    pub name: String,
    pub key: String,
}

impl LeverKey {
    pub fn new(module: &str, scope: &str, name: &str, key: &str) -> Self {
        Self {
            module: module.to_string(),
            scope: scope.to_string(),
            name: name.to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Display for LeverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}={}", self.module, self.scope, self.name, self.key)
    }
}

/// Learned strength of one lever value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverCoefficient {
    pub module: String,
    pub scope: String,
    pub name: String,
    pub key: String,
    /// Multiplier served to callers, within [0.5, 2.0]
    pub weight: f64,
    /// Short-horizon decay-weighted R/R
    pub rr_short: f64,
    /// Long-horizon decay-weighted R/R
    pub rr_long: f64,
    /// Decayed observation mass behind `rr_short`
    #[serde(default)]
    pub mass_short: f64,
    /// Decayed observation mass behind `rr_long`
    #[serde(default)]
    pub mass_long: f64,
    /// Number of trades folded in
    pub n: u64,
    /// `now` of the latest update
    pub updated_at: DateTime<Utc>,
    /// Latest trade time seen
    #[serde(default)]
    pub last_trade_at: Option<DateTime<Utc>>,
}

impl LeverCoefficient {
    /// Cold-start coefficient (neutral, no observations)
    pub fn neutral(key: &LeverKey, now: DateTime<Utc>) -> Self {
        Self {
            module: key.module.clone(),
            scope: key.scope.clone(),
            name: key.name.clone(),
            key: key.key.clone(),
            weight: NEUTRAL_WEIGHT,
            rr_short: 0.0,
            rr_long: 0.0,
            mass_short: 0.0,
            mass_long: 0.0,
            n: 0,
            updated_at: now,
            last_trade_at: None,
        }
    }

    pub fn lever_key(&self) -> LeverKey {
        LeverKey::new(&self.module, &self.scope, &self.name, &self.key)
    }

    pub fn short(&self) -> DecayedMean {
        DecayedMean::new(self.rr_short, self.mass_short)
    }

    pub fn long(&self) -> DecayedMean {
        DecayedMean::new(self.rr_long, self.mass_long)
    }
}

/// Learned strength of a multi-lever combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionPattern {
    /// Canonical, order-independent key (see `interaction_key`)
    pub interaction_key: String,
    pub weight: f64,
    #[serde(default)]
    pub rr_short: f64,
    #[serde(default)]
    pub rr_long: f64,
    #[serde(default)]
    pub mass_short: f64,
    #[serde(default)]
    pub mass_long: f64,
    pub n: u64,
    pub updated_at: DateTime<Utc>,
}

impl InteractionPattern {
    pub fn neutral(interaction_key: &str, now: DateTime<Utc>) -> Self {
        Self {
            interaction_key: interaction_key.to_string(),
            weight: NEUTRAL_WEIGHT,
            rr_short: 0.0,
            rr_long: 0.0,
            mass_short: 0.0,
            mass_long: 0.0,
            n: 0,
            updated_at: now,
        }
    }

    pub fn short(&self) -> DecayedMean {
        DecayedMean::new(self.rr_short, self.mass_short)
    }

    pub fn long(&self) -> DecayedMean {
        DecayedMean::new(self.rr_long, self.mass_long)
    }
}
