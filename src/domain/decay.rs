//! Temporal Decay
//!
//! Exponential decay over unevenly spaced events:
//!
//! ```text
//! w(Δt) = exp(-Δt / τ)      Δt in days, clamped to >= 0
//! ```
//!
//! `DecayedMean` is the running estimate built on top of it. Each
//! observation is weighted by its decay at the time it is folded in, and the
//! accumulated mass is decayed forward between updates, so the final estimate
//! equals `Σ w_i·x_i / Σ w_i` with every `w_i` measured from the latest
//! update. Folding order therefore does not matter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in one day
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Smallest time constant accepted, in days
const MIN_TAU_DAYS: f64 = 1e-6;

/// Elapsed days from `earlier` to `later`, never negative
pub fn elapsed_days(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let millis = (later - earlier).num_milliseconds();
    (millis as f64 / 1000.0 / SECONDS_PER_DAY).max(0.0)
}

/// Decay weight of an event observed at `event_time`, seen from `now`.
///
/// Always in `(0, 1]`. Events in the future count as happening now.
pub fn decay_weight(event_time: DateTime<Utc>, now: DateTime<Utc>, tau_days: f64) -> f64 {
    let tau = if tau_days.is_finite() { tau_days.max(MIN_TAU_DAYS) } else { MIN_TAU_DAYS };
    let dt = elapsed_days(event_time, now);
    (-dt / tau).exp().clamp(f64::MIN_POSITIVE, 1.0)
}

/// Running decay-weighted mean of one horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayedMean {
    /// Current estimate
    pub mean: f64,
    /// Decayed total weight behind the estimate (0 = no observations)
    pub mass: f64,
}

impl DecayedMean {
    /// No observations yet
    pub const EMPTY: DecayedMean = DecayedMean { mean: 0.0, mass: 0.0 };

    pub fn new(mean: f64, mass: f64) -> Self {
        Self { mean, mass }
    }

    /// Mass remaining at `now` after decaying from `last_update`
    pub fn mass_at(&self, last_update: DateTime<Utc>, now: DateTime<Utc>, tau_days: f64) -> f64 {
        if self.mass <= 0.0 || !self.mass.is_finite() {
            return 0.0;
        }
        self.mass * decay_weight(last_update, now, tau_days)
    }

    /// Fold a new observation into the estimate.
    ///
    /// The blend is `mean*(1-α) + value*α` where `α` is the new observation's
    /// decay weight relative to the decayed mass already accumulated.
    pub fn observe(
        &self,
        last_update: DateTime<Utc>,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
        value: f64,
        tau_days: f64,
    ) -> DecayedMean {
        let prior_mass = self.mass_at(last_update, now, tau_days);
        let weight = decay_weight(observed_at, now, tau_days);
        let total = prior_mass + weight;

        let alpha = if prior_mass <= 0.0 { 1.0 } else { weight / total };
        let prior_mean = if self.mean.is_finite() { self.mean } else { value };
        let mean = prior_mean * (1.0 - alpha) + value * alpha;

        DecayedMean { mean, mass: total }
    }

    pub fn is_empty(&self) -> bool {
        self.mass <= 0.0
    }
}

impl Default for DecayedMean {
    fn default() -> Self {
        Self::EMPTY
    }
}
