//! Coefficient Updater
//!
//! Folds each closed trade's R/R into the lever coefficients of its entry
//! context and into the interaction pattern of the full context.
//!
//! Every lever keeps two decay-weighted running means of R/R:
//! - short horizon (τ = 14d): reacts to regime changes
//! - long horizon (τ = 90d): stable baseline
//!
//! The served weight maps the blended R/R onto `[0.5, 2.0]`:
//!
//! ```text
//! blended = s·rr_short + (1-s)·rr_long
//! shrink  = mass_long / (mass_long + prior_strength)
//! weight  = 1 + base_weight · sensitivity · (blended - rr_baseline) · shrink
//! ```

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{
    clamp_weight, DecayedMean, EntryContext, InteractionPattern, LeverCoefficient, LeverKey,
    NEUTRAL_WEIGHT,
};
use crate::learning::params::LearningConfig;
use crate::ports::{LearningStore, StoreError};

/// Interaction key of a context with no populated levers
pub const EMPTY_INTERACTION_KEY: &str = "empty";

/// Updater error type
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Non-finite R/R {rr} for {target}")]
    NonFiniteRr { target: String, rr: f64 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Canonical, order-independent key for a set of lever values.
///
/// `lever=value` tokens sorted lexicographically and joined with `|`.
pub fn interaction_key(entry_context: &EntryContext) -> String {
    let mut tokens: Vec<String> = entry_context
        .populated()
        .map(|(lever, value)| format!("{}={}", lever, value))
        .collect();

    if tokens.is_empty() {
        return EMPTY_INTERACTION_KEY.to_string();
    }

    tokens.sort();
    tokens.join("|")
}

/// Map the two horizons of a coefficient onto a served weight
pub fn coefficient_weight(
    config: &LearningConfig,
    base_weight: f64,
    short: DecayedMean,
    long: DecayedMean,
) -> f64 {
    if short.is_empty() && long.is_empty() {
        return NEUTRAL_WEIGHT;
    }

    let share = config.short_share.clamp(0.0, 1.0);
    let blended = share * short.mean + (1.0 - share) * long.mean;

    let shrink = if config.prior_strength > 0.0 {
        long.mass / (long.mass + config.prior_strength)
    } else {
        1.0
    };

    let raw = NEUTRAL_WEIGHT
        + base_weight * config.sensitivity * (blended - config.rr_baseline) * shrink;
    clamp_weight(raw)
}

/// Pull a lever weight toward neutral when its interaction is strong.
///
/// Inside the neutral band the weight is returned unchanged. Outside it,
/// `fraction = strength·|iw - 1|` (capped at 1) of the lever's deviation is
/// removed. The result never crosses 1.0 and never moves away from it.
pub fn bleed_weight(original: f64, interaction_weight: f64, neutral_band: f64, strength: f64) -> f64 {
    if !original.is_finite() || !interaction_weight.is_finite() {
        return original;
    }

    let deviation = (interaction_weight - NEUTRAL_WEIGHT).abs();
    if deviation <= neutral_band {
        return original;
    }

    let fraction = (strength * deviation).clamp(0.0, 1.0);
    let adjusted = original + (NEUTRAL_WEIGHT - original) * fraction;

    let (low, high) = if original <= NEUTRAL_WEIGHT {
        (original, NEUTRAL_WEIGHT)
    } else {
        (NEUTRAL_WEIGHT, original)
    };
    adjusted.clamp(low, high)
}

/// Sole writer of lever coefficients and interaction patterns
pub struct CoefficientUpdater {
    store: Arc<dyn LearningStore>,
    config: LearningConfig,
}

impl CoefficientUpdater {
    pub fn new(store: Arc<dyn LearningStore>, config: LearningConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Fold one trade's R/R into a lever coefficient.
    ///
    /// `trade_time` sets how much the trade counts; `now` is the moment the
    /// update is applied.
    #[allow(clippy::too_many_arguments)]
    pub fn update_lever(
        &self,
        module: &str,
        scope: &str,
        name: &str,
        key: &str,
        trade_time: DateTime<Utc>,
        now: DateTime<Utc>,
        rr: f64,
    ) -> Result<LeverCoefficient, UpdateError> {
        let lever_key = LeverKey::new(module, scope, name, key);

        if !rr.is_finite() {
            tracing::warn!("Rejecting non-finite R/R {} for {}", rr, lever_key);
            return Err(UpdateError::NonFiniteRr {
                target: lever_key.to_string(),
                rr,
            });
        }

        let config = &self.config;
        let base_weight = config.lever_base_weight(name);

        let updated = self.store.modify_lever(&lever_key, &|current| {
            let previous = current
                .cloned()
                .unwrap_or_else(|| LeverCoefficient::neutral(&lever_key, now));

            let short = previous.short().observe(
                previous.updated_at,
                trade_time,
                now,
                rr,
                config.tau_short_days,
            );
            let long = previous.long().observe(
                previous.updated_at,
                trade_time,
                now,
                rr,
                config.tau_long_days,
            );

            LeverCoefficient {
                weight: coefficient_weight(config, base_weight, short, long),
                rr_short: short.mean,
                rr_long: long.mean,
                mass_short: short.mass,
                mass_long: long.mass,
                n: previous.n + 1,
                updated_at: previous.updated_at.max(now),
                last_trade_at: Some(
                    previous
                        .last_trade_at
                        .map_or(trade_time, |t| t.max(trade_time)),
                ),
                ..previous
            }
        })?;

        tracing::debug!(
            "Lever {} updated: weight={:.3} rr_short={:.3} rr_long={:.3} n={}",
            lever_key,
            updated.weight,
            updated.rr_short,
            updated.rr_long,
            updated.n
        );

        Ok(updated)
    }

    /// Fold one trade's R/R into the interaction pattern of its full context
    pub fn update_interaction(
        &self,
        entry_context: &EntryContext,
        trade_time: DateTime<Utc>,
        now: DateTime<Utc>,
        rr: f64,
    ) -> Result<InteractionPattern, UpdateError> {
        let key = interaction_key(entry_context);

        if !rr.is_finite() {
            tracing::warn!("Rejecting non-finite R/R {} for interaction {}", rr, key);
            return Err(UpdateError::NonFiniteRr { target: key, rr });
        }

        let config = &self.config;

        let updated = self.store.modify_interaction(&key, &|current| {
            let previous = current
                .cloned()
                .unwrap_or_else(|| InteractionPattern::neutral(&key, now));

            let short = previous.short().observe(
                previous.updated_at,
                trade_time,
                now,
                rr,
                config.tau_short_days,
            );
            let long = previous.long().observe(
                previous.updated_at,
                trade_time,
                now,
                rr,
                config.tau_long_days,
            );

            InteractionPattern {
                weight: coefficient_weight(config, NEUTRAL_WEIGHT, short, long),
                rr_short: short.mean,
                rr_long: long.mean,
                mass_short: short.mass,
                mass_long: long.mass,
                n: previous.n + 1,
                updated_at: previous.updated_at.max(now),
                ..previous
            }
        })?;

        tracing::debug!(
            "Interaction {} updated: weight={:.3} n={}",
            updated.interaction_key,
            updated.weight,
            updated.n
        );

        Ok(updated)
    }

    /// Lever weights of a context after bleeding toward neutral.
    ///
    /// Returns lever -> (value, adjusted weight) for every lever that has a
    /// stored coefficient. Empty when the interaction weight is inside the
    /// neutral band.
    pub fn importance_bleed(
        &self,
        module: &str,
        scope: &str,
        entry_context: &EntryContext,
        interaction_weight: f64,
    ) -> Result<BTreeMap<String, (String, f64)>, UpdateError> {
        let mut adjusted = BTreeMap::new();

        let deviation = (interaction_weight - NEUTRAL_WEIGHT).abs();
        if !deviation.is_finite() || deviation <= self.config.bleed_neutral_band {
            return Ok(adjusted);
        }

        for (lever, value) in entry_context.populated() {
            let key = LeverKey::new(module, scope, lever, value);
            if let Some(coefficient) = self.store.lever(&key)? {
                let weight = bleed_weight(
                    coefficient.weight,
                    interaction_weight,
                    self.config.bleed_neutral_band,
                    self.config.bleed_strength,
                );
                adjusted.insert(lever.to_string(), (value.to_string(), weight));
            }
        }

        Ok(adjusted)
    }
}
