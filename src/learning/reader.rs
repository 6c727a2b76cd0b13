//! Coefficient Reader
//!
//! Read-only view of learned state for the decision path. Called
//! synchronously for every candidate, so it never fails: an unreachable
//! store degrades every factor to neutral (cold start).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::{
    clamp_weight, ActionCategory, EntryContext, LeverKey, LeverScope, PmOverride, Scope,
    NEUTRAL_WEIGHT,
};
use crate::learning::params::LearningConfig;
use crate::learning::updater::{bleed_weight, interaction_key};
use crate::ports::LearningStore;

/// Name of the lever holding per-timeframe weights
pub const TIMEFRAME_LEVER: &str = "timeframe";

/// Scale a weight map so it sums to 1.0.
///
/// Negative or non-finite weights count as zero. When nothing positive
/// remains, the weight is split evenly. An empty map stays empty.
pub fn normalize(weights: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    if weights.is_empty() {
        return BTreeMap::new();
    }

    let cleaned: BTreeMap<String, f64> = weights
        .iter()
        .map(|(k, w)| {
            let w = if w.is_finite() && *w > 0.0 { *w } else { 0.0 };
            (k.clone(), w)
        })
        .collect();

    let total: f64 = cleaned.values().sum();
    if total <= 0.0 || !total.is_finite() {
        let share = 1.0 / cleaned.len() as f64;
        return cleaned.into_keys().map(|k| (k, share)).collect();
    }

    cleaned.into_iter().map(|(k, w)| (k, w / total)).collect()
}

/// Serves learned weights and overrides
pub struct CoefficientReader {
    store: Arc<dyn LearningStore>,
    config: LearningConfig,
    scope: LeverScope,
}

impl CoefficientReader {
    pub fn new(store: Arc<dyn LearningStore>, config: LearningConfig, scope: LeverScope) -> Self {
        Self {
            store,
            config,
            scope,
        }
    }

    pub fn scope(&self) -> &LeverScope {
        &self.scope
    }

    /// Stored weight of one lever value, 1.0 when unknown
    pub fn lever_weight(&self, module: &str, scope: &str, name: &str, key: &str) -> f64 {
        let lever_key = LeverKey::new(module, scope, name, key);
        match self.store.lever(&lever_key) {
            Ok(Some(coefficient)) => clamp_weight(coefficient.weight),
            Ok(None) => NEUTRAL_WEIGHT,
            Err(e) => {
                tracing::warn!("Lever {} unavailable, using neutral weight: {}", lever_key, e);
                NEUTRAL_WEIGHT
            }
        }
    }

    /// Position size multiplier for a candidate's entry context.
    ///
    /// Product of the clamped weights of every populated lever. When the
    /// full combination has been seen often enough, lever weights are first
    /// bled toward neutral and the interaction weight joins the product.
    pub fn allocation_multiplier(&self, entry_context: &EntryContext) -> f64 {
        if entry_context.is_empty() {
            tracing::warn!("Empty entry context, using neutral multiplier");
            return NEUTRAL_WEIGHT;
        }

        let interaction = self.interaction_weight(entry_context);

        let mut product = NEUTRAL_WEIGHT;
        for (lever, value) in entry_context.populated() {
            let weight = self.lever_weight(&self.scope.module, &self.scope.scope, lever, value);
            let weight = match interaction {
                Some(iw) => bleed_weight(
                    weight,
                    iw,
                    self.config.bleed_neutral_band,
                    self.config.bleed_strength,
                ),
                None => weight,
            };
            product *= weight;
        }

        if let Some(iw) = interaction {
            product *= iw;
        }

        let multiplier = clamp_weight(product);
        tracing::debug!(
            "Allocation multiplier for [{}]: {:.3}",
            interaction_key(entry_context),
            multiplier
        );
        multiplier
    }

    fn interaction_weight(&self, entry_context: &EntryContext) -> Option<f64> {
        let key = interaction_key(entry_context);
        match self.store.interaction(&key) {
            Ok(Some(pattern)) if pattern.n >= self.config.min_interaction_samples => {
                Some(clamp_weight(pattern.weight))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Interaction {} unavailable, ignoring: {}", key, e);
                None
            }
        }
    }

    /// Weight of every supported timeframe; unseen timeframes are neutral
    pub fn timeframe_weights(&self) -> BTreeMap<String, f64> {
        let mut weights: BTreeMap<String, f64> = self
            .config
            .supported_timeframes
            .iter()
            .map(|tf| (tf.clone(), NEUTRAL_WEIGHT))
            .collect();

        match self
            .store
            .levers_named(&self.scope.module, &self.scope.scope, TIMEFRAME_LEVER)
        {
            Ok(levers) => {
                for lever in levers {
                    if let Some(weight) = weights.get_mut(&lever.key) {
                        *weight = clamp_weight(lever.weight);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Timeframe weights unavailable, using neutral: {}", e);
            }
        }

        weights
    }

    /// Timeframe weights scaled to sum to 1.0
    pub fn timeframe_allocation(&self) -> BTreeMap<String, f64> {
        normalize(&self.timeframe_weights())
    }

    /// All overrides mined for a pattern/action
    pub fn active_overrides(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
    ) -> Vec<PmOverride> {
        match self.store.overrides_for(pattern_key, action_category) {
            Ok(overrides) => overrides,
            Err(e) => {
                tracing::warn!(
                    "Overrides for {}:{} unavailable: {}",
                    pattern_key,
                    action_category,
                    e
                );
                Vec::new()
            }
        }
    }

    /// Most specific override whose slice covers `scope`.
    ///
    /// Ties on specificity go to the more confident override.
    pub fn best_override(
        &self,
        pattern_key: &str,
        action_category: ActionCategory,
        scope: &Scope,
    ) -> Option<PmOverride> {
        self.active_overrides(pattern_key, action_category)
            .into_iter()
            .filter(|o| o.applies_to(scope))
            .max_by(|a, b| {
                a.scope_subset
                    .len()
                    .cmp(&b.scope_subset.len())
                    .then_with(|| a.confidence.total_cmp(&b.confidence))
                    .then_with(|| b.scope_subset.cmp(&a.scope_subset))
            })
    }
}
