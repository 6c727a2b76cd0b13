//! Learning Parameters
//!
//! Tunable constants for the updater, reader and miner.
//!
//! Resolution order: built-in defaults, then the `[learning]` table of the
//! config file, then per-module `ConfigRow`s from the store. Rows that fail to
//! parse are skipped; a row set that leaves the config invalid is ignored as a
//! whole.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::ScopeDimension;
use crate::ports::{ConfigRow, LearningStore};

/// Main learning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Short decay time constant in days
    pub tau_short_days: f64,
    /// Long decay time constant in days
    pub tau_long_days: f64,
    /// Minimum events for a slice to become a lesson
    pub n_min: usize,
    /// Events at which a lesson is fully confident
    pub n_confident: usize,
    /// Loss penalty relative to an equal-magnitude gain
    pub asymmetry_ratio: f64,
    /// Mining lookback window in days
    pub lookback_days: i64,
    /// R/R separating success from failure
    pub rr_baseline: f64,
    /// Weight change per unit of R/R above or below baseline
    pub sensitivity: f64,
    /// Share of the short horizon in the blended R/R (0..=1)
    pub short_share: f64,
    /// Pseudo-mass pulling thinly observed levers toward neutral
    pub prior_strength: f64,
    /// Interaction weights this close to 1.0 never bleed
    pub bleed_neutral_band: f64,
    /// Fraction of a lever's deviation removed per unit of interaction deviation
    pub bleed_strength: f64,
    /// Interaction samples needed before the reader trusts a pattern
    pub min_interaction_samples: u64,
    /// Importance of each lever; scales its learned deviation
    pub lever_base_weights: BTreeMap<String, f64>,
    /// Importance for levers missing from `lever_base_weights`
    pub default_lever_weight: f64,
    /// Mining priority per scope dimension; 0 disables slicing on it
    pub dimension_weights: BTreeMap<String, f64>,
    /// Priority for dimensions missing from `dimension_weights`
    pub default_dimension_weight: f64,
    /// Timeframes served by `timeframe_weights`
    pub supported_timeframes: Vec<String>,
    /// Maximum number of dimensions combined in one slice
    pub max_slice_depth: usize,
    /// Failure/success density ratio must leave 1 ± margin to act
    pub density_margin: f64,
    /// Minimum |asymmetric edge| for an override
    pub min_actionable_edge: f64,
    /// Largest ladder spacing delta an override can carry
    pub max_ladder_delta: f64,
    /// Size delta per unit of asymmetric edge
    pub size_sensitivity: f64,
    /// Largest size delta an override can carry
    pub max_size_delta: f64,
}

fn default_lever_base_weights() -> BTreeMap<String, f64> {
    [
        ("curator", 1.0),
        ("mcap_bucket", 0.8),
        ("timeframe", 0.8),
        ("chain", 0.6),
        ("vol_bucket", 0.6),
        ("age_bucket", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_dimension_weights() -> BTreeMap<String, f64> {
    [
        ("mcap_bucket", 1.0),
        ("curator", 0.9),
        ("chain", 0.8),
        ("timeframe", 0.7),
        ("vol_bucket", 0.6),
        ("age_bucket", 0.5),
        ("mcap_vol_ratio_bucket", 0.4),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            tau_short_days: 14.0,
            tau_long_days: 90.0,
            n_min: 33,
            n_confident: 124,
            asymmetry_ratio: 1.69,
            lookback_days: 90,
            rr_baseline: 1.0,
            sensitivity: 0.5,
            short_share: 0.5,
            prior_strength: 3.0,
            bleed_neutral_band: 0.1,
            bleed_strength: 1.0,
            min_interaction_samples: 5,
            lever_base_weights: default_lever_base_weights(),
            default_lever_weight: 1.0,
            dimension_weights: default_dimension_weights(),
            default_dimension_weight: 0.3,
            supported_timeframes: ["1m", "5m", "15m", "1h", "4h", "1d"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_slice_depth: 3,
            density_margin: 0.15,
            min_actionable_edge: 0.05,
            max_ladder_delta: 0.25,
            size_sensitivity: 0.2,
            max_size_delta: 0.25,
        }
    }
}

impl LearningConfig {
    /// Set both decay time constants
    pub fn with_taus(mut self, tau_short_days: f64, tau_long_days: f64) -> Self {
        self.tau_short_days = tau_short_days;
        self.tau_long_days = tau_long_days;
        self
    }

    /// Set the lesson sample thresholds
    pub fn with_sample_thresholds(mut self, n_min: usize, n_confident: usize) -> Self {
        self.n_min = n_min;
        self.n_confident = n_confident;
        self
    }

    /// Set the mining lookback window
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    /// Importance of a lever
    pub fn lever_base_weight(&self, lever: &str) -> f64 {
        self.lever_base_weights
            .get(lever)
            .copied()
            .unwrap_or(self.default_lever_weight)
    }

    /// Mining priority of a scope dimension
    pub fn dimension_weight(&self, dimension: &ScopeDimension) -> f64 {
        self.dimension_weights
            .get(dimension.as_str())
            .copied()
            .unwrap_or(self.default_dimension_weight)
    }

    /// Lesson confidence for a slice of `n` events
    pub fn confidence_for(&self, n: usize) -> f64 {
        if self.n_confident == 0 {
            return 1.0;
        }
        (n as f64 / self.n_confident as f64).min(1.0)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), LearningConfigError> {
        if !(self.tau_short_days > 0.0) || !self.tau_short_days.is_finite() {
            return Err(LearningConfigError::InvalidTau(self.tau_short_days));
        }
        if !(self.tau_long_days > 0.0) || !self.tau_long_days.is_finite() {
            return Err(LearningConfigError::InvalidTau(self.tau_long_days));
        }
        if self.tau_long_days < self.tau_short_days {
            return Err(LearningConfigError::HorizonOrder(
                self.tau_short_days,
                self.tau_long_days,
            ));
        }
        if self.n_min == 0 || self.n_confident < self.n_min {
            return Err(LearningConfigError::InvalidSampleThresholds(
                self.n_min,
                self.n_confident,
            ));
        }
        if !(self.asymmetry_ratio >= 1.0) {
            return Err(LearningConfigError::InvalidAsymmetry(self.asymmetry_ratio));
        }
        if self.lookback_days <= 0 {
            return Err(LearningConfigError::InvalidLookback(self.lookback_days));
        }
        if !(0.0..=1.0).contains(&self.short_share) {
            return Err(LearningConfigError::OutOfRange("short_share", self.short_share));
        }
        if !(0.0..=1.0).contains(&self.bleed_neutral_band) {
            return Err(LearningConfigError::OutOfRange(
                "bleed_neutral_band",
                self.bleed_neutral_band,
            ));
        }
        for (name, value) in [
            ("sensitivity", self.sensitivity),
            ("prior_strength", self.prior_strength),
            ("bleed_strength", self.bleed_strength),
            ("default_lever_weight", self.default_lever_weight),
            ("default_dimension_weight", self.default_dimension_weight),
            ("density_margin", self.density_margin),
            ("min_actionable_edge", self.min_actionable_edge),
            ("max_ladder_delta", self.max_ladder_delta),
            ("size_sensitivity", self.size_sensitivity),
            ("max_size_delta", self.max_size_delta),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(LearningConfigError::OutOfRange(name, value));
            }
        }
        for (lever, weight) in self
            .lever_base_weights
            .iter()
            .chain(self.dimension_weights.iter())
        {
            if !(*weight >= 0.0) || !weight.is_finite() {
                return Err(LearningConfigError::InvalidNamedWeight(lever.clone(), *weight));
            }
        }
        if self.max_slice_depth == 0 {
            return Err(LearningConfigError::InvalidSliceDepth);
        }
        Ok(())
    }

    /// Apply one `key = value` override
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), LearningConfigError> {
        let key = key.trim();
        let value = value.trim();

        if let Some(lever) = key.strip_prefix("lever_weight.") {
            self.lever_base_weights
                .insert(lever.to_string(), parse_value(key, value)?);
            return Ok(());
        }
        if let Some(dim) = key.strip_prefix("dimension_weight.") {
            let dim = ScopeDimension::parse(dim);
            self.dimension_weights
                .insert(dim.as_str().to_string(), parse_value(key, value)?);
            return Ok(());
        }

        match key {
            "tau_short_days" => self.tau_short_days = parse_value(key, value)?,
            "tau_long_days" => self.tau_long_days = parse_value(key, value)?,
            "n_min" => self.n_min = parse_value(key, value)?,
            "n_confident" => self.n_confident = parse_value(key, value)?,
            "asymmetry_ratio" => self.asymmetry_ratio = parse_value(key, value)?,
            "lookback_days" => self.lookback_days = parse_value(key, value)?,
            "rr_baseline" => self.rr_baseline = parse_value(key, value)?,
            "sensitivity" => self.sensitivity = parse_value(key, value)?,
            "short_share" => self.short_share = parse_value(key, value)?,
            "prior_strength" => self.prior_strength = parse_value(key, value)?,
            "bleed_neutral_band" => self.bleed_neutral_band = parse_value(key, value)?,
            "bleed_strength" => self.bleed_strength = parse_value(key, value)?,
            "min_interaction_samples" => self.min_interaction_samples = parse_value(key, value)?,
            "default_lever_weight" => self.default_lever_weight = parse_value(key, value)?,
            "default_dimension_weight" => self.default_dimension_weight = parse_value(key, value)?,
            "max_slice_depth" => self.max_slice_depth = parse_value(key, value)?,
            "density_margin" => self.density_margin = parse_value(key, value)?,
            "min_actionable_edge" => self.min_actionable_edge = parse_value(key, value)?,
            "max_ladder_delta" => self.max_ladder_delta = parse_value(key, value)?,
            "size_sensitivity" => self.size_sensitivity = parse_value(key, value)?,
            "max_size_delta" => self.max_size_delta = parse_value(key, value)?,
            "supported_timeframes" => {
                self.supported_timeframes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => return Err(LearningConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Layer persisted override rows on top of this config
    pub fn with_overrides(&self, rows: &[ConfigRow]) -> LearningConfig {
        let mut layered = self.clone();
        for row in rows {
            if let Err(e) = layered.apply(&row.key, &row.value) {
                tracing::warn!("Ignoring learning override {}.{}: {}", row.module, row.key, e);
            }
        }

        match layered.validate() {
            Ok(()) => layered,
            Err(e) => {
                tracing::warn!("Learning overrides rejected, keeping previous config: {}", e);
                self.clone()
            }
        }
    }

    /// Resolve the effective config for `module` from the store.
    ///
    /// A store failure leaves `self` unchanged.
    pub fn resolve(&self, store: &dyn LearningStore, module: &str) -> LearningConfig {
        match store.config_rows(module) {
            Ok(rows) if rows.is_empty() => self.clone(),
            Ok(rows) => {
                tracing::info!("Applying {} learning overrides for module '{}'", rows.len(), module);
                self.with_overrides(&rows)
            }
            Err(e) => {
                tracing::warn!("Could not read learning overrides for '{}': {}", module, e);
                self.clone()
            }
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LearningConfigError> {
    value
        .parse()
        .map_err(|_| LearningConfigError::UnparseableValue(key.to_string(), value.to_string()))
}

/// Learning configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LearningConfigError {
    #[error("Invalid decay time constant: {0} days (must be > 0)")]
    InvalidTau(f64),
    #[error("Short horizon {0}d must not exceed long horizon {1}d")]
    HorizonOrder(f64, f64),
    #[error("Invalid sample thresholds: n_min={0}, n_confident={1} (need 0 < n_min <= n_confident)")]
    InvalidSampleThresholds(usize, usize),
    #[error("Invalid asymmetry ratio: {0} (must be >= 1)")]
    InvalidAsymmetry(f64),
    #[error("Invalid lookback: {0} days (must be > 0)")]
    InvalidLookback(i64),
    #[error("Parameter {0} out of range: {1}")]
    OutOfRange(&'static str, f64),
    #[error("Invalid weight for '{0}': {1} (must be >= 0)")]
    InvalidNamedWeight(String, f64),
    #[error("max_slice_depth must be at least 1")]
    InvalidSliceDepth,
    #[error("Unknown learning parameter: {0}")]
    UnknownKey(String),
    #[error("Cannot parse '{1}' for {0}")]
    UnparseableValue(String, String),
}
