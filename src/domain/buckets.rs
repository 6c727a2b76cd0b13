//! Bucket Vocabulary
//!
//! Maps continuous token metrics onto canonical ordinal bucket labels so that
//! levers and scope dimensions can be learned categorically.
//!
//! Every dimension is a fixed, ordered list of half-open intervals
//! `[lower, upper)`; the last bucket is unbounded above. A value sitting
//! exactly on a boundary belongs to the upper bucket.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bucketable metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Market capitalization in USD
    MarketCap,
    /// Rolling 24h volume in USD
    Volume,
    /// Token age in days
    Age,
    /// Market cap divided by 24h volume
    CapVolumeRatio,
}

/// Lower bound and label of one bucket
struct Bucket {
    lower: f64,
    label: &'static str,
}

const MCAP_BUCKETS: &[Bucket] = &[
    Bucket { lower: 0.0, label: "0-100k" },
    Bucket { lower: 100_000.0, label: "100k-500k" },
    Bucket { lower: 500_000.0, label: "500k-1m" },
    Bucket { lower: 1_000_000.0, label: "1m-5m" },
    Bucket { lower: 5_000_000.0, label: "5m-25m" },
    Bucket { lower: 25_000_000.0, label: "25m-100m" },
    Bucket { lower: 100_000_000.0, label: "100m+" },
];

const VOLUME_BUCKETS: &[Bucket] = &[
    Bucket { lower: 0.0, label: "0-10k" },
    Bucket { lower: 10_000.0, label: "10k-50k" },
    Bucket { lower: 50_000.0, label: "50k-250k" },
    Bucket { lower: 250_000.0, label: "250k-1m" },
    Bucket { lower: 1_000_000.0, label: "1m-5m" },
    Bucket { lower: 5_000_000.0, label: "5m+" },
];

const AGE_BUCKETS: &[Bucket] = &[
    Bucket { lower: 0.0, label: "0-1d" },
    Bucket { lower: 1.0, label: "1-7d" },
    Bucket { lower: 7.0, label: "7-30d" },
    Bucket { lower: 30.0, label: "30-90d" },
    Bucket { lower: 90.0, label: "90-365d" },
    Bucket { lower: 365.0, label: "365d+" },
];

const CAP_VOLUME_BUCKETS: &[Bucket] = &[
    Bucket { lower: 0.0, label: "0-1" },
    Bucket { lower: 1.0, label: "1-5" },
    Bucket { lower: 5.0, label: "5-20" },
    Bucket { lower: 20.0, label: "20-100" },
    Bucket { lower: 100.0, label: "100+" },
];

impl Dimension {
    /// All bucketable dimensions
    pub const ALL: [Dimension; 4] = [
        Dimension::MarketCap,
        Dimension::Volume,
        Dimension::Age,
        Dimension::CapVolumeRatio,
    ];

    fn buckets(&self) -> &'static [Bucket] {
        match self {
            Dimension::MarketCap => MCAP_BUCKETS,
            Dimension::Volume => VOLUME_BUCKETS,
            Dimension::Age => AGE_BUCKETS,
            Dimension::CapVolumeRatio => CAP_VOLUME_BUCKETS,
        }
    }

    /// Canonical labels in ascending order
    pub fn labels(&self) -> Vec<&'static str> {
        self.buckets().iter().map(|b| b.label).collect()
    }

    /// Position of a canonical label within this dimension
    pub fn ordinal(&self, label: &str) -> Option<usize> {
        self.buckets()
            .iter()
            .position(|b| b.label.eq_ignore_ascii_case(label.trim()))
    }

    /// Short name used in config keys and CLI arguments
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::MarketCap => "mcap",
            Dimension::Volume => "volume",
            Dimension::Age => "age",
            Dimension::CapVolumeRatio => "mcap_vol_ratio",
        }
    }

    /// Parse a dimension name (accepts a few common aliases)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mcap" | "market_cap" | "marketcap" => Some(Dimension::MarketCap),
            "volume" | "vol" | "volume_24h" => Some(Dimension::Volume),
            "age" | "age_days" => Some(Dimension::Age),
            "mcap_vol_ratio" | "cap_volume_ratio" | "mcap_volume_ratio" => {
                Some(Dimension::CapVolumeRatio)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Map a numeric value to its bucket label.
///
/// Returns `None` for NaN, infinite or negative input, which cannot be
/// placed on any of the scales.
pub fn bucket_for(dimension: Dimension, value: f64) -> Option<&'static str> {
    if !value.is_finite() || value < 0.0 {
        tracing::warn!("Cannot bucket {} value {}", dimension, value);
        return None;
    }

    dimension
        .buckets()
        .iter()
        .rev()
        .find(|b| value >= b.lower)
        .map(|b| b.label)
}

/// Normalize a raw label to its canonical spelling.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Unrecognized labels come back unchanged; empty input maps to `None`.
pub fn normalize_label(dimension: Dimension, raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match dimension
        .buckets()
        .iter()
        .find(|b| b.label.eq_ignore_ascii_case(trimmed))
    {
        Some(bucket) => Some(bucket.label.to_string()),
        None => Some(raw.to_string()),
    }
}
