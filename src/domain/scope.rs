//! Scope and Entry Context
//!
//! Typed replacements for the loose string dictionaries that describe a trade:
//! - `Scope`: categorical dimensions of one trade action, used to slice events
//! - `EntryContext`: lever name -> value pairs captured when a trade was opened

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::buckets::{normalize_label, Dimension};

/// A categorical dimension an event can be sliced by
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScopeDimension {
    McapBucket,
    VolumeBucket,
    AgeBucket,
    CapVolumeBucket,
    Chain,
    Curator,
    Timeframe,
    /// Forward-compatible escape hatch for dimensions we don't know yet
    Other(String),
}

impl ScopeDimension {
    /// Known dimensions in enum order
    pub const KNOWN: [ScopeDimension; 7] = [
        ScopeDimension::McapBucket,
        ScopeDimension::VolumeBucket,
        ScopeDimension::AgeBucket,
        ScopeDimension::CapVolumeBucket,
        ScopeDimension::Chain,
        ScopeDimension::Curator,
        ScopeDimension::Timeframe,
    ];

    /// Parse a scope key; unknown keys become `Other`
    pub fn parse(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "mcap_bucket" | "mcap" => ScopeDimension::McapBucket,
            "vol_bucket" | "volume_bucket" | "volume" => ScopeDimension::VolumeBucket,
            "age_bucket" | "age" => ScopeDimension::AgeBucket,
            "mcap_vol_ratio_bucket" | "cap_volume_bucket" | "mcap_vol_ratio" => {
                ScopeDimension::CapVolumeBucket
            }
            "chain" => ScopeDimension::Chain,
            "curator" => ScopeDimension::Curator,
            "timeframe" | "tf" => ScopeDimension::Timeframe,
            other => ScopeDimension::Other(other.to_string()),
        }
    }

    /// Canonical key
    pub fn as_str(&self) -> &str {
        match self {
            ScopeDimension::McapBucket => "mcap_bucket",
            ScopeDimension::VolumeBucket => "vol_bucket",
            ScopeDimension::AgeBucket => "age_bucket",
            ScopeDimension::CapVolumeBucket => "mcap_vol_ratio_bucket",
            ScopeDimension::Chain => "chain",
            ScopeDimension::Curator => "curator",
            ScopeDimension::Timeframe => "timeframe",
            ScopeDimension::Other(key) => key,
        }
    }

    /// Bucket vocabulary backing this dimension, if any
    pub fn bucket_dimension(&self) -> Option<Dimension> {
        match self {
            ScopeDimension::McapBucket => Some(Dimension::MarketCap),
            ScopeDimension::VolumeBucket => Some(Dimension::Volume),
            ScopeDimension::AgeBucket => Some(Dimension::Age),
            ScopeDimension::CapVolumeBucket => Some(Dimension::CapVolumeRatio),
            _ => None,
        }
    }
}

impl From<String> for ScopeDimension {
    fn from(key: String) -> Self {
        ScopeDimension::parse(&key)
    }
}

impl From<ScopeDimension> for String {
    fn from(dim: ScopeDimension) -> Self {
        dim.as_str().to_string()
    }
}

impl fmt::Display for ScopeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categorical dimensions of one trade action
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(BTreeMap<ScopeDimension, String>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scope from loosely typed key/value pairs.
    ///
    /// Empty values are dropped (the dimension is treated as absent) and
    /// bucket dimensions are normalized to their canonical labels.
    pub fn from_raw<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut scope = Scope::new();
        for (key, value) in pairs {
            scope.insert(ScopeDimension::parse(key.as_ref()), value.as_ref());
        }
        scope
    }

    /// Re-apply normalization, e.g. after deserializing untrusted input
    pub fn normalized(&self) -> Scope {
        let mut scope = Scope::new();
        for (dim, value) in &self.0 {
            scope.insert(dim.clone(), value);
        }
        scope
    }

    /// Insert a value; empty values remove the dimension
    pub fn insert(&mut self, dimension: ScopeDimension, value: &str) {
        let value = match dimension.bucket_dimension() {
            Some(dim) => normalize_label(dim, Some(value)),
            None => Some(value.trim()).filter(|v| !v.is_empty()).map(str::to_string),
        };

        match value {
            Some(v) => {
                self.0.insert(dimension, v.trim().to_string());
            }
            None => {
                self.0.remove(&dimension);
            }
        }
    }

    /// Builder-style insert
    pub fn with(mut self, dimension: ScopeDimension, value: &str) -> Self {
        self.insert(dimension, value);
        self
    }

    /// Value of a dimension, ignoring blank entries
    pub fn get(&self, dimension: &ScopeDimension) -> Option<&str> {
        self.0
            .get(dimension)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &ScopeDimension> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScopeDimension, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every dimension of `subset` is present here with the same value
    pub fn contains(&self, subset: &Scope) -> bool {
        subset
            .0
            .iter()
            .all(|(dim, value)| self.get(dim) == Some(value.as_str()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "global");
        }
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Lever name -> categorical value captured at trade entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryContext(BTreeMap<String, String>);

impl EntryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, lever: &str, value: &str) -> Self {
        self.insert(lever, value);
        self
    }

    pub fn insert(&mut self, lever: &str, value: &str) {
        self.0.insert(lever.trim().to_string(), value.trim().to_string());
    }

    pub fn get(&self, lever: &str) -> Option<&str> {
        self.0.get(lever).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Levers with a non-empty name and value
    pub fn populated(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when no lever carries a value
    pub fn is_empty(&self) -> bool {
        self.populated().next().is_none()
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for EntryContext {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut ctx = EntryContext::new();
        for (k, v) in iter {
            ctx.insert(k.as_ref(), v.as_ref());
        }
        ctx
    }
}

impl From<HashMap<String, String>> for EntryContext {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_from_raw_normalizes_and_drops_empty() {
        let scope = Scope::from_raw([
            ("mcap_bucket", "500K-1M"),
            ("chain", " solana "),
            ("curator", ""),
            ("Whale_Count", "3"),
        ]);

        assert_eq!(scope.get(&ScopeDimension::McapBucket), Some("500k-1m"));
        assert_eq!(scope.get(&ScopeDimension::Chain), Some("solana"));
        assert_eq!(scope.get(&ScopeDimension::Curator), None);
        assert_eq!(
            scope.get(&ScopeDimension::Other("whale_count".to_string())),
            Some("3")
        );
        assert_eq!(scope.len(), 3);
    }

    #[test]
    fn test_scope_contains_subset() {
        let scope = Scope::new()
            .with(ScopeDimension::Chain, "base")
            .with(ScopeDimension::Timeframe, "1h");
        let subset = Scope::new().with(ScopeDimension::Chain, "base");
        let other = Scope::new().with(ScopeDimension::Chain, "solana");

        assert!(scope.contains(&subset));
        assert!(scope.contains(&Scope::new()));
        assert!(!scope.contains(&other));
        assert!(!subset.contains(&scope));
    }

    #[test]
    fn test_scope_serde_uses_string_keys() {
        let scope = Scope::new()
            .with(ScopeDimension::Curator, "alpha")
            .with(ScopeDimension::Other("lane".to_string()), "fast");
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, r#"{"curator":"alpha","lane":"fast"}"#);

        let back: Scope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scope);
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(Scope::new().to_string(), "global");
        let scope = Scope::new().with(ScopeDimension::Chain, "base");
        assert_eq!(scope.to_string(), "chain=base");
    }

    #[test]
    fn test_entry_context_populated() {
        let ctx = EntryContext::new()
            .with("curator", "alpha")
            .with("chain", "")
            .with(" timeframe ", "1h");

        let levers: Vec<_> = ctx.populated().collect();
        assert_eq!(levers, vec![("curator", "alpha"), ("timeframe", "1h")]);
        assert!(!ctx.is_empty());
        assert!(EntryContext::new().with("chain", "  ").is_empty());
    }
}
