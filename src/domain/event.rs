//! Trade Outcome Events
//!
//! A closed trade arrives from position management as a `ClosedTrade`. Each of
//! its actions (entry, adds, trims, exit) becomes one append-only
//! `PatternTradeEvent` row that carries the trade's final R/R.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::scope::{EntryContext, Scope};

/// Kind of action taken within a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Entry,
    Add,
    Trim,
    Exit,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 4] = [
        ActionCategory::Entry,
        ActionCategory::Add,
        ActionCategory::Trim,
        ActionCategory::Exit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Entry => "entry",
            ActionCategory::Add => "add",
            ActionCategory::Trim => "trim",
            ActionCategory::Exit => "exit",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(ActionCategory::Entry),
            "add" => Ok(ActionCategory::Add),
            "trim" => Ok(ActionCategory::Trim),
            "exit" => Ok(ActionCategory::Exit),
            other => Err(format!("unknown action category: {}", other)),
        }
    }
}

/// One action within a closed trade, as reported by position management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeActionRecord {
    pub action_category: ActionCategory,
    pub pattern_key: String,
    #[serde(default)]
    pub scope: Scope,
    /// When the action happened; defaults to the trade close time
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A fully closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub trade_id: String,
    pub closed_at: DateTime<Utc>,
    #[serde(default)]
    pub entry_context: EntryContext,
    /// Final risk/reward of the trade
    pub rr: f64,
    #[serde(default)]
    pub actions: Vec<TradeActionRecord>,
}

impl ClosedTrade {
    /// Fact rows for this trade, one per action
    pub fn to_events(&self) -> Vec<PatternTradeEvent> {
        self.actions
            .iter()
            .map(|action| PatternTradeEvent {
                trade_id: self.trade_id.clone(),
                pattern_key: action.pattern_key.clone(),
                action_category: action.action_category,
                scope: action.scope.clone(),
                rr: self.rr,
                timestamp: action.timestamp.unwrap_or(self.closed_at),
            })
            .collect()
    }
}

/// Append-only fact row: one action of one trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTradeEvent {
    pub trade_id: String,
    pub pattern_key: String,
    pub action_category: ActionCategory,
    #[serde(default)]
    pub scope: Scope,
    pub rr: f64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::ScopeDimension;
    use chrono::Duration;

    #[test]
    fn test_action_category_parse() {
        assert_eq!("Entry".parse::<ActionCategory>(), Ok(ActionCategory::Entry));
        assert_eq!(" trim ".parse::<ActionCategory>(), Ok(ActionCategory::Trim));
        assert!("hedge".parse::<ActionCategory>().is_err());
        for cat in ActionCategory::ALL {
            assert_eq!(cat.as_str().parse::<ActionCategory>(), Ok(cat));
        }
    }

    #[test]
    fn test_closed_trade_to_events() {
        let closed_at = Utc::now();
        let trade = ClosedTrade {
            trade_id: "t-1".to_string(),
            closed_at,
            entry_context: EntryContext::new().with("curator", "alpha"),
            rr: 1.8,
            actions: vec![
                TradeActionRecord {
                    action_category: ActionCategory::Entry,
                    pattern_key: "breakout".to_string(),
                    scope: Scope::new().with(ScopeDimension::Chain, "solana"),
                    timestamp: Some(closed_at - Duration::hours(5)),
                },
                TradeActionRecord {
                    action_category: ActionCategory::Exit,
                    pattern_key: "breakout".to_string(),
                    scope: Scope::new(),
                    timestamp: None,
                },
            ],
        };

        let events = trade.to_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.trade_id == "t-1" && e.rr == 1.8));
        assert_eq!(events[0].timestamp, closed_at - Duration::hours(5));
        assert_eq!(events[1].timestamp, closed_at);
        assert_eq!(events[1].action_category, ActionCategory::Exit);
    }

    #[test]
    fn test_closed_trade_from_json() {
        let json = r#"{
            "trade_id": "abc",
            "closed_at": "2026-01-05T12:00:00Z",
            "entry_context": {"curator": "alpha", "chain": "base"},
            "rr": 0.6,
            "actions": [
                {"action_category": "add", "pattern_key": "dip", "scope": {"mcap_bucket": "500k-1m"}}
            ]
        }"#;

        let trade: ClosedTrade = serde_json::from_str(json).unwrap();
        assert_eq!(trade.entry_context.get("chain"), Some("base"));
        assert_eq!(trade.actions[0].action_category, ActionCategory::Add);
        assert_eq!(
            trade.actions[0].scope.get(&ScopeDimension::McapBucket),
            Some("500k-1m")
        );
    }
}
