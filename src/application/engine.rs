//! Learning Engine
//!
//! Entry point for the rest of the platform. Wires one store into the
//! updater, reader and miner, and turns each closed trade into fact rows and
//! coefficient updates.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::{ClosedTrade, InteractionPattern, LeverScope};
use crate::learning::{
    CoefficientReader, CoefficientUpdater, LearningConfig, LearningConfigError, MinerError,
    MiningReport, TrajectoryMiner, UpdateError,
};
use crate::ports::{LearningStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid trade {trade_id}: {reason}")]
    InvalidTrade { trade_id: String, reason: String },
    #[error("Invalid learning config: {0}")]
    Config(#[from] LearningConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Update error: {0}")]
    Update(#[from] UpdateError),
    #[error("Mining error: {0}")]
    Miner(#[from] MinerError),
}

/// What recording one trade changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    pub trade_id: String,
    pub events_appended: usize,
    pub levers_updated: usize,
    pub interaction: Option<InteractionPattern>,
}

/// Snapshot of learned state
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub module: String,
    pub scope: String,
    pub lookback_days: i64,
    pub events_in_window: usize,
    pub lessons: usize,
}

/// Updater, reader and miner over one store
pub struct LearningEngine {
    store: Arc<dyn LearningStore>,
    config: LearningConfig,
    lever_scope: LeverScope,
    updater: CoefficientUpdater,
    reader: CoefficientReader,
    miner: TrajectoryMiner,
}

impl LearningEngine {
    /// Create an engine. Persisted overrides for the scope's module are
    /// layered on top of `config`.
    pub fn new(
        store: Arc<dyn LearningStore>,
        config: LearningConfig,
        lever_scope: LeverScope,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let config = config.resolve(store.as_ref(), &lever_scope.module);

        tracing::info!(
            "Learning engine ready: module={} scope={} tau={}d/{}d n_min={}",
            lever_scope.module,
            lever_scope.scope,
            config.tau_short_days,
            config.tau_long_days,
            config.n_min
        );

        Ok(Self {
            updater: CoefficientUpdater::new(store.clone(), config.clone()),
            reader: CoefficientReader::new(store.clone(), config.clone(), lever_scope.clone()),
            miner: TrajectoryMiner::new(store.clone(), config.clone()),
            store,
            config,
            lever_scope,
        })
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn lever_scope(&self) -> &LeverScope {
        &self.lever_scope
    }

    pub fn store(&self) -> &Arc<dyn LearningStore> {
        &self.store
    }

    pub fn updater(&self) -> &CoefficientUpdater {
        &self.updater
    }

    pub fn reader(&self) -> &CoefficientReader {
        &self.reader
    }

    pub fn miner(&self) -> &TrajectoryMiner {
        &self.miner
    }

    /// Record a closed trade.
    ///
    /// Folds the trade's R/R into every populated lever of the entry context
    /// and into its interaction pattern, then appends one event per action.
    /// A trade with a non-finite R/R is rejected before anything is written.
    ///
    /// Each lever update commits on its own. After an error the coefficients
    /// may already hold part of the trade, so a failed call must not be
    /// retried blindly. Events are only written once every update succeeded,
    /// which keeps the mined facts free of duplicates.
    pub fn record_closed_trade(
        &self,
        trade: &ClosedTrade,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, EngineError> {
        if trade.trade_id.trim().is_empty() {
            return Err(EngineError::InvalidTrade {
                trade_id: trade.trade_id.clone(),
                reason: "empty trade id".to_string(),
            });
        }
        if !trade.rr.is_finite() {
            tracing::warn!("Rejecting trade {} with non-finite R/R {}", trade.trade_id, trade.rr);
            return Err(EngineError::InvalidTrade {
                trade_id: trade.trade_id.clone(),
                reason: format!("non-finite R/R {}", trade.rr),
            });
        }

        let mut levers_updated = 0;
        for (lever, value) in trade.entry_context.populated() {
            self.updater.update_lever(
                &self.lever_scope.module,
                &self.lever_scope.scope,
                lever,
                value,
                trade.closed_at,
                now,
                trade.rr,
            )?;
            levers_updated += 1;
        }

        let interaction = if trade.entry_context.is_empty() {
            None
        } else {
            Some(self.updater.update_interaction(
                &trade.entry_context,
                trade.closed_at,
                now,
                trade.rr,
            )?)
        };

        let mut events = trade.to_events();
        for event in &mut events {
            event.scope = event.scope.normalized();
        }
        if !events.is_empty() {
            self.store.append_events(&events)?;
        }

        tracing::info!(
            "Recorded trade {}: rr={:.2}, {} events, {} levers",
            trade.trade_id,
            trade.rr,
            events.len(),
            levers_updated
        );

        Ok(RecordOutcome {
            trade_id: trade.trade_id.clone(),
            events_appended: events.len(),
            levers_updated,
            interaction,
        })
    }

    /// Run one mining pass
    pub fn mine(&self, now: DateTime<Utc>) -> Result<MiningReport, EngineError> {
        Ok(self.miner.mine(now)?)
    }

    pub fn status(&self, now: DateTime<Utc>) -> Result<EngineStatus, EngineError> {
        let since = now - Duration::days(self.config.lookback_days);
        Ok(EngineStatus {
            module: self.lever_scope.module.clone(),
            scope: self.lever_scope.scope.clone(),
            lookback_days: self.config.lookback_days,
            events_in_window: self.store.events_since(since)?.len(),
            lessons: self.store.lessons()?.len(),
        })
    }
}
