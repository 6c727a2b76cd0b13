//! Mining Scheduler
//!
//! Runs the trajectory miner on a fixed interval until stopped. A failed
//! pass is logged and retried on the next tick.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

use super::engine::LearningEngine;
use crate::learning::MiningReport;

/// Default time between mining passes
pub const DEFAULT_MINING_INTERVAL: Duration = Duration::from_secs(3600);

/// Status snapshot of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub runs: u64,
    pub failures: u64,
    pub last_report: Option<MiningReport>,
}

/// Periodic mining loop
pub struct MiningScheduler {
    engine: Arc<LearningEngine>,
    interval: Duration,
    is_running: Arc<RwLock<bool>>,
    /// Set once by `stop`; never cleared
    stop_requested: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
    runs: Arc<RwLock<u64>>,
    failures: Arc<RwLock<u64>>,
    last_report: Arc<RwLock<Option<MiningReport>>>,
}

impl MiningScheduler {
    pub fn new(engine: Arc<LearningEngine>) -> Self {
        Self {
            engine,
            interval: DEFAULT_MINING_INTERVAL,
            is_running: Arc::new(RwLock::new(false)),
            stop_requested: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
            runs: Arc::new(RwLock::new(0)),
            failures: Arc::new(RwLock::new(0)),
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Set custom mining interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Mine until `stop` is called. Returns immediately if `stop` came first.
    pub async fn run(&self) {
        {
            let stop_requested = self.stop_requested.read().await;
            if *stop_requested {
                tracing::info!("Mining scheduler stopped before start");
                return;
            }
            *self.is_running.write().await = true;
        }

        tracing::info!("Starting mining scheduler - interval: {:?}", self.interval);

        while !*self.stop_requested.read().await {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        *self.is_running.write().await = false;
        tracing::info!("Mining scheduler stopped");
    }

    /// Execute one mining pass
    pub async fn tick(&self) -> Option<MiningReport> {
        match self.engine.mine(Utc::now()) {
            Ok(report) => {
                *self.runs.write().await += 1;
                *self.last_report.write().await = Some(report.clone());
                Some(report)
            }
            Err(e) => {
                *self.failures.write().await += 1;
                tracing::error!("Mining pass failed: {}", e);
                None
            }
        }
    }

    /// Stop the mining loop
    pub async fn stop(&self) {
        *self.stop_requested.write().await = true;
        self.shutdown.notify_one();
        tracing::info!("Stop signal sent to mining scheduler");
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: *self.is_running.read().await,
            runs: *self.runs.read().await,
            failures: *self.failures.read().await,
            last_report: self.last_report.read().await.clone(),
        }
    }
}
