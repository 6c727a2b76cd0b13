//! Learning Module
//!
//! Turns closed-trade outcomes into confidence-weighted multipliers and
//! mined lessons.
//!
//! Components:
//! - `params`: tunable constants and their override chain
//! - `updater`: folds trade R/R into lever and interaction coefficients
//! - `reader`: serves weights to the decision path, never fails
//! - `lesson_builder`: slice statistics and override derivation
//! - `miner`: periodic significance-gated slicing of trade events

pub mod params;
pub mod updater;
pub mod reader;
pub mod lesson_builder;
pub mod miner;

pub use params::{LearningConfig, LearningConfigError};
pub use updater::{
    bleed_weight, coefficient_weight, interaction_key, CoefficientUpdater, UpdateError,
    EMPTY_INTERACTION_KEY,
};
pub use reader::{normalize, CoefficientReader, TIMEFRAME_LEVER};
pub use lesson_builder::LessonBuilder;
pub use miner::{MinerError, MiningReport, TrajectoryMiner};
