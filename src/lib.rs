//! lever-learning - Adaptive Coefficient Learning Engine
//!
//! Converts closed-trade outcomes into confidence-weighted lever multipliers
//! and mined lessons that bias future sizing and gating decisions.
//!
//! # Modules
//!
//! - `domain`: Core types (buckets, scopes, decay, coefficients, events, lessons)
//! - `ports`: Store abstraction (`LearningStore`) and test doubles
//! - `learning`: Updater, reader, lesson builder and trajectory miner
//! - `adapters`: Store implementations (memory, JSON file) and CLI
//! - `config`: Configuration loading and validation
//! - `application`: Engine facade and mining scheduler

pub mod domain;
pub mod ports;
pub mod learning;
pub mod adapters;
pub mod config;
pub mod application;

pub use application::{LearningEngine, MiningScheduler};
pub use learning::{CoefficientReader, CoefficientUpdater, LearningConfig, TrajectoryMiner};
