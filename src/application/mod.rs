pub mod engine;
pub mod scheduler;

pub use engine::{EngineError, EngineStatus, LearningEngine, RecordOutcome};
pub use scheduler::{MiningScheduler, SchedulerStatus, DEFAULT_MINING_INTERVAL};
