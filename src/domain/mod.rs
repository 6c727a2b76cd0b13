//! Domain Layer - Core types of the learning engine
//!
//! Pure types and functions with no storage or I/O concerns:
//! - `buckets`: continuous metric -> canonical bucket label
//! - `scope`: typed scope dimensions and entry contexts
//! - `decay`: exponential decay and decay-weighted running means
//! - `coefficient`: learned lever and interaction weights
//! - `event`: closed trades and their per-action fact rows
//! - `lesson`: mined lessons and the overrides derived from them

pub mod buckets;
pub mod scope;
pub mod decay;
pub mod coefficient;
pub mod event;
pub mod lesson;

pub use buckets::{bucket_for, normalize_label, Dimension};
pub use scope::{EntryContext, Scope, ScopeDimension};
pub use decay::{decay_weight, elapsed_days, DecayedMean};
pub use coefficient::{
    clamp_weight, InteractionPattern, LeverCoefficient, LeverKey, LeverScope, MAX_LEVER_WEIGHT,
    MIN_LEVER_WEIGHT, NEUTRAL_WEIGHT,
};
pub use event::{ActionCategory, ClosedTrade, PatternTradeEvent, TradeActionRecord};
pub use lesson::{Lesson, LessonKey, LessonStats, PmOverride, TuningDirection, TuningParams};
