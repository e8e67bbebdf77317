//! # srs-engine
//!
//! Adaptive interval scheduling for spaced repetition.
//!
//! ## Features
//!
//! - Rule-based default intervals (initial, forgotten, lengthening streaks)
//! - Pattern statistics mined from the whole collection's review history
//! - Learned wait recommendations with a reliability threshold and success-rate correction
//! - Pluggable wait strategies evaluated in order
//! - Review session state machine that reconciles against live collection edits

mod clock;
mod collection;
mod error;
mod interval;
mod models;
mod recommendation;
mod scheduler;
mod session;
mod settings;
mod statistics;
mod strategy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Collection, CollectionChange, MemoryCollection};
pub use error::{EngineError, EngineResult};
pub use interval::calculate_default_interval;
pub use models::{
    duration_to_minutes, minutes_to_duration, pattern_of, streak_number, trailing_successes, Item,
    ItemId, ReviewRecord, FAILURE, SUCCESS,
};
pub use recommendation::{
    corrected_minutes, correction_multiplier, AnalysisReport, RecommendationTable, ReportRow,
};
pub use scheduler::{CollectionOverview, ScheduleDecision, Scheduler};
pub use session::{ReviewSession, SessionState, SessionSummary};
pub use settings::{SessionOrder, Settings, SettingsBuilder};
pub use statistics::{median, PatternStats, StatisticsTables};
pub use strategy::{
    default_strategies, first_wait, ExactPattern, RuleDefault, StreakBucket, WaitQuery,
    WaitStrategy,
};
