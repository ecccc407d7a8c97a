//! Spaced-repetition scheduling engine.
//!
//! Everything in this module is pure: callers hand in the current state and
//! "now", and get the next state back. Persistence and delivery live in
//! `db` and `workers`.

pub mod due;
pub mod ladder;
pub mod quality;
pub mod sm2;
pub mod state;
pub mod strategy;

pub use due::{compare_priority, due_count, select_due};
pub use ladder::{LadderStage, LadderUpdater, DEFAULT_LADDER_OFFSETS};
pub use quality::{Feedback, Quality, PASS_THRESHOLD};
pub use sm2::{MasteryCriteria, ProgressUpdater, Sm2Params, DEFAULT_INITIAL_EASINESS};
pub use state::{LearnerId, ReviewKey, ReviewState, StrategyKind, Subject};
pub use strategy::{ReviewEvent, Strategies, UpdateStrategy};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SrsError {
    #[error("quality rating {0} is outside 0..=5")]
    InvalidQuality(i64),
    #[error("accuracy {0} is not a finite number")]
    InvalidAccuracy(f64),
    #[error("{strategy} strategy does not accept {event} events")]
    UnsupportedEvent {
        strategy: &'static str,
        event: &'static str,
    },
}
