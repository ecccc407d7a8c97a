//! Persistence boundary for review states and learner profiles.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::srs::{LearnerId, ReviewKey, ReviewState, Subject};

pub use memory::MemoryStore;
pub use sqlite::{SqliteInitError, SqliteStore};

/// Which learners a tick asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourFilter {
    /// Learners whose preferred delivery hour is exactly this hour.
    Exact(u32),
    /// Every learner with reminders enabled.
    Any,
}

/// The slice of a learner's profile the scheduler reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerProfile {
    pub learner_id: LearnerId,
    pub reminders_enabled: bool,
    /// Preferred delivery hour, 0-23 in the scheduler's local offset.
    pub notification_hour: u32,
    /// Upper bound on items per delivery; 0 means no personal cap.
    pub max_per_day: u32,
}

impl LearnerProfile {
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            reminders_enabled: true,
            notification_hour: 9,
            max_per_day: 20,
        }
    }

    pub fn matches(&self, filter: HourFilter) -> bool {
        self.reminders_enabled
            && match filter {
                HourFilter::Exact(hour) => self.notification_hour == hour,
                HourFilter::Any => true,
            }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("version conflict for learner {learner_id} on {subject:?}: expected version {expected}")]
    Conflict {
        learner_id: LearnerId,
        subject: Subject,
        expected: u64,
    },
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn conflict(state: &ReviewState) -> Self {
        StoreError::Conflict {
            learner_id: state.learner_id,
            subject: state.subject,
            expected: state.version,
        }
    }
}

/// Storage contract.
///
/// `upsert` is a compare-and-set on `ReviewState::version`: it succeeds only
/// when the persisted version equals the incoming one (0 for a state that
/// must not exist yet) and returns the stored state with the version bumped.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn due_learners(&self, filter: HourFilter) -> Result<Vec<LearnerProfile>, StoreError>;

    async fn learner(&self, learner_id: LearnerId) -> Result<Option<LearnerProfile>, StoreError>;

    async fn save_learner(&self, profile: &LearnerProfile) -> Result<(), StoreError>;

    async fn review_states(&self, learner_id: LearnerId) -> Result<Vec<ReviewState>, StoreError>;

    async fn get(&self, key: ReviewKey) -> Result<Option<ReviewState>, StoreError>;

    async fn upsert(&self, state: &ReviewState) -> Result<ReviewState, StoreError>;
}
