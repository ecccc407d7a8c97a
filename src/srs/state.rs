use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::quality::Quality;

pub type LearnerId = i64;

/// What a review state tracks: a single word, or a whole topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Subject {
    Item(i64),
    Topic(i64),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Item(_) => "item",
            Subject::Topic(_) => "topic",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Subject::Item(id) | Subject::Topic(id) => *id,
        }
    }

    pub fn from_parts(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "item" => Some(Subject::Item(id)),
            "topic" => Some(Subject::Topic(id)),
            _ => None,
        }
    }

    /// Words are scheduled adaptively, topics follow the fixed ladder.
    pub fn default_strategy(&self) -> StrategyKind {
        match self {
            Subject::Item(_) => StrategyKind::Adaptive,
            Subject::Topic(_) => StrategyKind::Ladder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Adaptive,
    Ladder,
}

impl StrategyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Adaptive => "adaptive",
            StrategyKind::Ladder => "ladder",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "adaptive" => Some(StrategyKind::Adaptive),
            "ladder" => Some(StrategyKind::Ladder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReviewKey {
    pub learner_id: LearnerId,
    pub subject: Subject,
}

impl ReviewKey {
    pub fn new(learner_id: LearnerId, subject: Subject) -> Self {
        Self {
            learner_id,
            subject,
        }
    }
}

/// Durable scheduling memory for one learner and one subject.
///
/// `version` is the optimistic-concurrency token: the store accepts a write
/// only when it matches what is currently persisted (0 means "not yet
/// persisted").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub learner_id: LearnerId,
    pub subject: Subject,
    pub strategy: StrategyKind,
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetition_count: u32,
    pub consecutive_correct: u32,
    pub last_quality: Option<Quality>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_due_at: DateTime<Utc>,
    /// Ladder only: the currently scheduled stage has been worked through.
    pub completed: bool,
    pub mastered: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl ReviewState {
    pub fn new(
        learner_id: LearnerId,
        subject: Subject,
        strategy: StrategyKind,
        easiness_factor: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            learner_id,
            subject,
            strategy,
            easiness_factor,
            interval_days: 0,
            repetition_count: 0,
            consecutive_correct: 0,
            last_quality: None,
            last_reviewed_at: None,
            next_due_at: now,
            completed: false,
            mastered: false,
            version: 0,
            created_at: now,
        }
    }

    pub fn key(&self) -> ReviewKey {
        ReviewKey::new(self.learner_id, self.subject)
    }

    pub fn is_new(&self) -> bool {
        self.repetition_count == 0
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.strategy {
            StrategyKind::Adaptive => self.next_due_at <= now,
            StrategyKind::Ladder => !self.completed && self.next_due_at <= now,
        }
    }

    /// Stamps a review at `now` and schedules the next one `interval_days` later.
    pub(crate) fn reschedule(&mut self, interval_days: u32, now: DateTime<Utc>) {
        self.interval_days = interval_days;
        self.last_reviewed_at = Some(now);
        self.next_due_at = now + Duration::days(i64::from(interval_days));
    }
}
