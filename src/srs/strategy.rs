use chrono::{DateTime, Utc};

use super::ladder::LadderUpdater;
use super::quality::Quality;
use super::sm2::ProgressUpdater;
use super::state::{LearnerId, ReviewState, StrategyKind, Subject};
use super::SrsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEvent {
    Graded(Quality),
    Completed,
}

impl ReviewEvent {
    fn name(self) -> &'static str {
        match self {
            ReviewEvent::Graded(_) => "graded",
            ReviewEvent::Completed => "completed",
        }
    }
}

/// Common seam for the adaptive and ladder schedulers.
pub trait UpdateStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn initial_state(&self, learner_id: LearnerId, subject: Subject, now: DateTime<Utc>) -> ReviewState;

    fn apply(
        &self,
        state: &ReviewState,
        event: ReviewEvent,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, SrsError>;
}

impl UpdateStrategy for ProgressUpdater {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Adaptive
    }

    fn initial_state(&self, learner_id: LearnerId, subject: Subject, now: DateTime<Utc>) -> ReviewState {
        ProgressUpdater::initial_state(self, learner_id, subject, now)
    }

    fn apply(
        &self,
        state: &ReviewState,
        event: ReviewEvent,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, SrsError> {
        match event {
            ReviewEvent::Graded(quality) => Ok(self.update(state, quality, now)),
            ReviewEvent::Completed => Err(SrsError::UnsupportedEvent {
                strategy: StrategyKind::Adaptive.as_str(),
                event: event.name(),
            }),
        }
    }
}

impl UpdateStrategy for LadderUpdater {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ladder
    }

    fn initial_state(&self, learner_id: LearnerId, subject: Subject, now: DateTime<Utc>) -> ReviewState {
        self.start(learner_id, subject, now)
    }

    fn apply(
        &self,
        state: &ReviewState,
        event: ReviewEvent,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, SrsError> {
        match event {
            ReviewEvent::Completed => Ok(self.advance(state, now)),
            ReviewEvent::Graded(_) => Err(SrsError::UnsupportedEvent {
                strategy: StrategyKind::Ladder.as_str(),
                event: event.name(),
            }),
        }
    }
}

/// The configured strategies, looked up by kind.
#[derive(Debug, Clone, Default)]
pub struct Strategies {
    adaptive: ProgressUpdater,
    ladder: LadderUpdater,
}

impl Strategies {
    pub fn new(adaptive: ProgressUpdater, ladder: LadderUpdater) -> Self {
        Self { adaptive, ladder }
    }

    pub fn adaptive(&self) -> &ProgressUpdater {
        &self.adaptive
    }

    pub fn ladder(&self) -> &LadderUpdater {
        &self.ladder
    }

    pub fn for_kind(&self, kind: StrategyKind) -> &dyn UpdateStrategy {
        match kind {
            StrategyKind::Adaptive => &self.adaptive,
            StrategyKind::Ladder => &self.ladder,
        }
    }

    /// Applies `event` to an existing state, or to a freshly created one on
    /// first exposure. An existing state keeps the strategy it was created with.
    pub fn apply(
        &self,
        learner_id: LearnerId,
        subject: Subject,
        current: Option<ReviewState>,
        event: ReviewEvent,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, SrsError> {
        let state = match current {
            Some(state) => state,
            None => self
                .for_kind(subject.default_strategy())
                .initial_state(learner_id, subject, now),
        };
        self.for_kind(state.strategy).apply(&state, event, now)
    }
}
