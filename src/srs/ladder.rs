use chrono::{DateTime, Utc};
use serde::Serialize;

use super::sm2::DEFAULT_INITIAL_EASINESS;
use super::state::{LearnerId, ReviewState, StrategyKind, Subject};

/// Day offsets between consecutive topic repetitions.
pub const DEFAULT_LADDER_OFFSETS: [u32; 7] = [1, 2, 3, 7, 15, 25, 40];

/// Where a topic sits on the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum LadderStage {
    Scheduled { repetition: u32 },
    Completed { repetition: u32 },
    Mastered,
}

/// Fixed-ladder updater for topic-level review.
///
/// `repetition_count` is the number of completed stages; the stage currently
/// scheduled is at index `repetition_count`. Completing the last stage is
/// terminal.
#[derive(Debug, Clone)]
pub struct LadderUpdater {
    offsets: Vec<u32>,
}

impl Default for LadderUpdater {
    fn default() -> Self {
        Self::new(DEFAULT_LADDER_OFFSETS.to_vec())
    }
}

impl LadderUpdater {
    pub fn new(offsets: Vec<u32>) -> Self {
        let offsets = if offsets.is_empty() {
            DEFAULT_LADDER_OFFSETS.to_vec()
        } else {
            offsets.into_iter().map(|days| days.max(1)).collect()
        };
        Self { offsets }
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn stages(&self) -> u32 {
        self.offsets.len() as u32
    }

    pub fn start(&self, learner_id: LearnerId, subject: Subject, now: DateTime<Utc>) -> ReviewState {
        let mut state = ReviewState::new(
            learner_id,
            subject,
            StrategyKind::Ladder,
            DEFAULT_INITIAL_EASINESS,
            now,
        );
        state.interval_days = self.offsets[0];
        state.next_due_at = now + chrono::Duration::days(i64::from(self.offsets[0]));
        state
    }

    /// Marks the scheduled stage done and schedules the next one.
    ///
    /// A mastered topic is returned unchanged.
    pub fn advance(&self, state: &ReviewState, now: DateTime<Utc>) -> ReviewState {
        if state.mastered {
            return state.clone();
        }

        let mut next = state.clone();
        let repetition = state.repetition_count.saturating_add(1);
        next.repetition_count = repetition;
        next.consecutive_correct = state.consecutive_correct.saturating_add(1);

        if repetition >= self.stages() {
            next.completed = true;
            next.mastered = true;
            next.reschedule(0, now);
            return next;
        }

        let last = self.offsets.len() - 1;
        let offset = self.offsets[(repetition as usize).min(last)];
        next.completed = false;
        next.reschedule(offset, now);
        next
    }

    pub fn stage(&self, state: &ReviewState) -> LadderStage {
        if state.mastered {
            LadderStage::Mastered
        } else if state.completed {
            LadderStage::Completed {
                repetition: state.repetition_count,
            }
        } else {
            LadderStage::Scheduled {
                repetition: state.repetition_count,
            }
        }
    }
}
