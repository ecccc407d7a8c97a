use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quality::{Quality, PASS_THRESHOLD};
use super::state::{LearnerId, ReviewState, StrategyKind, Subject};

pub const DEFAULT_INITIAL_EASINESS: f64 = 2.5;
pub const DEFAULT_MIN_EASINESS: f64 = 1.3;
pub const DEFAULT_MAX_INTERVAL: u32 = 365;
pub const DEFAULT_INITIAL_INTERVALS: [u32; 6] = [1, 3, 7, 10, 15, 30];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryCriteria {
    pub min_repetitions: u32,
    pub min_quality: Quality,
    pub min_interval: u32,
}

impl Default for MasteryCriteria {
    fn default() -> Self {
        Self {
            min_repetitions: 5,
            min_quality: Quality::CorrectHesitation,
            min_interval: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sm2Params {
    pub initial_easiness: f64,
    pub min_easiness: f64,
    /// Fixed intervals for the first passes, indexed by repetition count.
    pub initial_intervals: Vec<u32>,
    pub max_interval: u32,
    pub pass_threshold: u8,
    pub mastery: MasteryCriteria,
}

impl Default for Sm2Params {
    fn default() -> Self {
        Self {
            initial_easiness: DEFAULT_INITIAL_EASINESS,
            min_easiness: DEFAULT_MIN_EASINESS,
            initial_intervals: DEFAULT_INITIAL_INTERVALS.to_vec(),
            max_interval: DEFAULT_MAX_INTERVAL,
            pass_threshold: PASS_THRESHOLD,
            mastery: MasteryCriteria::default(),
        }
    }
}

/// SM-2 style adaptive updater.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdater {
    params: Sm2Params,
}

impl ProgressUpdater {
    pub fn new(params: Sm2Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Sm2Params {
        &self.params
    }

    pub fn initial_state(&self, learner_id: LearnerId, subject: Subject, now: DateTime<Utc>) -> ReviewState {
        ReviewState::new(
            learner_id,
            subject,
            StrategyKind::Adaptive,
            self.params.initial_easiness,
            now,
        )
    }

    pub fn next_easiness(&self, easiness: f64, quality: Quality) -> f64 {
        let miss = 5.0 - f64::from(quality.value());
        let next = easiness + (0.1 - miss * (0.08 + miss * 0.02));
        next.max(self.params.min_easiness)
    }

    /// Folds one graded review into `state`.
    ///
    /// A failed review resets the streak and brings the item back tomorrow,
    /// but keeps `repetition_count`: the count records how many cycles were
    /// completed and is not rewound.
    pub fn update(&self, state: &ReviewState, quality: Quality, now: DateTime<Utc>) -> ReviewState {
        let mut next = state.clone();
        next.easiness_factor = self.next_easiness(state.easiness_factor, quality);
        next.last_quality = Some(quality);

        let interval = if quality.passed(self.params.pass_threshold) {
            next.consecutive_correct = state.consecutive_correct.saturating_add(1);
            let interval = self.pass_interval(state, next.easiness_factor);
            next.repetition_count = state.repetition_count.saturating_add(1);
            interval
        } else {
            next.consecutive_correct = 0;
            1
        };

        next.reschedule(interval, now);
        next.mastered = self.is_mastered(&next);
        next
    }

    pub fn is_mastered(&self, state: &ReviewState) -> bool {
        let criteria = &self.params.mastery;
        state.repetition_count >= criteria.min_repetitions
            && state.last_quality.is_some_and(|q| q >= criteria.min_quality)
            && state.interval_days >= criteria.min_interval
    }

    fn pass_interval(&self, state: &ReviewState, easiness: f64) -> u32 {
        let ladder = &self.params.initial_intervals;
        let raw = match ladder.get(state.repetition_count as usize) {
            Some(days) => f64::from(*days),
            None => (f64::from(state.interval_days) * easiness).round(),
        };
        self.clamp_interval(raw)
    }

    fn clamp_interval(&self, days: f64) -> u32 {
        let max = self.params.max_interval.max(1);
        if !days.is_finite() || days < 1.0 {
            return 1;
        }
        if days >= f64::from(max) {
            return max;
        }
        days as u32
    }
}
