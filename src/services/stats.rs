use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::srs::{ReviewState, StrategyKind, DEFAULT_INITIAL_EASINESS};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub total_items: usize,
    /// Items due now or within the next 24 hours.
    pub due_today: usize,
    pub mastered_items: usize,
    pub average_easiness: f64,
    pub topics_started: usize,
    pub topic_stages_completed: u32,
    pub topics_mastered: usize,
    /// Completed ladder stages over all stages of started topics, 0.0-1.0.
    pub topic_progress: f64,
}

pub fn learner_stats(states: &[ReviewState], now: DateTime<Utc>, ladder_stages: u32) -> LearnerStats {
    let horizon = now + Duration::hours(24);
    let (items, topics): (Vec<&ReviewState>, Vec<&ReviewState>) = states
        .iter()
        .partition(|s| s.strategy == StrategyKind::Adaptive);

    let average_easiness = if items.is_empty() {
        DEFAULT_INITIAL_EASINESS
    } else {
        items.iter().map(|s| s.easiness_factor).sum::<f64>() / items.len() as f64
    };

    let topic_stages_completed: u32 = topics.iter().map(|s| s.repetition_count).sum();
    let possible = topics.len() as u64 * u64::from(ladder_stages);
    let topic_progress = if possible == 0 {
        0.0
    } else {
        (f64::from(topic_stages_completed) / possible as f64).min(1.0)
    };

    LearnerStats {
        total_items: items.len(),
        due_today: items.iter().filter(|s| s.next_due_at <= horizon).count(),
        mastered_items: items.iter().filter(|s| s.mastered).count(),
        average_easiness,
        topics_started: topics.len(),
        topic_stages_completed,
        topics_mastered: topics.iter().filter(|s| s.mastered).count(),
        topic_progress,
    }
}
