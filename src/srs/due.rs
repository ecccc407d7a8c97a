use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::state::ReviewState;

/// Review priority, highest first: never-reviewed subjects, then harder
/// subjects (lower easiness), then the most overdue.
pub fn compare_priority(a: &ReviewState, b: &ReviewState) -> Ordering {
    b.is_new()
        .cmp(&a.is_new())
        .then_with(|| a.easiness_factor.total_cmp(&b.easiness_factor))
        .then_with(|| a.next_due_at.cmp(&b.next_due_at))
        .then_with(|| a.subject.cmp(&b.subject))
}

/// Returns the states due at `now`, in priority order, truncated to `limit`.
pub fn select_due<I>(now: DateTime<Utc>, states: I, limit: Option<usize>) -> Vec<ReviewState>
where
    I: IntoIterator<Item = ReviewState>,
{
    let mut due: Vec<ReviewState> = states.into_iter().filter(|s| s.is_due(now)).collect();
    due.sort_by(compare_priority);
    if let Some(limit) = limit {
        due.truncate(limit);
    }
    due
}

pub fn due_count(now: DateTime<Utc>, states: &[ReviewState]) -> usize {
    states.iter().filter(|s| s.is_due(now)).count()
}
