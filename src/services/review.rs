use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::stats::{learner_stats, LearnerStats};
use crate::db::{ReviewStore, StoreError};
use crate::srs::{
    select_due, Feedback, LearnerId, ReviewKey, ReviewState, SrsError, Strategies, Subject,
};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error(transparent)]
    Invalid(#[from] SrsError),
    #[error("review state for learner {learner_id} on {subject:?} changed concurrently; re-read and retry")]
    Conflict {
        learner_id: LearnerId,
        subject: Subject,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReviewError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                learner_id,
                subject,
                ..
            } => ReviewError::Conflict {
                learner_id,
                subject,
            },
            other => ReviewError::Store(other),
        }
    }
}

/// Entry point for everything that mutates or reads review progress.
#[derive(Clone)]
pub struct ReviewService {
    store: Arc<dyn ReviewStore>,
    strategies: Arc<Strategies>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn ReviewStore>, strategies: Strategies) -> Self {
        Self {
            store,
            strategies: Arc::new(strategies),
        }
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    /// Folds one piece of feedback into the learner's state for `subject`.
    ///
    /// Feedback is validated before anything is read, so a rejected rating
    /// never touches the store. A subject seen for the first time starts from
    /// the strategy's default state.
    pub async fn submit(
        &self,
        learner_id: LearnerId,
        subject: Subject,
        feedback: Feedback,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, ReviewError> {
        let event = feedback.into_event()?;

        let current = self.store.get(ReviewKey::new(learner_id, subject)).await?;
        let next = self
            .strategies
            .apply(learner_id, subject, current, event, now)?;
        let stored = self.store.upsert(&next).await?;

        tracing::debug!(
            learner_id,
            subject = ?subject,
            interval_days = stored.interval_days,
            repetition_count = stored.repetition_count,
            mastered = stored.mastered,
            "review recorded"
        );
        Ok(stored)
    }

    /// Puts a topic on the ladder; a topic already started is returned as is.
    pub async fn start_topic(
        &self,
        learner_id: LearnerId,
        topic_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, ReviewError> {
        let subject = Subject::Topic(topic_id);
        if let Some(existing) = self.store.get(ReviewKey::new(learner_id, subject)).await? {
            return Ok(existing);
        }
        let state = self.strategies.ladder().start(learner_id, subject, now);
        Ok(self.store.upsert(&state).await?)
    }

    pub async fn complete_topic(
        &self,
        learner_id: LearnerId,
        topic_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewState, ReviewError> {
        self.submit(learner_id, Subject::Topic(topic_id), Feedback::Completed, now)
            .await
    }

    pub async fn due(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<ReviewState>, ReviewError> {
        let states = self.store.review_states(learner_id).await?;
        Ok(select_due(now, states, limit))
    }

    pub async fn stats(&self, learner_id: LearnerId, now: DateTime<Utc>) -> Result<LearnerStats, ReviewError> {
        let states = self.store.review_states(learner_id).await?;
        Ok(learner_stats(&states, now, self.strategies.ladder().stages()))
    }
}
