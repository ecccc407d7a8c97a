use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{HourFilter, LearnerProfile, ReviewStore, StoreError};
use crate::srs::{LearnerId, ReviewKey, ReviewState};

/// Process-local store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    learners: RwLock<HashMap<LearnerId, LearnerProfile>>,
    states: RwLock<HashMap<ReviewKey, ReviewState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn due_learners(&self, filter: HourFilter) -> Result<Vec<LearnerProfile>, StoreError> {
        let mut learners: Vec<LearnerProfile> = self
            .learners
            .read()
            .values()
            .filter(|p| p.matches(filter))
            .cloned()
            .collect();
        learners.sort_by_key(|p| p.learner_id);
        Ok(learners)
    }

    async fn learner(&self, learner_id: LearnerId) -> Result<Option<LearnerProfile>, StoreError> {
        Ok(self.learners.read().get(&learner_id).cloned())
    }

    async fn save_learner(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
        self.learners
            .write()
            .insert(profile.learner_id, profile.clone());
        Ok(())
    }

    async fn review_states(&self, learner_id: LearnerId) -> Result<Vec<ReviewState>, StoreError> {
        let mut states: Vec<ReviewState> = self
            .states
            .read()
            .values()
            .filter(|s| s.learner_id == learner_id)
            .cloned()
            .collect();
        states.sort_by_key(|s| s.subject);
        Ok(states)
    }

    async fn get(&self, key: ReviewKey) -> Result<Option<ReviewState>, StoreError> {
        Ok(self.states.read().get(&key).cloned())
    }

    async fn upsert(&self, state: &ReviewState) -> Result<ReviewState, StoreError> {
        let mut states = self.states.write();
        let current_version = states.get(&state.key()).map(|s| s.version).unwrap_or(0);
        if current_version != state.version {
            return Err(StoreError::conflict(state));
        }

        let mut stored = state.clone();
        stored.version = state.version + 1;
        states.insert(stored.key(), stored.clone());
        Ok(stored)
    }
}
