use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::srs::{LearnerId, Subject};

/// An in-progress review sitting for one learner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub learner_id: LearnerId,
    pub queue: VecDeque<Subject>,
    pub reviewed: usize,
    pub started_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

/// Per-learner session state, owned by the HTTP layer.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<LearnerId, ReviewSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session, replacing any existing one for the learner.
    pub fn start(&self, learner_id: LearnerId, queue: Vec<Subject>, now: DateTime<Utc>) -> ReviewSession {
        let session = ReviewSession {
            learner_id,
            queue: queue.into(),
            reviewed: 0,
            started_at: now,
        };
        self.sessions.write().insert(learner_id, session.clone());
        session
    }

    pub fn get(&self, learner_id: LearnerId) -> Option<ReviewSession> {
        self.sessions.read().get(&learner_id).cloned()
    }

    pub fn next(&self, learner_id: LearnerId) -> Option<Subject> {
        self.sessions
            .read()
            .get(&learner_id)
            .and_then(|s| s.queue.front().copied())
    }

    /// Removes a reviewed subject from the queue. Returns false when there is
    /// no session or the subject was not queued.
    pub fn record(&self, learner_id: LearnerId, subject: Subject) -> bool {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&learner_id) else {
            return false;
        };
        let Some(pos) = session.queue.iter().position(|s| *s == subject) else {
            return false;
        };
        session.queue.remove(pos);
        session.reviewed += 1;
        true
    }

    pub fn finish(&self, learner_id: LearnerId) -> Option<ReviewSession> {
        self.sessions.write().remove(&learner_id)
    }

    pub fn active(&self) -> usize {
        self.sessions.read().len()
    }
}
