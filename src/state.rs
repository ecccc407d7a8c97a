use std::sync::Arc;
use std::time::Instant;

use crate::db::ReviewStore;
use crate::services::{ReviewService, SessionStore};
use crate::workers::ReviewScheduler;

/// Batch size for a review session when the request does not give one.
pub const DEFAULT_SESSION_SIZE: usize = 20;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    store: Arc<dyn ReviewStore>,
    reviews: ReviewService,
    scheduler: Arc<ReviewScheduler>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn ReviewStore>, reviews: ReviewService, scheduler: Arc<ReviewScheduler>) -> Self {
        Self {
            started_at: Instant::now(),
            store,
            reviews,
            scheduler,
            sessions: Arc::new(SessionStore::new()),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn store(&self) -> Arc<dyn ReviewStore> {
        Arc::clone(&self.store)
    }

    pub fn reviews(&self) -> &ReviewService {
        &self.reviews
    }

    pub fn scheduler(&self) -> Arc<ReviewScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}
