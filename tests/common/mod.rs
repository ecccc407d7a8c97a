#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use parking_lot::Mutex;

use danci_srs::config::{Config, ReminderConfig};
use danci_srs::db::{HourFilter, LearnerProfile, MemoryStore, ReviewStore, StoreError};
use danci_srs::services::{Notifier, NotifyError, Reminder};
use danci_srs::srs::{LearnerId, ReviewKey, ReviewState, StrategyKind, Subject};
use danci_srs::state::AppState;
use danci_srs::{build_state, create_app};

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn create_test_app() -> (Router, AppState) {
    let state = build_state(
        &Config::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    (create_app(state.clone()), state)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn profile(learner_id: LearnerId, hour: u32, max_per_day: u32) -> LearnerProfile {
    LearnerProfile {
        learner_id,
        reminders_enabled: true,
        notification_hour: hour,
        max_per_day,
    }
}

/// An adaptive item that was last reviewed a while ago and is due at `due_at`.
pub fn due_item(learner_id: LearnerId, item: i64, easiness: f64, due_at: DateTime<Utc>) -> ReviewState {
    let mut state = ReviewState::new(
        learner_id,
        Subject::Item(item),
        StrategyKind::Adaptive,
        easiness,
        due_at - chrono::Duration::days(3),
    );
    state.repetition_count = 1;
    state.interval_days = 3;
    state.last_reviewed_at = Some(due_at - chrono::Duration::days(3));
    state.next_due_at = due_at;
    state
}

pub fn reminder_config() -> ReminderConfig {
    ReminderConfig {
        store_timeout: Duration::from_millis(200),
        notifier_timeout: Duration::from_millis(200),
        ..ReminderConfig::default()
    }
}

/// Notifier that records every reminder and can be told to fail for some
/// learners or to stall.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<Reminder>>,
    failing: Mutex<HashSet<LearnerId>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, learner_id: LearnerId) {
        self.failing.lock().insert(learner_id);
    }

    pub fn stall_for(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn delivered(&self) -> Vec<Reminder> {
        let mut delivered = self.delivered.lock().clone();
        delivered.sort_by_key(|r| r.learner_id);
        delivered
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().contains(&reminder.learner_id) {
            return Err(NotifyError::Unavailable("recording notifier told to fail".into()));
        }
        self.delivered.lock().push(reminder.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// Wraps a `MemoryStore` and fails state reads for selected learners.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    broken: Mutex<HashSet<LearnerId>>,
}

impl FlakyStore {
    pub fn break_learner(&self, learner_id: LearnerId) {
        self.broken.lock().insert(learner_id);
    }
}

#[async_trait]
impl ReviewStore for FlakyStore {
    fn kind(&self) -> &'static str {
        "flaky"
    }

    async fn due_learners(&self, filter: HourFilter) -> Result<Vec<LearnerProfile>, StoreError> {
        self.inner.due_learners(filter).await
    }

    async fn learner(&self, learner_id: LearnerId) -> Result<Option<LearnerProfile>, StoreError> {
        self.inner.learner(learner_id).await
    }

    async fn save_learner(&self, profile: &LearnerProfile) -> Result<(), StoreError> {
        self.inner.save_learner(profile).await
    }

    async fn review_states(&self, learner_id: LearnerId) -> Result<Vec<ReviewState>, StoreError> {
        if self.broken.lock().contains(&learner_id) {
            return Err(StoreError::Unavailable(format!("learner {learner_id} shard offline")));
        }
        self.inner.review_states(learner_id).await
    }

    async fn get(&self, key: ReviewKey) -> Result<Option<ReviewState>, StoreError> {
        self.inner.get(key).await
    }

    async fn upsert(&self, state: &ReviewState) -> Result<ReviewState, StoreError> {
        self.inner.upsert(state).await
    }
}
