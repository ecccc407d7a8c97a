use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ReminderConfig;
use crate::db::{LearnerProfile, ReviewStore, StoreError};
use crate::services::{Notifier, NotifyError, Reminder};
use crate::srs::{select_due, LearnerId, Subject};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("notifier error: {0}")]
    Notify(#[from] NotifyError),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("learner {0} not found")]
    LearnerNotFound(LearnerId),
}

/// What happened for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeliveryOutcome {
    #[serde(rename_all = "camelCase")]
    Delivered {
        due_count: usize,
        delivered: usize,
        subjects: Vec<Subject>,
    },
    NothingDue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub local_hour: u32,
    pub learners_scanned: usize,
    pub learners_notified: usize,
    pub learners_without_due: usize,
    pub learners_failed: usize,
    pub learners_not_started: usize,
    pub items_offered: usize,
    pub duration_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// Another tick still held the lock.
    AlreadyRunning,
    ShuttingDown,
    OutsideWindow { hour: u32 },
}

enum LearnerResult {
    Done(DeliveryOutcome),
    Failed,
    NotStarted,
}

/// Periodic reminder delivery.
///
/// A tick asks the store for learners eligible at the current local hour,
/// selects each learner's due set and sends at most one reminder per learner.
/// Ticks never overlap: a tick that finds the previous one still running is
/// skipped. Once shutdown begins no further learner is started.
pub struct ReviewScheduler {
    store: Arc<dyn ReviewStore>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
    tick_lock: Mutex<()>,
    shutting_down: AtomicBool,
}

impl ReviewScheduler {
    pub fn new(store: Arc<dyn ReviewStore>, notifier: Arc<dyn Notifier>, config: ReminderConfig) -> Self {
        Self {
            store,
            notifier,
            config,
            tick_lock: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ReminderConfig {
        &self.config
    }

    pub fn channel_name(&self) -> &str {
        self.notifier.channel_name()
    }

    pub fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        match FixedOffset::east_opt(self.config.utc_offset_hours * 3600) {
            Some(offset) => now.with_timezone(&offset).hour(),
            None => now.hour(),
        }
    }

    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, SchedulerError> {
        if self.is_shutting_down() {
            return Ok(TickOutcome::ShuttingDown);
        }
        let Ok(_guard) = self.tick_lock.try_lock() else {
            warn!("Previous reminder tick still running, skipping");
            return Ok(TickOutcome::AlreadyRunning);
        };

        let hour = self.local_hour(now);
        let Some(filter) = self.config.window.hour_filter(hour) else {
            debug!(hour, "Outside reminder window, skipping tick");
            return Ok(TickOutcome::OutsideWindow { hour });
        };

        let start = Instant::now();
        info!(hour, channel = self.channel_name(), "Starting reminder tick");

        let learners = self
            .io("due_learners", self.config.store_timeout, self.store.due_learners(filter))
            .await?;
        let mut report = TickReport {
            local_hour: hour,
            learners_scanned: learners.len(),
            ..TickReport::default()
        };
        info!(learner_count = learners.len(), "Scanning learners for due reviews");

        let results: Vec<LearnerResult> = stream::iter(learners)
            .map(|profile| async move {
                if self.is_shutting_down() {
                    return LearnerResult::NotStarted;
                }
                match self.process_learner(&profile, now).await {
                    Ok(outcome) => LearnerResult::Done(outcome),
                    Err(e) => {
                        error!(learner_id = profile.learner_id, error = %e, "Failed to process learner reminders");
                        LearnerResult::Failed
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                LearnerResult::Done(DeliveryOutcome::Delivered { delivered, .. }) => {
                    report.learners_notified += 1;
                    report.items_offered += delivered;
                }
                LearnerResult::Done(DeliveryOutcome::NothingDue) => report.learners_without_due += 1,
                LearnerResult::Failed => report.learners_failed += 1,
                LearnerResult::NotStarted => report.learners_not_started += 1,
            }
        }
        report.duration_secs = start.elapsed().as_secs_f64();

        info!(
            learners_scanned = report.learners_scanned,
            learners_notified = report.learners_notified,
            learners_failed = report.learners_failed,
            learners_not_started = report.learners_not_started,
            items_offered = report.items_offered,
            duration_secs = format!("{:.2}", report.duration_secs),
            "Reminder tick completed"
        );
        Ok(TickOutcome::Completed(report))
    }

    /// Delivers to one learner now, ignoring the delivery window and the
    /// learner's opt-out. The per-delivery caps still apply.
    pub async fn run_for_learner(
        &self,
        learner_id: LearnerId,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, SchedulerError> {
        let profile = self
            .io("learner", self.config.store_timeout, self.store.learner(learner_id))
            .await?
            .ok_or(SchedulerError::LearnerNotFound(learner_id))?;
        info!(learner_id, "Running manual reminder check");
        self.process_learner(&profile, now).await
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Resolves once no tick is in flight.
    pub async fn wait_idle(&self) {
        let _guard = self.tick_lock.lock().await;
    }

    async fn process_learner(
        &self,
        profile: &LearnerProfile,
        now: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, SchedulerError> {
        let states = self
            .io(
                "review_states",
                self.config.store_timeout,
                self.store.review_states(profile.learner_id),
            )
            .await?;

        let due = select_due(now, states, None);
        if due.is_empty() {
            debug!(learner_id = profile.learner_id, "No due reviews");
            return Ok(DeliveryOutcome::NothingDue);
        }

        let cap = delivery_cap(profile.max_per_day, self.config.max_per_delivery);
        let subjects: Vec<Subject> = due.iter().take(cap).map(|s| s.subject).collect();
        let delivered = subjects.len();
        let reminder = Reminder::new(profile.learner_id, subjects.clone(), now);

        self.io(
            "notifier",
            self.config.notifier_timeout,
            self.notifier.deliver(&reminder),
        )
        .await?;

        debug!(
            learner_id = profile.learner_id,
            due_count = due.len(),
            delivered,
            "Reminder delivered"
        );
        Ok(DeliveryOutcome::Delivered {
            due_count: due.len(),
            delivered,
            subjects,
        })
    }

    async fn io<T, E, F>(&self, what: &'static str, limit: Duration, fut: F) -> Result<T, SchedulerError>
    where
        F: Future<Output = Result<T, E>>,
        SchedulerError: From<E>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(SchedulerError::from),
            Err(_) => Err(SchedulerError::Timeout(what)),
        }
    }
}

/// Items per delivery: the learner's daily cap (0 = none) bounded by the
/// global per-delivery cap.
fn delivery_cap(max_per_day: u32, max_per_delivery: usize) -> usize {
    match max_per_day {
        0 => max_per_delivery,
        n => (n as usize).min(max_per_delivery),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryWindow;
    use crate::db::MemoryStore;
    use crate::services::LogNotifier;
    use chrono::TimeZone;

    #[test]
    fn delivery_cap_prefers_the_smaller_limit() {
        assert_eq!(delivery_cap(20, 50), 20);
        assert_eq!(delivery_cap(80, 50), 50);
        assert_eq!(delivery_cap(0, 50), 50);
    }

    #[test]
    fn local_hour_applies_offset() {
        let config = ReminderConfig {
            utc_offset_hours: 8,
            ..ReminderConfig::default()
        };
        let scheduler = ReviewScheduler::new(Arc::new(MemoryStore::new()), Arc::new(LogNotifier), config);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap();
        assert_eq!(scheduler.local_hour(now), 4);
    }

    #[tokio::test]
    async fn outside_window_does_nothing() {
        let config = ReminderConfig {
            window: DeliveryWindow::QuietHours { start: 4, end: 18 },
            ..ReminderConfig::default()
        };
        let scheduler = ReviewScheduler::new(Arc::new(MemoryStore::new()), Arc::new(LogNotifier), config);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap();
        let outcome = scheduler.run_tick(now).await.unwrap();
        assert_eq!(outcome, TickOutcome::OutsideWindow { hour: 22 });
    }

    #[tokio::test]
    async fn no_ticks_after_shutdown() {
        let scheduler =
            ReviewScheduler::new(Arc::new(MemoryStore::new()), Arc::new(LogNotifier), ReminderConfig::default());
        scheduler.begin_shutdown();
        assert_eq!(scheduler.run_tick(Utc::now()).await.unwrap(), TickOutcome::ShuttingDown);
        scheduler.wait_idle().await;
    }
}
