mod reminders;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::env_bool;

pub use reminders::{DeliveryOutcome, ReviewScheduler, SchedulerError, TickOutcome, TickReport};

pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    reminders: Arc<ReviewScheduler>,
    leader: AtomicBool,
}

impl WorkerManager {
    /// `leader` decides whether this process runs periodic jobs at all; only
    /// one instance of a deployment should.
    pub async fn new(reminders: Arc<ReviewScheduler>, leader: bool) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await.map_err(WorkerError::Scheduler)?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            reminders,
            leader: AtomicBool::new(leader),
        })
    }

    pub fn is_leader(&self) -> bool {
        self.leader.load(Ordering::Relaxed)
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !self.is_leader() {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        info!("Starting workers (leader mode)");

        let scheduler = self.scheduler.lock().await;

        if env_bool("ENABLE_REMINDER_WORKER", true) {
            let schedule = self.reminders.config().schedule.clone();
            let reminders = Arc::clone(&self.reminders);
            let job = Job::new_async(&schedule, move |_uuid, _lock| {
                let reminders = Arc::clone(&reminders);
                Box::pin(async move {
                    if let Err(e) = reminders.run_tick(Utc::now()).await {
                        error!(error = %e, "Reminder worker error");
                    }
                })
            })
            .map_err(WorkerError::Scheduler)?;
            scheduler.add(job).await.map_err(WorkerError::Scheduler)?;
            info!(schedule = %schedule, channel = self.reminders.channel_name(), "Reminder worker scheduled");
        } else {
            info!("Reminder worker disabled");
        }

        scheduler.start().await.map_err(WorkerError::Scheduler)?;
        info!("All workers started");

        Ok(())
    }

    /// Stops scheduling new ticks and waits for an in-flight tick to finish
    /// its current learners.
    pub async fn stop(&self) {
        if !self.is_leader() {
            return;
        }

        info!("Stopping workers...");
        self.reminders.begin_shutdown();

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "Error shutting down scheduler");
        }
        self.reminders.wait_idle().await;

        self.leader.store(false, Ordering::Relaxed);
        info!("Workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
}
