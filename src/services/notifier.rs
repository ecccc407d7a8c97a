//! Reminder delivery channels.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::srs::{LearnerId, Subject};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("delivery rejected with status {status}")]
    Rejected { status: u16 },
    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),
}

/// One delivery event for one learner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: Uuid,
    pub learner_id: LearnerId,
    /// Number of items offered in this delivery, already capped.
    pub due_count: usize,
    /// The chosen subjects, highest priority first.
    pub subjects: Vec<Subject>,
    pub message: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(learner_id: LearnerId, subjects: Vec<Subject>, now: DateTime<Utc>) -> Self {
        let due_count = subjects.len();
        Self {
            id: Uuid::new_v4(),
            learner_id,
            due_count,
            subjects,
            message: reminder_message(due_count),
            created_at: now,
        }
    }
}

fn reminder_message(count: usize) -> String {
    match count {
        1 => "You have 1 word to review today.".to_string(),
        n => format!("You have {n} words to review today."),
    }
}

fn serialize_rfc3339<S: serde::Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), NotifyError>;

    /// Human-readable channel name, e.g. "log" or "webhook".
    fn channel_name(&self) -> &str;
}

/// Writes reminders to the log; the default when no channel is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        tracing::info!(
            learner_id = reminder.learner_id,
            due_count = reminder.due_count,
            reminder_id = %reminder.id,
            "{}",
            reminder.message
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

/// Posts reminders as JSON to a front-end webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(reminder).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        tracing::debug!(learner_id = reminder.learner_id, status = status.as_u16(), "webhook reminder delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
