pub mod notifier;
pub mod review;
pub mod session;
pub mod stats;

pub use notifier::{LogNotifier, Notifier, NotifyError, Reminder, WebhookNotifier};
pub use review::{ReviewError, ReviewService};
pub use session::{ReviewSession, SessionStore};
pub use stats::{learner_stats, LearnerStats};
