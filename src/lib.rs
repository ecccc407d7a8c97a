pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod services;
pub mod srs;
pub mod state;
pub mod workers;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, ReminderConfig};
use crate::db::{MemoryStore, ReviewStore, SqliteInitError, SqliteStore};
use crate::services::{LogNotifier, Notifier, ReviewService, WebhookNotifier};
use crate::state::AppState;
use crate::workers::ReviewScheduler;

pub fn create_app(state: AppState) -> axum::Router {
    routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// SQLite when `DATABASE_URL` is set, the in-memory store otherwise.
pub async fn open_store(config: &Config) -> Result<Arc<dyn ReviewStore>, SqliteInitError> {
    match config.database_url.as_deref() {
        Some(url) => {
            let store = SqliteStore::connect(url).await?;
            tracing::info!(url, "review store: sqlite");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, review progress is kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Webhook notifier when configured; falls back to logging reminders.
pub fn build_notifier(config: &ReminderConfig) -> Arc<dyn Notifier> {
    if let Some(url) = config.webhook_url.as_deref() {
        match WebhookNotifier::new(url, config.notifier_timeout) {
            Ok(notifier) => return Arc::new(notifier),
            Err(e) => tracing::warn!(error = %e, "webhook notifier not initialized, using log notifier"),
        }
    }
    Arc::new(LogNotifier)
}

pub fn build_state(config: &Config, store: Arc<dyn ReviewStore>, notifier: Arc<dyn Notifier>) -> AppState {
    let reviews = ReviewService::new(Arc::clone(&store), config.srs.strategies());
    let scheduler = Arc::new(ReviewScheduler::new(
        Arc::clone(&store),
        notifier,
        config.reminders.clone(),
    ));
    AppState::new(store, reviews, scheduler)
}
