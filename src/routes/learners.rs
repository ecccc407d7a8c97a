use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::db::LearnerProfile;
use crate::response::{ok, AppError};
use crate::srs::{LadderStage, LearnerId, ReviewState, Subject};
use crate::state::{AppState, DEFAULT_SESSION_SIZE};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/due", get(due))
        .route("/:id/stats", get(stats))
        .route("/:id/profile", get(get_profile).put(put_profile))
        .route("/:id/remind", post(remind))
        .route("/:id/topics/:topic/start", post(start_topic))
        .route("/:id/topics/:topic/complete", post(complete_topic))
        .route("/:id/session", post(start_session).delete(finish_session))
        .route("/:id/session/next", get(next_in_session))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn due(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, AppError> {
    let due = state.reviews().due(learner_id, Utc::now(), query.limit).await?;
    Ok(ok(due))
}

async fn stats(State(state): State<AppState>, Path(learner_id): Path<LearnerId>) -> Result<Response, AppError> {
    let stats = state.reviews().stats(learner_id, Utc::now()).await?;
    Ok(ok(stats))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
) -> Result<Response, AppError> {
    let profile = state
        .store()
        .learner(learner_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("learner {learner_id} not found")))?;
    Ok(ok(profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    reminders_enabled: Option<bool>,
    notification_hour: Option<u32>,
    max_per_day: Option<u32>,
}

/// Creates or updates the notification profile; omitted fields keep their
/// current (or default) values.
async fn put_profile(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(body)?;
    if matches!(request.notification_hour, Some(hour) if hour > 23) {
        return Err(AppError::validation("notificationHour must be between 0 and 23"));
    }

    let store = state.store();
    let mut profile = store
        .learner(learner_id)
        .await?
        .unwrap_or_else(|| LearnerProfile::new(learner_id));
    if let Some(enabled) = request.reminders_enabled {
        profile.reminders_enabled = enabled;
    }
    if let Some(hour) = request.notification_hour {
        profile.notification_hour = hour;
    }
    if let Some(max) = request.max_per_day {
        profile.max_per_day = max;
    }
    store.save_learner(&profile).await?;

    Ok(ok(profile))
}

async fn remind(State(state): State<AppState>, Path(learner_id): Path<LearnerId>) -> Result<Response, AppError> {
    let outcome = state.scheduler().run_for_learner(learner_id, Utc::now()).await?;
    Ok(ok(outcome))
}

async fn start_topic(
    State(state): State<AppState>,
    Path((learner_id, topic_id)): Path<(LearnerId, i64)>,
) -> Result<Response, AppError> {
    let topic = state.reviews().start_topic(learner_id, topic_id, Utc::now()).await?;
    Ok(ok(TopicResponse::new(&state, topic)))
}

async fn complete_topic(
    State(state): State<AppState>,
    Path((learner_id, topic_id)): Path<(LearnerId, i64)>,
) -> Result<Response, AppError> {
    let topic = state
        .reviews()
        .complete_topic(learner_id, topic_id, Utc::now())
        .await?;
    Ok(ok(TopicResponse::new(&state, topic)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicResponse {
    stage: LadderStage,
    #[serde(flatten)]
    state: ReviewState,
}

impl TopicResponse {
    fn new(app: &AppState, state: ReviewState) -> Self {
        Self {
            stage: app.reviews().strategies().ladder().stage(&state),
            state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionRequest {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionCursor {
    next: Option<Subject>,
    remaining: usize,
    reviewed: usize,
}

/// Opens a review sitting over the learner's current due set.
async fn start_session(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
    body: Option<Json<SessionRequest>>,
) -> Result<Response, AppError> {
    let limit = body
        .and_then(|Json(request)| request.limit)
        .unwrap_or(DEFAULT_SESSION_SIZE);
    let now = Utc::now();
    let due = state.reviews().due(learner_id, now, Some(limit)).await?;
    let session = state
        .sessions()
        .start(learner_id, due.into_iter().map(|s| s.subject).collect(), now);
    Ok(ok(session))
}

async fn next_in_session(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
) -> Result<Response, AppError> {
    let session = state
        .sessions()
        .get(learner_id)
        .ok_or_else(|| AppError::not_found(format!("no active session for learner {learner_id}")))?;
    Ok(ok(SessionCursor {
        next: state.sessions().next(learner_id),
        remaining: session.remaining(),
        reviewed: session.reviewed,
    }))
}

async fn finish_session(
    State(state): State<AppState>,
    Path(learner_id): Path<LearnerId>,
) -> Result<Response, AppError> {
    let session = state
        .sessions()
        .finish(learner_id)
        .ok_or_else(|| AppError::not_found(format!("no active session for learner {learner_id}")))?;
    Ok(ok(session))
}
