use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::json_body;
use crate::response::{ok, AppError};
use crate::srs::{Feedback, LearnerId, Subject};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    learner_id: LearnerId,
    subject: Subject,
    rating: Option<i64>,
    accuracy: Option<f64>,
    latency_ms: Option<u64>,
    #[serde(default)]
    completed: bool,
}

impl SubmitReviewRequest {
    fn feedback(&self) -> Result<Feedback, AppError> {
        match (self.rating, self.accuracy, self.completed) {
            (Some(rating), None, false) => Ok(Feedback::Rating(rating)),
            (None, Some(accuracy), false) => Ok(Feedback::Accuracy {
                accuracy,
                latency: self.latency_ms.map(Duration::from_millis),
            }),
            (None, None, true) => Ok(Feedback::Completed),
            (None, None, false) => Err(AppError::validation(
                "one of rating, accuracy or completed is required",
            )),
            _ => Err(AppError::validation(
                "rating, accuracy and completed are mutually exclusive",
            )),
        }
    }
}

pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitReviewRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let request = json_body(body)?;
    let feedback = request.feedback()?;

    let updated = state
        .reviews()
        .submit(request.learner_id, request.subject, feedback, Utc::now())
        .await?;
    state.sessions().record(request.learner_id, request.subject);

    Ok(ok(updated))
}
