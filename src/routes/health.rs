use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/live", get(live))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
    reminder_channel: String,
    uptime: u64,
    timestamp: String,
}

async fn root(State(state): State<AppState>) -> Response {
    let response = HealthResponse {
        status: "ok",
        store: state.store().kind(),
        reminder_channel: state.scheduler().channel_name().to_string(),
        uptime: state.uptime_seconds(),
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    };
    Json(response).into_response()
}

async fn live() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
