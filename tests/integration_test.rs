use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use danci_srs::db::ReviewStore;

mod common;

use common::{body_json, create_test_app, due_item, empty_request, json_request, profile};

#[tokio::test]
async fn test_health_root() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
    assert_eq!(body["reminderChannel"], "recording");
}

#[tokio::test]
async fn test_health_live() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health/live")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_uses_error_shape() {
    let (app, _) = create_test_app();

    let response = app.oneshot(empty_request("GET", "/api/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_submit_review_creates_state() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/reviews",
            json!({ "learnerId": 1, "subject": { "kind": "item", "id": 10 }, "rating": 5 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["intervalDays"], 1);
    assert_eq!(body["data"]["repetitionCount"], 1);
    assert_eq!(body["data"]["strategy"], "adaptive");
    assert_eq!(body["data"]["version"], 1);
}

#[tokio::test]
async fn test_submit_review_from_accuracy() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/reviews",
            json!({
                "learnerId": 1,
                "subject": { "kind": "item", "id": 10 },
                "accuracy": 1.0,
                "latencyMs": 9000
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["lastQuality"], 4);
}

#[tokio::test]
async fn test_invalid_rating_is_rejected() {
    let (app, state) = create_test_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/reviews",
            json!({ "learnerId": 1, "subject": { "kind": "item", "id": 10 }, "rating": 6 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(state.store().review_states(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(json_request("POST", "/api/reviews", json!({ "learnerId": "x" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_due_list_is_ordered_and_limited() {
    let (app, state) = create_test_app();
    let due_at = Utc::now() - Duration::hours(1);
    let store = state.store();
    store.upsert(&due_item(3, 1, 2.5, due_at)).await.unwrap();
    store.upsert(&due_item(3, 2, 1.4, due_at)).await.unwrap();
    store.upsert(&due_item(3, 3, 2.0, due_at)).await.unwrap();
    store
        .upsert(&due_item(3, 4, 1.3, Utc::now() + Duration::days(2)))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/api/learners/3/due?limit=2"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["subject"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 3]);
}

#[tokio::test]
async fn test_profile_update_and_validation() {
    let (app, _) = create_test_app();

    let bad = app
        .clone()
        .oneshot(json_request("PUT", "/api/learners/5/profile", json!({ "notificationHour": 24 })))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .clone()
        .oneshot(empty_request("GET", "/api/learners/5/profile"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let saved = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/learners/5/profile",
            json!({ "notificationHour": 7, "maxPerDay": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::OK);

    let fetched = app
        .oneshot(empty_request("GET", "/api/learners/5/profile"))
        .await
        .unwrap();
    let body = body_json(fetched).await;
    assert_eq!(body["data"]["notificationHour"], 7);
    assert_eq!(body["data"]["maxPerDay"], 3);
    assert_eq!(body["data"]["remindersEnabled"], true);
}

#[tokio::test]
async fn test_manual_reminder() {
    let (app, state) = create_test_app();

    let unknown = app
        .clone()
        .oneshot(empty_request("POST", "/api/learners/8/remind"))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let store = state.store();
    store.save_learner(&profile(8, 9, 1)).await.unwrap();
    let due_at = Utc::now() - Duration::hours(2);
    store.upsert(&due_item(8, 1, 2.5, due_at)).await.unwrap();
    store.upsert(&due_item(8, 2, 1.9, due_at)).await.unwrap();

    let response = app
        .oneshot(empty_request("POST", "/api/learners/8/remind"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "delivered");
    assert_eq!(body["data"]["dueCount"], 2);
    assert_eq!(body["data"]["delivered"], 1);
    assert_eq!(body["data"]["subjects"][0]["id"], 2);
}

#[tokio::test]
async fn test_topic_ladder_endpoints() {
    let (app, _) = create_test_app();

    let started = app
        .clone()
        .oneshot(empty_request("POST", "/api/learners/2/topics/40/start"))
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::OK);
    let body = body_json(started).await;
    assert_eq!(body["data"]["strategy"], "ladder");
    assert_eq!(body["data"]["intervalDays"], 1);
    assert_eq!(body["data"]["stage"]["stage"], "scheduled");

    let completed = app
        .oneshot(empty_request("POST", "/api/learners/2/topics/40/complete"))
        .await
        .unwrap();
    assert_eq!(completed.status(), StatusCode::OK);
    let body = body_json(completed).await;
    assert_eq!(body["data"]["repetitionCount"], 1);
    assert_eq!(body["data"]["intervalDays"], 2);
}

#[tokio::test]
async fn test_review_session_flow() {
    let (app, state) = create_test_app();
    let due_at = Utc::now() - Duration::hours(1);
    state.store().upsert(&due_item(4, 1, 2.5, due_at)).await.unwrap();
    state.store().upsert(&due_item(4, 2, 1.5, due_at)).await.unwrap();

    let missing = app
        .clone()
        .oneshot(empty_request("GET", "/api/learners/4/session/next"))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let started = app
        .clone()
        .oneshot(json_request("POST", "/api/learners/4/session", json!({ "limit": 5 })))
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::OK);
    let body = body_json(started).await;
    assert_eq!(body["data"]["queue"].as_array().unwrap().len(), 2);

    let reviewed = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/reviews",
            json!({ "learnerId": 4, "subject": { "kind": "item", "id": 2 }, "rating": 4 }),
        ))
        .await
        .unwrap();
    assert_eq!(reviewed.status(), StatusCode::OK);

    let next = app
        .clone()
        .oneshot(empty_request("GET", "/api/learners/4/session/next"))
        .await
        .unwrap();
    let body = body_json(next).await;
    assert_eq!(body["data"]["next"]["id"], 1);
    assert_eq!(body["data"]["remaining"], 1);
    assert_eq!(body["data"]["reviewed"], 1);

    let finished = app
        .oneshot(empty_request("DELETE", "/api/learners/4/session"))
        .await
        .unwrap();
    assert_eq!(finished.status(), StatusCode::OK);
    assert_eq!(state.sessions().active(), 0);
}

#[tokio::test]
async fn test_learner_stats() {
    let (app, _) = create_test_app();

    for (item, rating) in [(1, 5), (2, 2)] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/reviews",
                json!({ "learnerId": 6, "subject": { "kind": "item", "id": item }, "rating": rating }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(empty_request("GET", "/api/learners/6/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["totalItems"], 2);
    assert_eq!(body["data"]["dueToday"], 2);
    assert_eq!(body["data"]["masteredItems"], 0);
}
