use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use danci_srs::db::{HourFilter, ReviewStore, SqliteStore, StoreError};
use danci_srs::services::{ReviewError, ReviewService};
use danci_srs::srs::{Feedback, LadderUpdater, Quality, ReviewKey, Strategies, Subject};

mod common;

use common::{at, due_item, profile};

async fn open(dir: &TempDir) -> SqliteStore {
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("data/srs.db").display());
    SqliteStore::connect(&url).await.expect("open sqlite store")
}

#[tokio::test]
async fn creates_parent_directory_and_is_reopenable() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    store.save_learner(&profile(1, 8, 10)).await.unwrap();
    store.pool().close().await;

    assert!(dir.path().join("data/srs.db").exists());

    // Schema bootstrap is idempotent.
    let reopened = open(&dir).await;
    assert_eq!(reopened.learner(1).await.unwrap(), Some(profile(1, 8, 10)));
}

#[tokio::test]
async fn review_state_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let now = at(2024, 6, 3, 9);

    let mut state = due_item(5, 42, 2.36, now);
    state.last_quality = Some(Quality::CorrectHesitation);
    state.consecutive_correct = 2;
    let stored = store.upsert(&state).await.unwrap();
    assert_eq!(stored.version, 1);

    let loaded = store
        .get(ReviewKey::new(5, Subject::Item(42)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded, stored);
    assert_eq!(store.review_states(5).await.unwrap(), vec![stored]);
    assert!(store.review_states(6).await.unwrap().is_empty());
}

#[tokio::test]
async fn ladder_topic_persists_stage_flags() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let ladder = LadderUpdater::new(vec![1, 2]);
    let now = at(2024, 6, 3, 9);

    let mut topic = store.upsert(&ladder.start(1, Subject::Topic(3), now)).await.unwrap();
    for day in 1..=2 {
        let next = ladder.advance(&topic, now + Duration::days(day));
        topic = store.upsert(&next).await.unwrap();
    }

    let loaded = store
        .get(ReviewKey::new(1, Subject::Topic(3)))
        .await
        .unwrap()
        .unwrap();
    assert!(loaded.completed);
    assert!(loaded.mastered);
    assert_eq!(loaded.version, 3);
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;
    let now = at(2024, 6, 3, 9);

    let fresh = due_item(1, 1, 2.5, now);
    let stored = store.upsert(&fresh).await.unwrap();
    assert!(matches!(
        store.upsert(&fresh).await,
        Err(StoreError::Conflict { expected: 0, .. })
    ));

    let mut newer = stored.clone();
    newer.interval_days = 6;
    store.upsert(&newer).await.unwrap();
    assert!(matches!(
        store.upsert(&stored).await,
        Err(StoreError::Conflict { expected: 1, .. })
    ));
}

#[tokio::test]
async fn due_learners_filters_by_hour_and_opt_in() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir).await;

    store.save_learner(&profile(1, 7, 20)).await.unwrap();
    store.save_learner(&profile(2, 8, 20)).await.unwrap();
    let mut muted = profile(3, 7, 20);
    muted.reminders_enabled = false;
    store.save_learner(&muted).await.unwrap();

    let at_seven = store.due_learners(HourFilter::Exact(7)).await.unwrap();
    assert_eq!(at_seven, vec![profile(1, 7, 20)]);

    let everyone = store.due_learners(HourFilter::Any).await.unwrap();
    assert_eq!(everyone.iter().map(|p| p.learner_id).collect::<Vec<_>>(), vec![1, 2]);

    // Updating a profile replaces it.
    store.save_learner(&profile(2, 7, 5)).await.unwrap();
    assert_eq!(store.due_learners(HourFilter::Exact(7)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn review_service_works_over_sqlite() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir).await);
    let service = ReviewService::new(store.clone(), Strategies::default());
    let now = at(2024, 6, 3, 9);

    service
        .submit(1, Subject::Item(1), Feedback::Rating(5), now)
        .await
        .unwrap();
    let second = service
        .submit(1, Subject::Item(1), Feedback::Rating(5), now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(second.interval_days, 3);
    assert_eq!(second.version, 2);

    let err = service
        .submit(1, Subject::Item(1), Feedback::Rating(-1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::Invalid(_)));
    assert_eq!(store.review_states(1).await.unwrap()[0].version, 2);
}
