//! Sync log lifecycle against an in-memory database.

use chrono::{Duration, Utc};
use feedback_sync::models::{Source, SyncFrequency};
use feedback_sync::repositories::SyncLogRepository;
use feedback_sync::tracker::{
    MAX_ERROR_MESSAGE_CHARS, RunCounts, STALE_RUN_MESSAGE, SyncRunTracker, TrackerError,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

mod test_utils;
use test_utils::{insert_integration, setup_test_db};

async fn integration_id(db: &Arc<DatabaseConnection>) -> Uuid {
    insert_integration(db, Uuid::new_v4(), Source::Jira, json!({}), SyncFrequency::Daily)
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn log_moves_from_running_to_exactly_one_terminal_state() {
    let db = setup_test_db().await.unwrap();
    let tracker = SyncRunTracker::new(Arc::clone(&db));
    let log = tracker.begin(integration_id(&db).await).await.unwrap();
    assert_eq!(log.status, "running");
    assert_eq!(log.completed_at, None);
    assert_eq!(log.items_processed, 0);

    let counts = RunCounts {
        processed: 3,
        created: 2,
        updated: 1,
    };
    let done = tracker.complete_success(log.id, counts).await.unwrap();
    assert_eq!(done.status, "success");
    assert_eq!(done.items_processed, 3);
    assert_eq!(done.items_created, 2);
    assert_eq!(done.items_updated, 1);
    assert!(done.completed_at.is_some());
    assert!(done.completed_at.unwrap() >= done.started_at);

    let err = tracker
        .complete_error(log.id, RunCounts::default(), "late failure")
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::AlreadyCompleted(id) if id == log.id));

    let stored = SyncLogRepository::new(Arc::clone(&db))
        .find_by_id(log.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "success");
    assert_eq!(stored.error_message, None);
}

#[tokio::test]
async fn error_messages_are_truncated() {
    let db = setup_test_db().await.unwrap();
    let tracker = SyncRunTracker::new(Arc::clone(&db));
    let log = tracker.begin(integration_id(&db).await).await.unwrap();

    let done = tracker
        .complete_error(log.id, RunCounts::default(), &"x".repeat(5_000))
        .await
        .unwrap();
    assert_eq!(done.status, "error");
    assert_eq!(
        done.error_message.unwrap().chars().count(),
        MAX_ERROR_MESSAGE_CHARS
    );
}

#[tokio::test]
async fn completing_unknown_log_is_not_found() {
    let db = setup_test_db().await.unwrap();
    let tracker = SyncRunTracker::new(db);
    let err = tracker
        .complete_success(Uuid::new_v4(), RunCounts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::NotFound(_)));
}

#[tokio::test]
async fn stale_running_logs_are_reclaimed_once() {
    let db = setup_test_db().await.unwrap();
    let tracker = SyncRunTracker::new(Arc::clone(&db));
    let stale = tracker.begin(integration_id(&db).await).await.unwrap();
    let finished = tracker.begin(integration_id(&db).await).await.unwrap();
    tracker
        .complete_success(finished.id, RunCounts::default())
        .await
        .unwrap();

    // Nothing is old enough yet
    assert_eq!(
        tracker.reclaim_stale(Utc::now(), Duration::hours(1)).await.unwrap(),
        0
    );

    let later = Utc::now() + Duration::hours(2);
    assert_eq!(tracker.reclaim_stale(later, Duration::hours(1)).await.unwrap(), 1);
    assert_eq!(tracker.reclaim_stale(later, Duration::hours(1)).await.unwrap(), 0);

    let logs = SyncLogRepository::new(Arc::clone(&db));
    let reclaimed = logs.find_by_id(stale.id).await.unwrap().unwrap();
    assert_eq!(reclaimed.status, "error");
    assert_eq!(reclaimed.error_message.as_deref(), Some(STALE_RUN_MESSAGE));
    assert!(reclaimed.completed_at.is_some());

    let untouched = logs.find_by_id(finished.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, "success");

    // The abandoned run can no longer complete
    let err = tracker
        .complete_success(stale.id, RunCounts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::AlreadyCompleted(_)));
}
