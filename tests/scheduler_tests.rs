//! Scheduler ticks against an in-memory database, with Jira served by
//! wiremock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use feedback_sync::models::{Source, SyncFrequency};
use feedback_sync::repositories::{IntegrationRepository, SyncLogRepository};
use feedback_sync::scheduler::SyncScheduler;
use feedback_sync::tracker::{STALE_RUN_MESSAGE, SyncRunTracker};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

mod test_utils;
use test_utils::{insert_integration, orchestrator, setup_test_db, test_config};

fn scheduler(db: &Arc<DatabaseConnection>) -> SyncScheduler {
    let config = test_config();
    SyncScheduler::new(
        config.scheduler.clone(),
        IntegrationRepository::new(Arc::clone(db)),
        SyncRunTracker::new(Arc::clone(db)),
        Arc::new(orchestrator(db, &config).unwrap()),
    )
}

async fn jira_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "issues": [{
                        "key": "FEED-1",
                        "fields": {"summary": "Export is slow", "status": {"name": "Open"}}
                    }],
                    "total": 1
                }))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

fn jira_config(server: &MockServer) -> Value {
    json!({"jiraUrl": server.uri(), "email": "pm@acme.io", "apiToken": "jira-token"})
}

#[tokio::test]
async fn dispatches_only_due_polling_integrations() {
    let db = setup_test_db().await.unwrap();
    let server = jira_server(Duration::ZERO).await;
    let owner = Uuid::new_v4();

    let due = insert_integration(&db, owner, Source::Jira, jira_config(&server), SyncFrequency::Hourly)
        .await
        .unwrap();
    let manual = insert_integration(&db, owner, Source::Jira, jira_config(&server), SyncFrequency::Manual)
        .await
        .unwrap();
    let recent = insert_integration(&db, owner, Source::Jira, jira_config(&server), SyncFrequency::Daily)
        .await
        .unwrap();
    insert_integration(&db, owner, Source::Zapier, json!({}), SyncFrequency::Hourly)
        .await
        .unwrap();

    let integrations = IntegrationRepository::new(Arc::clone(&db));
    integrations
        .mark_synced(recent.id, Utc::now() - chrono::Duration::hours(2))
        .await
        .unwrap();

    let summary = scheduler(&db).tick(Utc::now()).await.unwrap().wait().await;
    assert_eq!(summary.dispatched, vec![due.id]);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.reclaimed, 0);

    let logs = SyncLogRepository::new(Arc::clone(&db));
    let due_logs = logs.list_for_integration(due.id, 10).await.unwrap();
    assert_eq!(due_logs.len(), 1);
    assert_eq!(due_logs[0].status, "success");
    assert!(logs.list_for_integration(manual.id, 10).await.unwrap().is_empty());

    let refreshed = integrations.find_by_id(due.id).await.unwrap().unwrap();
    assert!(refreshed.last_synced_at.is_some());

    // Synced just now, so the next tick leaves it alone
    let summary = scheduler(&db).tick(Utc::now()).await.unwrap().wait().await;
    assert!(summary.dispatched.is_empty());
}

#[tokio::test]
async fn in_flight_integrations_are_not_dispatched_twice() {
    let db = setup_test_db().await.unwrap();
    let server = jira_server(Duration::from_millis(500)).await;
    let integration = insert_integration(
        &db,
        Uuid::new_v4(),
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();

    let scheduler = scheduler(&db);
    let first = scheduler.tick(Utc::now()).await.unwrap();
    assert_eq!(first.summary.dispatched, vec![integration.id]);

    let second = scheduler.tick(Utc::now()).await.unwrap();
    assert!(second.summary.dispatched.is_empty());
    assert_eq!(second.summary.skipped, 1);

    first.wait().await;
    second.wait().await;

    let logs = SyncLogRepository::new(Arc::clone(&db))
        .list_for_integration(integration.id, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn tick_reclaims_abandoned_runs() {
    let db = setup_test_db().await.unwrap();
    let tracker = SyncRunTracker::new(Arc::clone(&db));
    // Manual frequency keeps the tick from dispatching it
    let integration = insert_integration(
        &db,
        Uuid::new_v4(),
        Source::Jira,
        json!({}),
        SyncFrequency::Manual,
    )
    .await
    .unwrap();
    let abandoned = tracker.begin(integration.id).await.unwrap();

    let stale_after = test_config().scheduler.stale_run_timeout_seconds as i64;
    let later = Utc::now() + chrono::Duration::seconds(stale_after + 60);
    let summary = scheduler(&db).tick(later).await.unwrap().wait().await;
    assert_eq!(summary.reclaimed, 1);

    let log = SyncLogRepository::new(Arc::clone(&db))
        .find_by_id(abandoned.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.status, "error");
    assert_eq!(log.error_message.as_deref(), Some(STALE_RUN_MESSAGE));
}
