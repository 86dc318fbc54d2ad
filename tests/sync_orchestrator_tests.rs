//! End-to-end sync runs: orchestrator, reconciler and tracker over an
//! in-memory database, with Jira served by wiremock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feedback_sync::error::RepositoryError;
use feedback_sync::models::feedback::Model as Feedback;
use feedback_sync::models::{
    FeedbackDraft, FeedbackStatus, NaturalKey, Source, SyncFrequency, SyncStatus,
};
use feedback_sync::orchestrator::SyncRunError;
use feedback_sync::repositories::{
    FeedbackFilter, FeedbackRepository, FeedbackStore, IntegrationRepository, SyncLogRepository,
};
use sea_orm::{ConnectionTrait, DbErr};
use serde_json::{Value, json};
use uuid::Uuid;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

mod test_utils;
use test_utils::{insert_integration, orchestrator, orchestrator_with_store, setup_test_db, test_config};

fn issue(key: &str, summary: &str, status: &str) -> Value {
    json!({
        "id": key,
        "key": key,
        "fields": {
            "summary": summary,
            "priority": {"name": "Medium"},
            "status": {"name": status},
            "labels": [],
            "updated": "2024-05-02T10:00:00.000+0000"
        }
    })
}

async fn mount_search(server: &MockServer, issues: Vec<Value>) {
    let total = issues.len();
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issues": issues,
            "total": total
        })))
        .mount(server)
        .await;
}

fn jira_config(server: &MockServer) -> Value {
    json!({"jiraUrl": server.uri(), "email": "pm@acme.io", "apiToken": "jira-token"})
}

#[tokio::test]
async fn rerunning_a_sync_updates_instead_of_duplicating() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();
    mount_search(
        &server,
        vec![
            issue("FEED-1", "Export is slow", "To Do"),
            issue("FEED-2", "Dark mode", "In Progress"),
        ],
    )
    .await;

    let orchestrator = orchestrator(&db, &test_config()).unwrap();

    let first = orchestrator.run(integration.id, Some(owner)).await.unwrap();
    assert_eq!(first.status, SyncStatus::Success);
    assert_eq!(first.items_processed, 2);
    assert_eq!(first.items_created, 2);
    assert_eq!(first.items_updated, 0);

    let second = orchestrator.run(integration.id, None).await.unwrap();
    assert_eq!(second.items_created, 0);
    assert_eq!(second.items_updated, 2);

    let feedback = FeedbackRepository::new(Arc::clone(&db));
    let filter = FeedbackFilter {
        owner_id: Some(owner),
        ..Default::default()
    };
    assert_eq!(feedback.count(&filter).await.unwrap(), 2);

    let logs = SyncLogRepository::new(Arc::clone(&db))
        .list_for_integration(integration.id, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|log| log.status == "success" && log.completed_at.is_some()));

    let refreshed = IntegrationRepository::new(Arc::clone(&db))
        .find_by_id(integration.id)
        .await
        .unwrap()
        .unwrap();
    assert!(refreshed.last_synced_at.is_some());
}

#[tokio::test]
async fn unmappable_items_are_skipped_without_failing_the_run() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Manual,
    )
    .await
    .unwrap();
    mount_search(
        &server,
        vec![
            issue("FEED-1", "Export is slow", "Done"),
            json!({"key": "FEED-2", "fields": {"summary": "   "}}),
        ],
    )
    .await;

    let summary = orchestrator(&db, &test_config())
        .unwrap()
        .run(integration.id, Some(owner))
        .await
        .unwrap();
    assert_eq!(summary.status, SyncStatus::Success);
    assert_eq!(summary.items_processed, 2);
    assert_eq!(summary.items_created, 1);
    assert_eq!(summary.items_failed, 1);

    let rows = FeedbackRepository::new(Arc::clone(&db))
        .list(&FeedbackFilter::default(), 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status.as_deref(), Some(FeedbackStatus::Resolved.as_str()));
}

#[tokio::test]
async fn upstream_failure_records_error_and_keeps_cursor() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = orchestrator(&db, &test_config())
        .unwrap()
        .run(integration.id, Some(owner))
        .await
        .unwrap_err();
    let log_id = match err {
        SyncRunError::Upstream { sync_log_id, .. } => sync_log_id,
        other => panic!("expected upstream error, got {other:?}"),
    };

    let log = SyncLogRepository::new(Arc::clone(&db))
        .find_by_id(log_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.status, "error");
    assert!(log.error_message.unwrap().contains("500"));
    assert!(log.completed_at.is_some());

    let refreshed = IntegrationRepository::new(Arc::clone(&db))
        .find_by_id(integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.last_synced_at, None);
}

#[tokio::test]
async fn slow_fetch_times_out_with_error_log() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"issues": [], "total": 0}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.scheduler.max_run_seconds = 1;
    let err = orchestrator(&db, &config)
        .unwrap()
        .run(integration.id, None)
        .await
        .unwrap_err();
    let SyncRunError::Timeout { sync_log_id, seconds } = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(seconds, 1);

    let log = SyncLogRepository::new(Arc::clone(&db))
        .find_by_id(sync_log_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.status, "error");
    assert_eq!(log.error_message.as_deref(), Some("sync timed out after 1s"));
}

#[tokio::test]
async fn configuration_and_ownership_errors_open_no_log() {
    let db = setup_test_db().await.unwrap();
    let owner = Uuid::new_v4();
    let misconfigured = insert_integration(
        &db,
        owner,
        Source::Notion,
        json!({"apiToken": "your-notion-token", "databaseId": "db"}),
        SyncFrequency::Daily,
    )
    .await
    .unwrap();
    let orchestrator = orchestrator(&db, &test_config()).unwrap();

    let err = orchestrator
        .run(misconfigured.id, Some(owner))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncRunError::Configuration(ref msg) if msg.contains("apiToken")));

    let err = orchestrator
        .run(misconfigured.id, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncRunError::Forbidden(id) if id == misconfigured.id));

    let err = orchestrator.run(Uuid::new_v4(), None).await.unwrap_err();
    assert!(matches!(err, SyncRunError::NotFound(_)));

    let logs = SyncLogRepository::new(Arc::clone(&db))
        .list_for_integration(misconfigured.id, 10)
        .await
        .unwrap();
    assert!(logs.is_empty());
}

#[tokio::test]
async fn push_sources_cannot_be_polled() {
    let db = setup_test_db().await.unwrap();
    let owner = Uuid::new_v4();
    let zapier = insert_integration(&db, owner, Source::Zapier, json!({}), SyncFrequency::Manual)
        .await
        .unwrap();

    let err = orchestrator(&db, &test_config())
        .unwrap()
        .run(zapier.id, Some(owner))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncRunError::UnsupportedSource(Source::Zapier)));
}

/// Store that refuses to insert one specific external id.
struct FailingStore {
    inner: FeedbackRepository,
    poisoned: &'static str,
}

#[async_trait]
impl FeedbackStore for FailingStore {
    async fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<Feedback>, RepositoryError> {
        self.inner.find_by_natural_key(key).await
    }

    async fn insert(&self, draft: &FeedbackDraft) -> Result<Feedback, RepositoryError> {
        if draft.external_id.as_deref() == Some(self.poisoned) {
            return Err(DbErr::Custom("disk full".to_string()).into());
        }
        self.inner.insert(draft).await
    }

    async fn update(&self, existing: Feedback, draft: &FeedbackDraft) -> Result<Feedback, RepositoryError> {
        self.inner.update(existing, draft).await
    }

    async fn upsert_on_integration(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError> {
        self.inner.upsert_on_integration(drafts).await
    }

    async fn insert_many(&self, drafts: &[FeedbackDraft]) -> Result<u64, RepositoryError> {
        self.inner.insert_many(drafts).await
    }
}

#[tokio::test]
async fn write_failure_marks_run_as_error_but_keeps_other_items() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();
    mount_search(
        &server,
        (1..=5)
            .map(|n| issue(&format!("FEED-{n}"), &format!("Item {n}"), "Open"))
            .collect(),
    )
    .await;

    let store = Arc::new(FailingStore {
        inner: FeedbackRepository::new(Arc::clone(&db)),
        poisoned: "FEED-3",
    });
    let summary = orchestrator_with_store(&db, &test_config(), store)
        .unwrap()
        .run(integration.id, Some(owner))
        .await
        .unwrap();

    assert_eq!(summary.status, SyncStatus::Error);
    assert_eq!(summary.items_processed, 5);
    assert_eq!(summary.items_created, 4);
    assert_eq!(summary.items_failed, 1);
    let message = summary.error_message.unwrap();
    assert!(message.starts_with("1 of 5 items failed to write"));
    assert!(message.contains("disk full"));

    let log = SyncLogRepository::new(Arc::clone(&db))
        .find_by_id(summary.sync_log_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.status, "error");
    assert_eq!(log.items_processed, 5);
    assert_eq!(log.items_created, 4);

    let refreshed = IntegrationRepository::new(Arc::clone(&db))
        .find_by_id(integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.last_synced_at, None);
}

#[tokio::test]
async fn failed_cursor_stamp_closes_the_log_as_error() {
    let db = setup_test_db().await.unwrap();
    let server = MockServer::start().await;
    let owner = Uuid::new_v4();
    let integration = insert_integration(
        &db,
        owner,
        Source::Jira,
        jira_config(&server),
        SyncFrequency::Hourly,
    )
    .await
    .unwrap();
    mount_search(&server, vec![issue("FEED-1", "Export is slow", "To Do")]).await;

    db.execute_unprepared(
        "CREATE TRIGGER freeze_cursor BEFORE UPDATE OF last_synced_at ON integrations \
         BEGIN SELECT RAISE(ABORT, 'cursor is frozen'); END;",
    )
    .await
    .unwrap();

    let err = orchestrator(&db, &test_config())
        .unwrap()
        .run(integration.id, Some(owner))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncRunError::Repository(_)), "got {err:?}");

    let logs = SyncLogRepository::new(Arc::clone(&db))
        .list_for_integration(integration.id, 10)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "error");
    assert_eq!(logs[0].items_created, 1);
    assert!(logs[0].completed_at.is_some());
    let message = logs[0].error_message.as_deref().unwrap();
    assert!(message.starts_with("cursor update failed"), "{message}");
    assert!(message.contains("cursor is frozen"), "{message}");

    let refreshed = IntegrationRepository::new(Arc::clone(&db))
        .find_by_id(integration.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.last_synced_at, None);
}
