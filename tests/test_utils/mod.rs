//! Test utilities for database-backed tests.
//!
//! Sets up in-memory SQLite databases with migrations applied and builds the
//! sync engine around them.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use feedback_sync::config::AppConfig;
use feedback_sync::connectors::Registry;
use feedback_sync::models::{Source, SyncFrequency, integration};
use feedback_sync::orchestrator::SyncOrchestrator;
use feedback_sync::reconciler::Reconciler;
use feedback_sync::repositories::{
    FeedbackRepository, FeedbackStore, IntegrationRepository, NewIntegration,
};
use feedback_sync::tracker::SyncRunTracker;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(Arc::new(db))
}

/// Config with a test operator token and no scheduler loop.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        operator_tokens: vec!["test-token".to_string()],
        ..Default::default()
    };
    config.scheduler.enabled = false;
    config
}

/// Creates an active integration owned by `owner_id`.
pub async fn insert_integration(
    db: &Arc<DatabaseConnection>,
    owner_id: Uuid,
    source: Source,
    config: Value,
    sync_frequency: SyncFrequency,
) -> Result<integration::Model> {
    let integration = IntegrationRepository::new(Arc::clone(db))
        .create(NewIntegration {
            owner_id,
            source,
            name: format!("Test {} integration", source),
            config,
            sync_frequency,
            is_active: true,
        })
        .await?;
    Ok(integration)
}

/// Orchestrator over the default registry, writing through `store`.
pub fn orchestrator_with_store(
    db: &Arc<DatabaseConnection>,
    config: &AppConfig,
    store: Arc<dyn FeedbackStore>,
) -> Result<SyncOrchestrator> {
    let registry = Registry::from_config(config)?;
    Ok(SyncOrchestrator::new(
        IntegrationRepository::new(Arc::clone(db)),
        Arc::new(registry),
        Reconciler::new(store),
        SyncRunTracker::new(Arc::clone(db)),
        Duration::from_secs(config.scheduler.max_run_seconds),
    ))
}

/// Orchestrator over the default registry and the real feedback repository.
pub fn orchestrator(db: &Arc<DatabaseConnection>, config: &AppConfig) -> Result<SyncOrchestrator> {
    orchestrator_with_store(
        db,
        config,
        Arc::new(FeedbackRepository::new(Arc::clone(db))),
    )
}
