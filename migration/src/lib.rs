//! Database migrations for the feedback sync service.

pub use sea_orm_migration::prelude::*;

mod m2025_06_01_000001_create_integrations;
mod m2025_06_01_000002_create_feedback;
mod m2025_06_01_000003_create_sync_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_06_01_000001_create_integrations::Migration),
            Box::new(m2025_06_01_000002_create_feedback::Migration),
            Box::new(m2025_06_01_000003_create_sync_logs::Migration),
        ]
    }
}
