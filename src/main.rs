//! # Feedback Sync Entry Point
//!
//! Serves the HTTP API by default; `migrate`, `sync` and `schedule-once`
//! cover operational one-offs.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedback_sync::{
    config::{AppConfig, ConfigLoader},
    connectors::Registry,
    db,
    migration::{Migrator, MigratorTrait},
    server::{AppState, run_server},
    telemetry::init_tracing,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "feedback-sync", version, about = "Multi-source feedback synchronization")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and, when enabled, the scheduler loop
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Sync one integration immediately and print the run summary
    Sync {
        /// Integration id
        integration_id: Uuid,
    },
    /// Evaluate the schedule once, wait for dispatched runs and print the summary
    ScheduleOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing tracing")?;
    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Effective configuration");
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    Migrator::up(&db, None)
        .await
        .context("applying migrations")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            info!("Migrations applied");
            Ok(())
        }
        command => {
            let state = build_state(config, db)?;
            dispatch(command, state).await
        }
    }
}

fn build_state(config: AppConfig, db: sea_orm::DatabaseConnection) -> Result<AppState> {
    let registry = Registry::from_config(&config).context("building connector registry")?;
    Ok(AppState::new(
        Arc::new(config),
        Arc::new(db),
        Arc::new(registry),
    ))
}

async fn dispatch(command: Command, state: AppState) -> Result<()> {
    match command {
        Command::Sync { integration_id } => {
            let summary = state
                .orchestrator
                .run(integration_id, None)
                .await
                .with_context(|| format!("syncing integration {}", integration_id))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::ScheduleOnce => {
            let report = state
                .scheduler
                .tick(chrono::Utc::now())
                .await
                .context("running scheduler tick")?;
            let summary = report.wait().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Serve | Command::Migrate => {
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                    signal.cancel();
                }
            });
            run_server(state, shutdown).await
        }
    }
}
