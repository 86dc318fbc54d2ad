//! # Sync Scheduler
//!
//! Periodically evaluates active integrations and dispatches the ones whose
//! sync frequency has elapsed since their last successful run. Dispatched runs
//! are fire-and-forget tasks bounded by a worker pool; a tick never waits for
//! them.
//!
//! Within one process an integration is never dispatched while a previous run
//! of it is still in flight. Nothing coordinates separate processes, so two
//! scheduler instances can still run the same integration concurrently.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::RepositoryError;
use crate::models::SyncFrequency;
use crate::orchestrator::SyncOrchestrator;
use crate::repositories::IntegrationRepository;
use crate::tracker::{SyncRunTracker, TrackerError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to load integrations: {0}")]
    Repository(#[from] RepositoryError),
    #[error("failed to reclaim stale runs: {0}")]
    Tracker(#[from] TrackerError),
}

/// Whether an integration with `frequency` last synced at `last_synced_at` is
/// due at `now`. Never-synced integrations are always due; manual ones never
/// are. The threshold must be strictly exceeded.
pub fn is_due(
    frequency: SyncFrequency,
    last_synced_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match (frequency.threshold(), last_synced_at) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(threshold), Some(last)) => now - last > threshold,
    }
}

/// Serializable part of a tick result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TickSummary {
    pub dispatched: Vec<Uuid>,
    pub skipped: u32,
    pub reclaimed: u64,
}

/// Result of one scheduler tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub summary: TickSummary,
    /// Handles of the dispatched runs. Dropping them detaches the runs.
    pub handles: Vec<JoinHandle<()>>,
}

impl TickReport {
    /// Waits for every dispatched run to finish.
    pub async fn wait(self) -> TickSummary {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Dispatched sync task panicked");
            }
        }
        self.summary
    }
}

pub struct SyncScheduler {
    config: SchedulerConfig,
    integrations: IntegrationRepository,
    tracker: SyncRunTracker,
    orchestrator: Arc<SyncOrchestrator>,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl SyncScheduler {
    pub fn new(
        config: SchedulerConfig,
        integrations: IntegrationRepository,
        tracker: SyncRunTracker,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        Self {
            config,
            integrations,
            tracker,
            orchestrator,
            permits,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            tick_interval_seconds = self.config.tick_interval_seconds,
            max_concurrent_runs = self.config.max_concurrent_runs,
            "Starting sync scheduler"
        );
        let tick_interval = TokioDuration::from_secs(self.config.tick_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync scheduler shutdown requested");
                    break;
                }
                _ = sleep(tick_interval) => {
                    let tick_started = Instant::now();
                    match self.tick(Utc::now()).await {
                        Ok(report) => debug!(
                            dispatched = report.summary.dispatched.len(),
                            skipped = report.summary.skipped,
                            elapsed_ms = tick_started.elapsed().as_millis() as u64,
                            "Scheduler tick finished"
                        ),
                        Err(err) => error!(error = %err, "Scheduler tick failed"),
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }

    /// Reclaims abandoned runs, then dispatches every due integration.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        let stale_after = Duration::seconds(self.config.stale_run_timeout_seconds as i64);
        let reclaimed = self.tracker.reclaim_stale(now, stale_after).await?;
        counter!("sync_logs_reclaimed_total").increment(reclaimed);

        let mut report = TickReport::default();
        report.summary.reclaimed = reclaimed;

        for integration in self.integrations.list_active().await? {
            let id = integration.id;
            let skip_reason = match (integration.source_kind(), integration.frequency()) {
                (Err(err), _) | (_, Err(err)) => {
                    warn!(integration_id = %id, error = %err, "Skipping integration with invalid settings");
                    Some("invalid")
                }
                (Ok(source), Ok(_)) if !source.is_polling() => Some("push_only"),
                (Ok(_), Ok(frequency)) => {
                    let last = integration.last_synced_at.map(|t| t.with_timezone(&Utc));
                    if !is_due(frequency, last, now) {
                        Some("not_due")
                    } else if !self.claim(id) {
                        Some("in_flight")
                    } else {
                        None
                    }
                }
            };

            match skip_reason {
                Some(reason) => {
                    counter!("scheduler_skipped_total", "reason" => reason).increment(1);
                    report.summary.skipped += 1;
                }
                None => {
                    counter!("scheduler_dispatched_total").increment(1);
                    report.handles.push(self.dispatch(id));
                    report.summary.dispatched.push(id);
                }
            }
        }

        info!(
            dispatched = report.summary.dispatched.len(),
            skipped = report.summary.skipped,
            reclaimed,
            "Scheduler tick evaluated integrations"
        );
        Ok(report)
    }

    /// Marks `id` as in flight. False if it already is.
    fn claim(&self, id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    fn dispatch(&self, integration_id: Uuid) -> JoinHandle<()> {
        let permits = Arc::clone(&self.permits);
        let orchestrator = Arc::clone(&self.orchestrator);
        let in_flight = Arc::clone(&self.in_flight);

        let task = async move {
            let _release = scopeguard::guard(in_flight, move |in_flight| {
                in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&integration_id);
            });
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool closed before the run started");
                return;
            };

            match orchestrator.run(integration_id, None).await {
                Ok(summary) => info!(
                    sync_log_id = %summary.sync_log_id,
                    status = %summary.status,
                    "Scheduled sync finished"
                ),
                Err(err) => warn!(error = %err, "Scheduled sync failed"),
            }
        };

        tokio::spawn(task.instrument(info_span!("scheduled_sync", integration_id = %integration_id)))
    }
}
