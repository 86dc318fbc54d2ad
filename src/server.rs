//! # Server Configuration
//!
//! Application state, router assembly and the HTTP server lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::auth_middleware;
use crate::config::AppConfig;
use crate::connectors::Registry;
use crate::handlers;
use crate::orchestrator::SyncOrchestrator;
use crate::reconciler::Reconciler;
use crate::repositories::{FeedbackRepository, IntegrationRepository};
use crate::scheduler::SyncScheduler;
use crate::tracker::SyncRunTracker;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<DatabaseConnection>,
    pub registry: Arc<Registry>,
    pub reconciler: Reconciler,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub scheduler: Arc<SyncScheduler>,
}

impl AppState {
    /// Wires the sync engine around `db` and `registry`.
    pub fn new(config: Arc<AppConfig>, db: Arc<DatabaseConnection>, registry: Arc<Registry>) -> Self {
        let integrations = IntegrationRepository::new(Arc::clone(&db));
        let tracker = SyncRunTracker::new(Arc::clone(&db));
        let reconciler = Reconciler::new(Arc::new(FeedbackRepository::new(Arc::clone(&db))));

        let orchestrator = Arc::new(SyncOrchestrator::new(
            integrations.clone(),
            Arc::clone(&registry),
            reconciler.clone(),
            tracker.clone(),
            Duration::from_secs(config.scheduler.max_run_seconds),
        ));
        let scheduler = Arc::new(SyncScheduler::new(
            config.scheduler.clone(),
            integrations,
            tracker,
            Arc::clone(&orchestrator),
        ));

        Self {
            config,
            db,
            registry,
            reconciler,
            orchestrator,
            scheduler,
        }
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/sources", get(handlers::sources::list_sources))
        .route(
            "/integrations/{id}/sync",
            post(handlers::sync::trigger_sync),
        )
        .route(
            "/integrations/{id}/sync-logs",
            get(handlers::sync::list_sync_logs),
        )
        .route("/scheduler/run", post(handlers::sync::run_scheduler))
        .route(
            "/zapier-sync/{integration_id}",
            post(handlers::zapier::zapier_sync),
        )
        .route("/feedback", get(handlers::feedback::list_feedback))
        .route("/feedback/import", post(handlers::feedback::import_feedback))
        .route(
            "/feedback/{id}/analysis",
            put(handlers::feedback::put_analysis),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(protected)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(crate::telemetry::trace_context_middleware))
        .layer(CorsLayer::permissive())
}

/// Serves HTTP until `shutdown` fires, running the scheduler loop alongside
/// when enabled.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state.config.bind_addr()?;

    let scheduler_task = state.config.scheduler.enabled.then(|| {
        let scheduler = Arc::clone(&state.scheduler);
        tokio::spawn(scheduler.run(shutdown.clone()))
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, profile = %state.config.profile, "Server listening");

    let app = create_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    shutdown.cancel();
    if let Some(task) = scheduler_task {
        task.await?;
    }
    info!("Server stopped");
    Ok(())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::healthz,
        crate::handlers::readyz,
        crate::handlers::sources::list_sources,
        crate::handlers::sync::trigger_sync,
        crate::handlers::sync::list_sync_logs,
        crate::handlers::sync::run_scheduler,
        crate::handlers::zapier::zapier_sync,
        crate::handlers::feedback::list_feedback,
        crate::handlers::feedback::import_feedback,
        crate::handlers::feedback::put_analysis,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Source,
            crate::models::Priority,
            crate::models::FeedbackStatus,
            crate::models::SyncStatus,
            crate::error::ApiError,
            crate::connectors::ProviderMetadata,
            crate::connectors::AuthType,
            crate::connectors::Delivery,
            crate::connectors::ZapierPayload,
            crate::connectors::ZapierItem,
            crate::connectors::ManualImportRow,
            crate::orchestrator::SyncRunSummary,
            crate::scheduler::TickSummary,
            crate::reconciler::WebhookOutcome,
            crate::reconciler::ImportOutcome,
            crate::handlers::types::FeedbackInfo,
            crate::handlers::types::FeedbackListResponse,
            crate::handlers::types::SyncLogInfo,
            crate::handlers::types::SyncLogsResponse,
            crate::handlers::types::AnalysisPayload,
            crate::handlers::types::ImportRequest,
            crate::handlers::sources::SourcesResponse,
        )
    ),
    modifiers(&BearerAuth),
    info(
        title = "Feedback Sync API",
        description = "Multi-source feedback synchronization",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
