//! HTTP surface: router, shared state, and the JSON handlers.
//!
//! Import triggers are fire-and-forget: the handler validates the request,
//! spawns the run, and acknowledges immediately. Progress is exposed via
//! `GET /api/status`, backed by the run's shared progress cell.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use helpsync_core::{ImportConfig, RunProgress, run_import};
use helpsync_shared::{AppConfig, RunParams, RunRequest};
use helpsync_upload::KbClient;

/// Default schedule for recurring imports: daily at midnight.
const DEFAULT_CRON_SCHEDULE: &str = "0 0 0 * * *";

/// Recurring imports look back one week by default, so a daily schedule
/// has comfortable overlap with the previous run.
const DEFAULT_CRON_LOOKBACK_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// State and router
// ---------------------------------------------------------------------------

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    progress: Arc<RunProgress>,
    scheduler: Arc<Mutex<Option<JobScheduler>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            progress: Arc::new(RunProgress::default()),
            scheduler: Arc::new(Mutex::new(None)),
        }
    }
}

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/health", get(health))
        .route("/api/import", post(trigger_import))
        .route("/api/cron", post(schedule_import))
        .route("/api/status", get(run_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Start one import in the background and acknowledge immediately.
async fn trigger_import(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> (StatusCode, Json<Value>) {
    let params = match RunParams::resolve(&request, &state.config) {
        Ok(params) => params,
        Err(e) => return rejection(e),
    };

    info!(mode = %params.mode, force = params.force, "import accepted");
    tokio::spawn(execute_import(
        state.config.clone(),
        params,
        state.progress.clone(),
    ));

    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "PENDING" })),
    )
}

/// Request body for `POST /api/cron`.
#[derive(Debug, Default, Deserialize)]
struct CronRequest {
    #[serde(flatten)]
    request: RunRequest,
    /// Six-field cron expression; defaults to daily at midnight.
    schedule: Option<String>,
    /// Run one import immediately, before the schedule kicks in.
    run: Option<bool>,
}

/// Register a recurring import on the given cron schedule.
async fn schedule_import(
    State(state): State<AppState>,
    Json(body): Json<CronRequest>,
) -> (StatusCode, Json<Value>) {
    let mut request = body.request;
    if request.previous_days.is_none() {
        request.previous_days = Some(DEFAULT_CRON_LOOKBACK_DAYS);
    }

    let params = match RunParams::resolve(&request, &state.config) {
        Ok(params) => params,
        Err(e) => return rejection(e),
    };

    let schedule = body
        .schedule
        .unwrap_or_else(|| DEFAULT_CRON_SCHEDULE.to_string());

    let job_config = state.config.clone();
    let job_params = params.clone();
    let job_progress = state.progress.clone();
    let job = match Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let config = job_config.clone();
        let params = job_params.clone();
        let progress = job_progress.clone();
        Box::pin(async move {
            execute_import(config, params, progress).await;
        })
    }) {
        Ok(job) => job,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": format!("invalid cron schedule {schedule:?}: {e}"),
                })),
            );
        }
    };

    let mut guard = state.scheduler.lock().await;
    let result = async {
        if guard.is_none() {
            let scheduler = JobScheduler::new().await?;
            scheduler.start().await?;
            *guard = Some(scheduler);
        }
        guard.as_ref().unwrap().add(job).await
    }
    .await;

    if let Err(e) = result {
        error!(error = %e, "failed to register cron job");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": format!("scheduler error: {e}") })),
        );
    }

    if body.run.unwrap_or(false) {
        tokio::spawn(execute_import(
            state.config.clone(),
            params,
            state.progress.clone(),
        ));
    }

    info!(%schedule, "recurring import scheduled");
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "SCHEDULED", "schedule": schedule })),
    )
}

/// Snapshot of the current (or most recent) run.
async fn run_status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.progress.snapshot();
    Json(json!(snapshot))
}

fn rejection(e: helpsync_shared::HelpsyncError) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "success": false, "message": e.to_string() })),
    )
}

// ---------------------------------------------------------------------------
// Background execution
// ---------------------------------------------------------------------------

/// Run one import to completion, reporting into the shared progress cell.
/// Errors are logged; the trigger surface has already responded.
async fn execute_import(config: Arc<AppConfig>, params: RunParams, progress: Arc<RunProgress>) {
    let import = ImportConfig::from(config.as_ref());

    let source = match helpsync_source::build_source(&params, &config) {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "could not build article source");
            return;
        }
    };

    let sink = match KbClient::new(
        &config.upload.base_url,
        config.upload.max_chunk_size,
        config.upload.overwrite,
        config.pipeline.dry_run,
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "could not build upload client");
            return;
        }
    };

    match run_import(&params, &import, source.as_ref(), sink, progress.as_ref()).await {
        Ok(report) => {
            info!(
                status = %report.status,
                uploaded = report.uploaded,
                failed = report.failed,
                "background import finished"
            );
        }
        Err(e) => error!(error = %e, "background import failed"),
    }
}
