//! Siphon Web Server
//!
//! Axum-based REST API for the Siphon transaction ingestion service.
//!
//! Upload flow:
//! - POST /api/ingest validates the CSV header and a short row sample
//!   synchronously, then stages the file and schedules a background run
//! - The response is an acknowledgement (202), not a completion signal
//! - GET /api/runs/:id reports run status for polling
//!
//! Interrupted runs are marked failed on startup so status never lies
//! after a crash.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use siphon_core::{
    submit_ingestion, Database, IngestOptions, IngestionReceipt, IngestionRun, JobHandle, JobRunner,
};


/// Maximum file upload size (10 MB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Maximum number of runs a single listing request may return
pub const MAX_RUNS_LIMIT: i64 = 500;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Directory where uploads are staged before ingestion
    pub upload_dir: PathBuf,
    /// Ingestion tuning (batch size, retry policy, staged-file cleanup)
    pub ingest: IngestOptions,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            ingest: IngestOptions::default(),
            allowed_origins: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// Executes scheduled ingestion jobs (tests inject an inline runner)
    pub runner: Arc<dyn JobRunner>,
}

/// Runs ingestion jobs on tokio's blocking thread pool.
///
/// Ingestion is synchronous file and database work, so it must not run
/// on the async worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

impl JobRunner for TokioRunner {
    fn submit(&self, work: Box<dyn FnOnce() + Send + 'static>) -> JobHandle {
        tokio::task::spawn_blocking(work);
        JobHandle::next()
    }
}

/// Query parameters for listing runs
#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// POST /api/ingest - Upload a transactions CSV for ingestion
///
/// Expects multipart form with:
/// - file: CSV file (required, max 10MB)
///
/// The header and a short row sample are checked before this returns;
/// a malformed file is rejected with 400 and no run is recorded. On
/// success the file is staged, a background run is scheduled, and the
/// response carries the run id to poll.
pub async fn upload_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<IngestionReceipt>), AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut total_size: usize = 0;

    // Extract fields from multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            file_name = field
                .file_name()
                .map(str::to_string)
                .filter(|n| !n.is_empty());

            let bytes = field
                .bytes()
                .await
                .map_err(|_| AppError::bad_request("Failed to read file data"))?;
            total_size += bytes.len();

            // Check file size limit
            if total_size > MAX_UPLOAD_SIZE {
                return Err(AppError::bad_request(&format!(
                    "File too large. Maximum size is {} MB",
                    MAX_UPLOAD_SIZE / 1024 / 1024
                )));
            }

            file_data = Some(bytes.to_vec());
        }
    }

    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let file_name = file_name.unwrap_or_else(|| "upload.csv".to_string());

    let receipt = stage_and_submit(&state, &file_name, &file_data)?;
    Ok((StatusCode::ACCEPTED, Json(receipt)))
}

/// Stage upload bytes to disk and schedule an ingestion run.
///
/// Separated from multipart parsing so tests can drive it directly.
/// The staged copy is removed again if validation rejects the file.
pub fn stage_and_submit(
    state: &AppState,
    file_name: &str,
    data: &[u8],
) -> Result<IngestionReceipt, AppError> {
    std::fs::create_dir_all(&state.config.upload_dir)?;

    // Prefix with a fresh UUID so concurrent uploads of the same name
    // never collide in the staging directory
    let source_name = sanitize_file_name(file_name);
    let staged = state
        .config
        .upload_dir
        .join(format!("{}_{}", Uuid::new_v4(), source_name));
    std::fs::write(&staged, data)?;
    debug!("Staged upload at {}", staged.display());

    match submit_ingestion(
        &state.db,
        state.runner.as_ref(),
        &staged,
        &source_name,
        state.config.ingest.clone(),
    ) {
        Ok(receipt) => Ok(receipt),
        Err(e) => {
            // Rejected before a run was recorded; the staged copy has
            // no further use
            if let Err(re) = std::fs::remove_file(&staged) {
                warn!("Failed to remove staged file {}: {}", staged.display(), re);
            }
            Err(match e {
                siphon_core::Error::Format(msg) => AppError::bad_request(&msg),
                other => AppError::from(other),
            })
        }
    }
}

/// Keep only the final path component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() {
        "upload.csv".to_string()
    } else {
        base.to_string()
    }
}

/// GET /api/runs - List recent ingestion runs, newest first
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsQuery>,
) -> Result<Json<Vec<IngestionRun>>, AppError> {
    let limit = params.limit.max(1).min(MAX_RUNS_LIMIT);
    let runs = state.db.list_runs(limit)?;
    Ok(Json(runs))
}

/// GET /api/runs/:id - Fetch a single ingestion run
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<i64>,
) -> Result<Json<IngestionRun>, AppError> {
    let run = state
        .db
        .get_run(run_id)?
        .ok_or_else(|| AppError::not_found("Run not found"))?;
    Ok(Json(run))
}

/// GET /api/health - Liveness probe with transaction count
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let transactions = state.db.count_transactions()?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "transactions": transactions,
    })))
}

/// Create the application router
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_runner(db, config, Arc::new(TokioRunner))
}

/// Create the application router with an explicit job runner (for testing)
pub fn create_router_with_runner(
    db: Database,
    config: ServerConfig,
    runner: Arc<dyn JobRunner>,
) -> Router {
    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    let state = Arc::new(AppState { db, config, runner });

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(upload_csv))
        .route("/runs", get(list_runs))
        .route("/runs/:id", get(get_run));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        // Multipart bodies carry whole CSV files, so the 2 MB default is
        // too small
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16, config: ServerConfig) -> anyhow::Result<()> {
    // Mark any runs that were interrupted by a previous shutdown
    match db.recover_stuck_runs() {
        Ok(count) if count > 0 => {
            warn!(
                "Marked {} interrupted ingestion run(s) from previous session as failed",
                count
            );
        }
        Ok(_) => {}
        Err(e) => {
            warn!("Failed to check for interrupted runs: {}", e);
        }
    }

    let app = create_router(db, config);
    let addr = format!("{}:{}", host, port);
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
