//! Webhook HTTP server.
//!
//! Lets a CMS or CI job trigger a reindex over HTTP and inspect the remote
//! index and the last run.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/reindex` | Run a full sync and return its report |
//! | `GET`  | `/status` | Remote index statistics |
//! | `GET`  | `/report` | Last persisted run report |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! When the variable named by `[server].webhook_secret_env` is set, every
//! endpoint except `/health` requires `Authorization: Bearer <secret>`.
//!
//! # Status codes
//!
//! `/reindex` answers `200` whenever the run completed, successful or not;
//! the body's `success` field carries the outcome. `401` means a bad or
//! missing secret, `405` a wrong method, and `500` a run that died
//! unexpectedly. Every response body is JSON:
//!
//! ```json
//! { "error": { "code": "unauthorized", "message": "missing or invalid bearer token" } }
//! ```
//!
//! Runs are serialized: a second `POST /reindex` waits for the first to finish,
//! even when the first caller has already disconnected.

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::index::SearchIndex;
use crate::models::SyncReport;
use crate::report::read_report;
use crate::status::{index_status, status_from_config, IndexStatus};
use crate::sync::{sync_from_config, SyncOutcome, Synchronizer};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration (shared, immutable).
    config: Arc<Config>,
    /// Fixed index handle; when `None` a client is built from config per request.
    index: Option<Arc<dyn SearchIndex>>,
    /// Bearer secret; `None` disables authentication.
    secret: Option<String>,
    /// Held by the running sync task for the whole run.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Creates state for [`router`]. `secret` is compared against the
    /// `Authorization: Bearer` header.
    pub fn new(config: Config, index: Option<Arc<dyn SearchIndex>>, secret: Option<String>) -> Self {
        Self {
            config: Arc::new(config),
            index,
            secret,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Starts the webhook server on `[server].bind`.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_index(config, None).await
}

/// Starts the server with a fixed index handle instead of the configured
/// Algolia client.
pub async fn run_server_with_index(
    config: &Config,
    index: Option<Arc<dyn SearchIndex>>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let secret = config.server.webhook_secret();
    if secret.is_none() {
        tracing::warn!(
            variable = %config.server.webhook_secret_env,
            "no webhook secret configured, endpoints are unauthenticated"
        );
    }

    let app = router(AppState::new(config.clone(), index, secret));

    tracing::info!("webhook server listening on http://{}", bind_addr);
    println!("Webhook server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the router with all endpoints, CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/reindex", any(handle_reindex))
        .route("/status", any(handle_status))
        .route("/report", any(handle_report))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: "missing or invalid bearer token".to_string(),
    }
}

fn method_not_allowed(method: &Method, allowed: &Method) -> AppError {
    AppError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        code: "method_not_allowed".to_string(),
        message: format!("{} not allowed, use {}", method, allowed),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Checks method then bearer token, in that order.
fn guard(state: &AppState, method: &Method, allowed: Method, headers: &HeaderMap) -> Result<(), AppError> {
    if *method != allowed {
        return Err(method_not_allowed(method, &allowed));
    }
    let Some(secret) = &state.secret else {
        return Ok(());
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(()),
        _ => Err(unauthorized()),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ============ POST /reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    message: String,
    #[serde(rename = "indexName")]
    index_name: String,
    #[serde(flatten)]
    report: SyncReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<String>,
}

impl From<SyncOutcome> for ReindexResponse {
    fn from(outcome: SyncOutcome) -> Self {
        let message = if outcome.report.success {
            "Indexing completed"
        } else {
            "Indexing finished with errors"
        };
        Self {
            message: message.to_string(),
            index_name: outcome.index_name,
            report: outcome.report,
            skipped: outcome
                .skipped
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
        }
    }
}

async fn handle_reindex(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<ReindexResponse>, AppError> {
    guard(&state, &method, Method::POST, &headers)?;

    tracing::info!("reindex requested");

    let config = state.config.clone();
    let index = state.index.clone();
    let run_lock = state.run_lock.clone();
    // The task owns the guard so a dropped request cannot release it early.
    let task = tokio::spawn(async move {
        let _running = run_lock.lock_owned().await;
        match index {
            Some(index) => Synchronizer::new(&config, index.as_ref()).run().await,
            None => sync_from_config(&config).await,
        }
    });

    let outcome = task.await.map_err(|e| {
        tracing::error!(error = %e, "reindex task failed");
        internal(format!("indexing failed: {}", e))
    })?;

    Ok(Json(outcome.into()))
}

// ============ GET /status ============

async fn handle_status(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<IndexStatus>, AppError> {
    guard(&state, &method, Method::GET, &headers)?;

    let status = match &state.index {
        Some(index) => index_status(index.as_ref(), &state.config.retry.policy()).await,
        None => status_from_config(&state.config).await,
    };
    Ok(Json(status))
}

// ============ GET /report ============

#[derive(Serialize)]
struct ReportResponse {
    report: Option<SyncReport>,
}

async fn handle_report(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<ReportResponse>, AppError> {
    guard(&state, &method, Method::GET, &headers)?;

    let report = read_report(&state.config.report.path).map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(ReportResponse { report }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
