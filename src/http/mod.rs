//! HTTP control API.
//!
//! ## Endpoints
//!
//! ### Monitor
//! - `POST /start` - Launch the monitor (JSON launch options, body optional)
//! - `POST /stop` - Request monitor termination
//! - `GET /status` - Running state, pid and recent output
//!
//! ### Snapshots
//! - `GET /snapshots?dir=` - List images in a directory under the snapshot root
//! - `GET /snapshots/{*path}` - Fetch one image; the last segment is the file name
//!
//! ### System
//! - `GET /health` - Health check
//! - `GET /version` - Version info
//! - `GET /metrics` - Prometheus metrics

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::Instrument;

use crate::config::{LastDirectoryHint, ServiceConfig};
use crate::constants::{MAX_BODY_SIZE_BYTES, SHUTDOWN_TIMEOUT_SECS};
use crate::error::Error;
use crate::logging;
use crate::metrics;
use crate::supervisor::{MonitorCommand, SharedLogRing, Supervisor};

pub mod handlers;
pub mod types;

pub use types::*;

use handlers::{get_snapshot, health, list_snapshots, start_monitor, status, stop_monitor, version};


// =============================================================================
// App State
// =============================================================================

/// Shared state for HTTP handlers.
pub struct AppState {
    supervisor: Supervisor,
    snapshot_root: PathBuf,
    hint: LastDirectoryHint,
}

impl AppState {
    pub fn new(supervisor: Supervisor, snapshot_root: impl Into<PathBuf>, hint: LastDirectoryHint) -> Self {
        Self {
            supervisor,
            snapshot_root: snapshot_root.into(),
            hint,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }
}

pub type SharedState = Arc<AppState>;

// =============================================================================
// Server
// =============================================================================

/// Builds the API router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // Monitor
        .route("/start", post(start_monitor))
        .route("/stop", post(stop_monitor))
        .route("/status", get(status))
        // Snapshots
        .route("/snapshots", get(list_snapshots))
        .route("/snapshots/{*path}", get(get_snapshot))
        // Observability
        .route("/metrics", get(metrics_endpoint))
        // System endpoints
        .route("/health", get(health))
        .route("/version", get(version))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE_BYTES))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(metrics_middleware))
}

/// Starts the service with `config` and runs until SIGINT / SIGTERM.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let _metrics_handle = metrics::init_metrics()?;
    tracing::info!("Prometheus metrics initialized");

    let command = MonitorCommand::python_script(&config.monitor.script);
    tracing::info!(
        interpreter = %command.program().to_string_lossy(),
        script = %config.monitor.script.display(),
        "Monitor command configured"
    );

    if let Err(e) = std::fs::canonicalize(&config.snapshots.root) {
        tracing::warn!(
            root = %config.snapshots.root.display(),
            error = %e,
            "Snapshot root is not accessible; snapshot requests will fail"
        );
    }

    let supervisor = Supervisor::spawn(command, SharedLogRing::default());
    let state = Arc::new(AppState::new(
        supervisor,
        config.snapshots.root.clone(),
        LastDirectoryHint::new(&config.snapshots.hint_file),
    ));

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind to {}:{}",
                config.server.host, config.server.port
            )
        })?;

    run(listener, state, shutdown_signal()).await
}

/// Serves `state` on `listener` until `shutdown` resolves, then stops the
/// monitor.
pub async fn run<F>(listener: TcpListener, state: SharedState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("Failed to read listener address")?;
    tracing::info!("Starting snapwatch HTTP API on {}", addr);

    let supervisor = state.supervisor.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    graceful_shutdown(&supervisor).await;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping snapwatch...");
}

async fn graceful_shutdown(supervisor: &Supervisor) {
    tracing::info!("Starting graceful shutdown...");
    supervisor
        .shutdown(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS))
        .await;
    tracing::info!("Graceful shutdown complete");
}

// =============================================================================
// Middleware
// =============================================================================

/// Tags each request with a `req_<uuid>` id, logs completion, and echoes
/// the id in `x-request-id`.
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = logging::generate_request_id();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );
    let mut response = next.run(request).instrument(span).await;

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    logging::log_request_complete(
        &request_id,
        &method,
        &path,
        response.status().as_u16(),
        duration_ms,
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Records HTTP request metrics.
async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// GET /metrics - Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::render_metrics(),
    )
}

// =============================================================================
// Error Handling
// =============================================================================

/// Handler errors, rendered as [`ErrorResponse`] bodies.
#[derive(Debug)]
pub(crate) enum AppError {
    NotFound(String),
    BadRequest {
        message: String,
        detail: Option<String>,
    },
    Internal {
        message: String,
        detail: Option<String>,
    },
    /// Supervisor failures, rendered with [`Error::status_code`].
    Supervisor(Error),
}

impl AppError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            detail: None,
        }
    }

    pub(crate) fn internal(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::NotFound(error) => (StatusCode::NOT_FOUND, ErrorResponse {
                error,
                pid: None,
                detail: None,
            }),
            Self::BadRequest { message, detail } => (StatusCode::BAD_REQUEST, ErrorResponse {
                error: message,
                pid: None,
                detail,
            }),
            Self::Internal { message, detail } => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse {
                    error: message,
                    pid: None,
                    detail,
                })
            },
            Self::Supervisor(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let (pid, detail) = match &err {
                    Error::AlreadyRunning { pid } => (Some(*pid), None),
                    Error::InvalidRequest(reason) => (None, Some(reason.clone())),
                    Error::SpawnFailed { .. } | Error::KillFailed { .. } => {
                        (None, Some(err.to_string()))
                    },
                    _ => (None, None),
                };
                (status, ErrorResponse {
                    error: err.client_message().to_string(),
                    pid,
                    detail,
                })
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self::Supervisor(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal("internal error", err.to_string())
    }
}
