//! Monitor lifecycle handlers.

use axum::{Json, body::Bytes, extract::State};

use crate::constants::LOG_CAPACITY;
use crate::supervisor::LaunchRequest;

use super::super::types::{StartResponse, StatusResponse, StopResponse};
use super::super::{AppError, SharedState};

/// POST /start - Launch the monitor.
///
/// The body is optional; an empty body launches with no flags.
pub(crate) async fn start_monitor(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<StartResponse>, AppError> {
    let request = parse_launch_request(&body)?;
    let pid = state.supervisor.start(&request).await?;
    Ok(Json(StartResponse { ok: true, pid }))
}

/// POST /stop - Request termination of the running monitor.
pub(crate) async fn stop_monitor(
    State(state): State<SharedState>,
) -> Result<Json<StopResponse>, AppError> {
    state.supervisor.stop().await?;
    Ok(Json(StopResponse { ok: true }))
}

/// GET /status - Current state and the most recent output lines.
pub(crate) async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let current = state.supervisor.status().await;
    Json(StatusResponse {
        running: current.running,
        pid: current.pid,
        logs: state.supervisor.logs().tail(LOG_CAPACITY),
    })
}

fn parse_launch_request(body: &[u8]) -> Result<LaunchRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LaunchRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest {
        message: "invalid request".to_string(),
        detail: Some(e.to_string()),
    })
}
