//! Health and version handlers.

use axum::Json;

use super::super::types::{HealthResponse, VersionResponse};

/// GET /health - Health check.
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// GET /version - Version info.
pub(crate) async fn version() -> Json<VersionResponse> {
    let build = if cfg!(debug_assertions) { "debug" } else { "release" };
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: build.to_string(),
    })
}
