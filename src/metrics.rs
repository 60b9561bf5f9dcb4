//! Prometheus metrics for snapwatch.
#![allow(clippy::cast_precision_loss)]
//!
//! Metrics are exposed at `GET /metrics` in Prometheus text format. Recording
//! is a no-op until [`init_metrics`] installs the recorder, so library users
//! and tests that never call it pay nothing.
//!
//! # Metrics Exposed
//!
//! ## Request Metrics
//! - `snapwatch_http_requests_total` - Total HTTP requests (labels: method, path, status)
//! - `snapwatch_http_request_duration_seconds` - Request duration histogram
//!
//! ## Monitor Metrics
//! - `snapwatch_monitor_events_total` - Lifecycle events (labels: event)
//! - `snapwatch_monitor_running` - 1 while a monitor process is active
//!
//! ## Snapshot Metrics
//! - `snapwatch_snapshot_requests_total` - Snapshot requests (labels: operation, outcome)

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder. Later calls return the existing handle.
pub fn init_metrics() -> Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    register_metrics();

    let _ = PROMETHEUS_HANDLE.set(handle.clone());
    Ok(handle)
}

/// Gets the global Prometheus handle.
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

fn register_metrics() {
    describe_counter!(
        "snapwatch_http_requests_total",
        "Total number of HTTP requests"
    );
    describe_histogram!(
        "snapwatch_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    describe_counter!(
        "snapwatch_monitor_events_total",
        "Monitor lifecycle events (start, stop, exit, spawn_error)"
    );
    describe_gauge!(
        "snapwatch_monitor_running",
        "Whether a monitor process is currently running"
    );

    describe_counter!(
        "snapwatch_snapshot_requests_total",
        "Snapshot list and fetch requests by outcome"
    );
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Records an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let path = normalize_path(path);

    counter!(
        "snapwatch_http_requests_total",
        "method" => method.to_string(),
        "path" => path.clone(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "snapwatch_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path
    )
    .record(duration_secs);
}

/// Collapses client-chosen path segments so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    match path {
        "/start" | "/stop" | "/status" | "/snapshots" | "/health" | "/version" | "/metrics" => {
            path.to_string()
        },
        p if p.starts_with("/snapshots/") => "/snapshots/:path".to_string(),
        _ => "/:unmatched".to_string(),
    }
}

// =============================================================================
// Monitor Metrics
// =============================================================================

/// Records a monitor lifecycle event.
pub fn record_monitor_event(event: &str) {
    counter!(
        "snapwatch_monitor_events_total",
        "event" => event.to_string()
    )
    .increment(1);
}

pub fn set_monitor_running(running: bool) {
    gauge!("snapwatch_monitor_running").set(if running { 1.0 } else { 0.0 });
}

// =============================================================================
// Snapshot Metrics
// =============================================================================

/// Records a snapshot list/fetch outcome (`ok`, `rejected`, `missing`, `error`).
pub fn record_snapshot_request(operation: &str, outcome: &str) {
    counter!(
        "snapwatch_snapshot_requests_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// =============================================================================
// Metrics Rendering
// =============================================================================

/// Renders all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match get_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_keeps_fixed_routes() {
        assert_eq!(normalize_path("/status"), "/status");
        assert_eq!(normalize_path("/snapshots"), "/snapshots");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_path_collapses_snapshot_files() {
        assert_eq!(normalize_path("/snapshots/cam1/shot_001.png"), "/snapshots/:path");
        assert_eq!(normalize_path("/snapshots/a.png"), "/snapshots/:path");
    }

    #[test]
    fn test_normalize_path_unmatched() {
        assert_eq!(normalize_path("/wp-admin/login.php"), "/:unmatched");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_monitor_event("start");
        set_monitor_running(true);
        record_snapshot_request("list", "ok");
        record_http_request("GET", "/status", 200, 0.01);
    }
}
