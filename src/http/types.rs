//! Request and response types for the control API.

use serde::{Deserialize, Serialize};

use crate::supervisor::LogEntry;

// =============================================================================
// Monitor Types
// =============================================================================

/// `POST /start` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub ok: bool,
    pub pid: u32,
}

/// `POST /stop` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct StopResponse {
    pub ok: bool,
}

/// `GET /status` body. `pid` serializes as `null` when idle.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub pid: Option<u32>,
    pub logs: Vec<LogEntry>,
}

// =============================================================================
// Snapshot Types
// =============================================================================

/// Query parameters for `GET /snapshots`.
#[derive(Debug, Deserialize)]
pub struct SnapshotListQuery {
    /// Directory relative to the snapshot root. Blank or missing means the
    /// last-used directory, falling back to the root.
    pub dir: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotListResponse {
    /// Listed directory relative to the root (`.` for the root).
    pub dir: String,
    pub files: Vec<SnapshotFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub name: String,
    /// Fetch URL, percent-encoded per segment.
    pub url: String,
}

// =============================================================================
// Common Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Version response.
#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub build: String,
}

/// Error response: `{error, pid?, detail?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
