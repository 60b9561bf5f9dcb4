//! Snapshot browsing handlers.
//!
//! Every client-supplied path goes through [`resolve_within_root`] before
//! the filesystem is touched.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::io::ErrorKind;

use crate::constants::IMAGE_EXTENSIONS;
use crate::metrics;
use crate::security::{ConfinedPath, PathTraversalError, resolve_within_root};

use super::super::types::{SnapshotFile, SnapshotListQuery, SnapshotListResponse};
use super::super::{AppError, AppState, SharedState};

/// Characters left unescaped in URL path segments (RFC 3986 unreserved).
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// GET /snapshots - List images in a directory under the snapshot root.
///
/// A missing directory yields an empty list, not an error.
pub(crate) async fn list_snapshots(
    State(state): State<SharedState>,
    Query(query): Query<SnapshotListQuery>,
) -> Result<Json<SnapshotListResponse>, AppError> {
    let requested = query.dir.filter(|d| !d.trim().is_empty());
    let dir = match requested {
        Some(dir) => resolve_within_root(&state.snapshot_root, &dir).map_err(|e| {
            metrics::record_snapshot_request("list", "rejected");
            rejection(e, "invalid directory")
        })?,
        None => default_directory(&state).await?,
    };

    let files = match read_images(&dir).await {
        Ok(files) => files,
        Err(e) => {
            metrics::record_snapshot_request("list", "error");
            tracing::error!(dir = %dir.path().display(), error = %e, "Failed to list snapshots");
            return Err(e.into());
        },
    };

    metrics::record_snapshot_request("list", "ok");
    Ok(Json(SnapshotListResponse {
        dir: dir.display_relative(),
        files,
    }))
}

/// GET /snapshots/{*path} - Fetch a single image.
///
/// The final segment is the file name; everything before it is the
/// directory relative to the snapshot root.
pub(crate) async fn get_snapshot(
    State(state): State<SharedState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let confined = resolve_within_root(&state.snapshot_root, &path).map_err(|e| {
        metrics::record_snapshot_request("fetch", "rejected");
        rejection(e, "invalid path")
    })?;

    if confined.is_root() || !is_image(&confined.display_relative()) {
        metrics::record_snapshot_request("fetch", "missing");
        return Err(AppError::NotFound("snapshot not found".to_string()));
    }

    let bytes = match tokio::fs::read(confined.path()).await {
        Ok(bytes) => bytes,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::IsADirectory) => {
            metrics::record_snapshot_request("fetch", "missing");
            return Err(AppError::NotFound("snapshot not found".to_string()));
        },
        Err(e) => {
            metrics::record_snapshot_request("fetch", "error");
            tracing::error!(path = %confined.path().display(), error = %e, "Failed to read snapshot");
            return Err(e.into());
        },
    };

    metrics::record_snapshot_request("fetch", "ok");
    let content_type = mime_guess::from_path(confined.path())
        .first_or_octet_stream()
        .to_string();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// Last-used directory if it is readable and confined, otherwise the root.
async fn default_directory(state: &AppState) -> Result<ConfinedPath, AppError> {
    if let Some(hint) = state.hint.read().await {
        match resolve_within_root(&state.snapshot_root, &hint) {
            Ok(dir) => return Ok(dir),
            Err(e) => tracing::debug!(hint = %hint, error = %e, "Ignoring last directory hint"),
        }
    }
    resolve_within_root(&state.snapshot_root, "").map_err(|e| rejection(e, "invalid directory"))
}

fn rejection(error: PathTraversalError, message: &str) -> AppError {
    match error {
        PathTraversalError::RootUnavailable => {
            AppError::internal("snapshot root unavailable", error.to_string())
        },
        _ => AppError::bad_request(message),
    }
}

/// Regular image files in `dir`, sorted by name. A missing directory is empty.
async fn read_images(dir: &ConfinedPath) -> std::io::Result<Vec<SnapshotFile>> {
    let mut entries = match tokio::fs::read_dir(dir.path()).await {
        Ok(entries) => entries,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return Ok(Vec::new());
        },
        Err(e) => return Err(e),
    };

    let prefix = url_prefix(dir);
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        // Symlinks are not followed; only plain files are listed.
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !is_image(&name) {
            continue;
        }
        let url = format!("{prefix}{}", utf8_percent_encode(&name, SEGMENT));
        files.push(SnapshotFile { name, url });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// `/snapshots/<encoded dir segments>/`.
fn url_prefix(dir: &ConfinedPath) -> String {
    let mut prefix = String::from("/snapshots/");
    if !dir.is_root() {
        for segment in dir.display_relative().split('/') {
            prefix.extend(utf8_percent_encode(segment, SEGMENT));
            prefix.push('/');
        }
    }
    prefix
}

fn is_image(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}
