//! Path confinement for the snapshot endpoints.
//!
//! [`resolve_within_root`] turns a client-supplied relative path into an
//! absolute one that lies inside the snapshot root. Containment is checked
//! on the resolved path, after `..` segments and symlinks have been applied,
//! never on the raw string.

mod error;

#[cfg(test)]
mod property_tests;

pub use error::PathTraversalError;

use std::path::{Component, Path, PathBuf};

use tracing::warn;

/// A path proven to resolve inside the snapshot root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    root: PathBuf,
    path: PathBuf,
}

impl ConfinedPath {
    /// Absolute, resolved path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path == self.root
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    /// The path relative to the root, `/`-separated. The root itself is `.`.
    pub fn display_relative(&self) -> String {
        let relative = self.path.strip_prefix(&self.root).unwrap_or(Path::new(""));
        let parts: Vec<_> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }
}

/// Resolves `user_path` against `root`, refusing anything that lands outside.
///
/// The empty string and `.` resolve to the root. Backslashes are treated as
/// separators on every platform. Each segment that exists on disk is
/// canonicalized as it is appended, so a symlink is followed before any `..`
/// that comes after it; segments that do not exist are applied lexically.
///
/// # Errors
///
/// - [`NullByte`](PathTraversalError::NullByte) - `user_path` contains `\0`
/// - [`AbsolutePath`](PathTraversalError::AbsolutePath) - rooted or drive-prefixed input
/// - [`EscapesRoot`](PathTraversalError::EscapesRoot) - the resolved path is outside `root`
/// - [`RootUnavailable`](PathTraversalError::RootUnavailable) - `root` cannot be canonicalized
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use snapwatch::security::resolve_within_root;
///
/// let root = Path::new("snapshots");
/// assert!(resolve_within_root(root, "2024/cam1").is_ok());
/// assert!(resolve_within_root(root, "../secret").is_err());
/// ```
pub fn resolve_within_root(root: &Path, user_path: &str) -> Result<ConfinedPath, PathTraversalError> {
    if user_path.contains('\0') {
        return Err(reject(&user_path.replace('\0', "\\0"), PathTraversalError::NullByte));
    }

    let normalized = user_path.replace('\\', "/");
    let relative = Path::new(&normalized);
    if relative.has_root() {
        return Err(reject(user_path, PathTraversalError::AbsolutePath));
    }

    let canonical_root = root.canonicalize().map_err(|e| {
        warn!(root = %root.display(), error = %e, "Snapshot root cannot be resolved");
        PathTraversalError::RootUnavailable
    })?;

    let mut resolved = canonical_root.clone();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                if let Ok(canonical) = resolved.canonicalize() {
                    resolved = canonical;
                }
            },
            Component::ParentDir => {
                resolved.pop();
            },
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject(user_path, PathTraversalError::AbsolutePath));
            },
        }
    }

    if !resolved.starts_with(&canonical_root) {
        return Err(reject(user_path, PathTraversalError::EscapesRoot));
    }

    Ok(ConfinedPath {
        root: canonical_root,
        path: resolved,
    })
}

fn reject(path: &str, error: PathTraversalError) -> PathTraversalError {
    warn!(
        security_event = "path_traversal_attempt",
        path = %path,
        reason = error.reason(),
        "Blocked snapshot path"
    );
    error
}
