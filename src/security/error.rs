//! Error types for path confinement.

use thiserror::Error;

/// Why a user-supplied path was refused.
///
/// Every variant except [`RootUnavailable`](Self::RootUnavailable) is an
/// input validation failure. A path that stays inside the root but does not
/// exist is not an error; see
/// [`ConfinedPath::exists`](super::ConfinedPath::exists).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathTraversalError {
    #[error("Path contains null bytes")]
    NullByte,
    #[error("Absolute paths are not allowed")]
    AbsolutePath,
    #[error("Path resolves outside the snapshot root")]
    EscapesRoot,
    #[error("Snapshot root cannot be resolved")]
    RootUnavailable,
}

impl PathTraversalError {
    /// Short reason tag for security logs.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NullByte => "null_byte",
            Self::AbsolutePath => "absolute_path",
            Self::EscapesRoot => "root_escape",
            Self::RootUnavailable => "root_unavailable",
        }
    }
}
