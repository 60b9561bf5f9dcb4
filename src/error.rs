//! Error types for monitor supervision.
//!
//! Structured errors for supervisor operations, with HTTP status code
//! mappings for API responses.

/// Result type for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Supervisor errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A monitor process is already active.
    #[error("monitor already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    /// No monitor process is active.
    #[error("monitor not running")]
    NotRunning,

    /// The launch request failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The OS refused to launch the monitor.
    #[error("failed to start '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The termination signal could not be delivered.
    #[error("failed to stop pid {pid}: {source}")]
    KillFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    /// The supervisor task is gone (service shutting down).
    #[error("supervisor unavailable")]
    Unavailable,
}

impl Error {
    /// Create a spawn failure.
    pub fn spawn_failed(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailed {
            program: program.into(),
            source,
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }

    /// Get the appropriate HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyRunning { .. } | Self::NotRunning => 409,
            Self::InvalidRequest(_) => 400,
            Self::SpawnFailed { .. } | Self::KillFailed { .. } => 500,
            Self::Unavailable => 503,
        }
    }

    /// Get a client-facing summary (details go in a separate field).
    pub const fn client_message(&self) -> &str {
        match self {
            Self::AlreadyRunning { .. } => "monitor already running",
            Self::NotRunning => "monitor not running",
            Self::InvalidRequest(_) => "invalid request",
            Self::SpawnFailed { .. } => "failed to start monitor",
            Self::KillFailed { .. } => "failed to stop monitor",
            Self::Unavailable => "supervisor unavailable",
        }
    }
}
