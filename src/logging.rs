//! Structured logging setup.
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Output format for the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self.format {
            LogFormat::Pretty => fmt::layer().with_target(true).boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(std::io::stdout)
                .boxed(),
            LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
        }
    }
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.filter())
        .try_init();
}

/// `req_` followed by a simple-form v4 UUID.
pub fn generate_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}

/// Logs request completion; server errors are logged at warn.
pub fn log_request_complete(
    request_id: &str,
    method: &str,
    path: &str,
    status: u16,
    duration_ms: u64,
) {
    if status >= 500 {
        tracing::warn!(request_id, method, path, status, duration_ms, "Request failed");
    } else {
        tracing::info!(request_id, method, path, status, duration_ms, "Request completed");
    }
}
