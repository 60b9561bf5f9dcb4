//! Service configuration.
//!
//! Settings come from `snapwatch.toml` in the working directory (optional),
//! then `HOST` / `PORT` from the environment, then command-line flags, each
//! layer overriding the previous one.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [monitor]
//! script = "CheckMonitor.py"
//!
//! [snapshots]
//! root = "."
//! hint_file = "monitor_config.json"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_HINT_FILE, DEFAULT_HOST, DEFAULT_MONITOR_SCRIPT, DEFAULT_PORT,
    HOST_ENV, PORT_ENV,
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSettings,
    pub monitor: MonitorSettings,
    pub snapshots: SnapshotSettings,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// How the monitor is launched.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Script passed to the interpreter as its first argument.
    pub script: PathBuf,
}

/// Snapshot browsing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Confinement root for every snapshot request.
    pub root: PathBuf,
    /// JSON file holding the last directory the monitor wrote to.
    pub hint_file: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            script: PathBuf::from(DEFAULT_MONITOR_SCRIPT),
        }
    }
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            hint_file: PathBuf::from(DEFAULT_HINT_FILE),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration and applies environment overrides.
    ///
    /// With `path`, the file must exist. Without it, `snapwatch.toml` is used
    /// when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    tracing::debug!(
                        path = %default_path.display(),
                        "Config file not found, using defaults"
                    );
                    Self::default()
                }
            },
        };
        config.apply_env();
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            port = config.server.port,
            root = %config.snapshots.root.display(),
            "Loaded configuration"
        );

        Ok(config)
    }

    /// Applies `HOST` and `PORT` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(HOST_ENV).filter(|h| !h.trim().is_empty()) {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = lookup(PORT_ENV) {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!(value = %port, error = %e, "Ignoring invalid PORT"),
            }
        }
    }
}

// =============================================================================
// Last Directory Hint
// =============================================================================

#[derive(Deserialize)]
struct HintFile {
    #[serde(default, alias = "lastDirectory", alias = "directory")]
    last_directory: Option<String>,
}

/// Read-only view of the monitor's last-used-directory file.
///
/// Every failure (missing file, bad JSON, blank value) reads as "no hint".
#[derive(Debug, Clone)]
pub struct LastDirectoryHint {
    path: PathBuf,
}

impl LastDirectoryHint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the hinted directory, if one can be read.
    pub async fn read(&self) -> Option<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => parse_hint(&content),
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "Last directory hint unavailable"
                );
                None
            },
        }
    }
}

fn parse_hint(content: &str) -> Option<String> {
    match serde_json::from_str::<HintFile>(content) {
        Ok(hint) => hint
            .last_directory
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable last directory hint");
            None
        },
    }
}
