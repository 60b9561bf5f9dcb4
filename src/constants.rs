//! Centralized constants for limits and defaults.
//!
//! Magic numbers used by the supervisor and the HTTP API live here so the
//! limits can be audited in one place.

// =============================================================================
// Log Capture
// =============================================================================

/// Number of captured output lines kept in memory (oldest evicted first).
pub const LOG_CAPACITY: usize = 200;

/// Size of each read from the child's stdout/stderr pipes (8 KiB).
pub const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Longest partial line held while waiting for a terminator (64 KiB).
/// Anything longer is flushed as a line of its own.
pub const MAX_PENDING_LINE_BYTES: usize = 64 * 1024;

/// How long the exit watcher waits for the output consumers to drain
/// after the child has exited.
pub const OUTPUT_DRAIN_TIMEOUT_MILLIS: u64 = 250;

// =============================================================================
// Monitor Process
// =============================================================================

/// Environment variable overriding the interpreter used to run the monitor.
pub const PYTHON_ENV: &str = "SNAPWATCH_PYTHON";

/// Interpreter used when [`PYTHON_ENV`] is unset.
#[cfg(windows)]
pub const DEFAULT_PYTHON: &str = "py";

/// Interpreter used when [`PYTHON_ENV`] is unset.
#[cfg(not(windows))]
pub const DEFAULT_PYTHON: &str = "python3";

/// Monitor script launched by default.
pub const DEFAULT_MONITOR_SCRIPT: &str = "CheckMonitor.py";

/// How long service shutdown waits for a stopped monitor to exit.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// HTTP Server
// =============================================================================

/// Environment variable selecting the listen port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable selecting the bind address.
pub const HOST_ENV: &str = "HOST";

/// Listen port when neither the CLI, `PORT` nor the config file set one.
pub const DEFAULT_PORT: u16 = 3000;

/// Bind address default.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Maximum request body size (1 MiB). Launch requests are tiny.
pub const MAX_BODY_SIZE_BYTES: usize = 1024 * 1024;

// =============================================================================
// Snapshots
// =============================================================================

/// File extensions listed as snapshots (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Default location of the last-used-directory hint written by the monitor UI.
pub const DEFAULT_HINT_FILE: &str = "monitor_config.json";

/// Default service config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "snapwatch.toml";
