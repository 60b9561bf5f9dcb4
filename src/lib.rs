// =============================================================================
// Lint Configuration
// =============================================================================

#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![allow(missing_debug_implementations)] // Supervisor handles wrap channels

// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::missing_panics_doc)] // Panics documented in main entry points
#![allow(clippy::module_name_repetitions)] // e.g., supervisor::SupervisorActor is clearer
#![allow(clippy::doc_markdown)] // Too many false positives in code docs
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation
#![allow(clippy::cast_possible_truncation)] // Intentional in timestamp and size math
#![allow(clippy::cast_sign_loss)] // Intentional in size calculations

//! snapwatch - HTTP control plane for a supervised screen monitor.
//!
//! One external monitor process at a time is started, stopped and observed
//! through a small JSON API, and the image snapshots it writes are browsable
//! under a confinement root.
//!
//! # Modules
//!
//! - [`supervisor`] - Single-instance process supervision and output capture
//! - [`security`] - Path confinement for snapshot requests
//! - [`http`] - axum router, handlers and server lifecycle
//! - [`config`] - TOML + environment configuration
//!
//! # Example
//!
//! ```no_run
//! use snapwatch::supervisor::{LaunchRequest, MonitorCommand, SharedLogRing, Supervisor};
//!
//! # async fn example() -> snapwatch::error::Result<()> {
//! let supervisor = Supervisor::spawn(
//!     MonitorCommand::python_script("CheckMonitor.py"),
//!     SharedLogRing::default(),
//! );
//!
//! let request = LaunchRequest {
//!     continuous: true,
//!     interval: Some(5.0),
//!     ..Default::default()
//! };
//! let pid = supervisor.start(&request).await?;
//! println!("monitor running as pid {pid}");
//! # Ok(())
//! # }
//! ```

/// Centralized constants for limits and defaults.
pub mod constants;

/// Service configuration and the last-used-directory hint.
pub mod config;

/// Supervisor error type with HTTP status mappings.
pub mod error;

/// HTTP control API.
pub mod http;

/// Structured logging setup.
pub mod logging;

/// Prometheus metrics.
pub mod metrics;

/// Path confinement.
///
/// ```
/// use snapwatch::security::resolve_within_root;
///
/// let root = std::env::temp_dir();
/// assert!(resolve_within_root(&root, "../outside").is_err());
/// ```
pub mod security;

/// Monitor process supervision.
pub mod supervisor;
