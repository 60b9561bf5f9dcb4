//! HTTP API handlers organized by area.

pub mod monitor;
pub mod snapshots;
pub mod system;

pub(crate) use monitor::{start_monitor, status, stop_monitor};
pub(crate) use snapshots::{get_snapshot, list_snapshots};
pub(crate) use system::{health, version};
