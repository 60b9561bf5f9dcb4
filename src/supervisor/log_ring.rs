//! Bounded, order-preserving buffer of captured monitor output.
//!
//! Lines from stdout, stderr and the supervisor itself all land in one
//! [`LogRing`]. Appends are serialized through [`SharedLogRing`], so the
//! recorded order is the order in which lines arrived at the ring, no matter
//! which stream produced them.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::LOG_CAPACITY;

/// Origin of a captured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Child stdout.
    Out,
    /// Child stderr.
    Err,
    /// Lifecycle notes written by the supervisor.
    Sys,
}

impl LogSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Out => "out",
            Self::Err => "err",
            Self::Sys => "sys",
        }
    }
}

/// A single captured line. Never mutated after it enters the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "t")]
    pub timestamp: i64,
    #[serde(rename = "src")]
    pub source: LogSource,
    pub text: String,
}

impl LogEntry {
    /// Creates an entry stamped with the current time.
    ///
    /// Embedded `\r` / `\n` characters are replaced with spaces so an entry
    /// is always exactly one line.
    pub fn new(source: LogSource, text: impl Into<String>) -> Self {
        Self::at(chrono::Utc::now().timestamp_millis(), source, text)
    }

    /// Creates an entry with an explicit timestamp.
    pub fn at(timestamp: i64, source: LogSource, text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.contains(['\r', '\n']) {
            text = text.replace(['\r', '\n'], " ");
        }
        Self {
            timestamp,
            source,
            text,
        }
    }
}

/// Fixed-capacity FIFO of [`LogEntry`] values.
#[derive(Debug, Clone)]
pub struct LogRing {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogRing {
    /// Creates a ring holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest one when full.
    pub fn append(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Returns the `k` most recent entries, oldest first.
    pub fn tail(&self, k: usize) -> Vec<LogEntry> {
        let start = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(start).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cloneable handle to a ring shared between writers and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedLogRing {
    inner: Arc<Mutex<LogRing>>,
}

impl SharedLogRing {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogRing::with_capacity(capacity))),
        }
    }

    pub fn append(&self, entry: LogEntry) {
        self.inner.lock().append(entry);
    }

    /// Stamps and appends a line.
    pub fn record(&self, source: LogSource, text: impl Into<String>) {
        self.append(LogEntry::new(source, text));
    }

    /// Point-in-time copy of the `k` most recent entries.
    pub fn tail(&self, k: usize) -> Vec<LogEntry> {
        self.inner.lock().tail(k)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
