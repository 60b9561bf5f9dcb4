//! Reassembly of byte chunks into complete output lines.
//!
//! Pipes deliver arbitrary chunks: a line may be split across reads, and a
//! read may hold several lines. [`LineAssembler`] keeps the unterminated tail
//! until a later chunk (or EOF) completes it.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::log_ring::{LogSource, SharedLogRing};
use crate::constants::{MAX_PENDING_LINE_BYTES, READ_CHUNK_SIZE};

/// Splits a byte stream into lines, holding partial lines between chunks.
#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: Vec<u8>,
}

impl LineAssembler {
    /// Feeds a chunk and returns every line it completed.
    ///
    /// Lines are decoded as UTF-8 (lossy) only once complete, so multi-byte
    /// characters split across chunks decode correctly. Empty lines are
    /// dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            if let Some(line) = take_line(&mut self.pending) {
                lines.push(line);
            }
            rest = &rest[pos + 1..];
        }

        self.pending.extend_from_slice(rest);
        if self.pending.len() >= MAX_PENDING_LINE_BYTES
            && let Some(line) = take_line(&mut self.pending)
        {
            lines.push(line);
        }

        lines
    }

    /// Flushes the held partial line, if any. Call at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        take_line(&mut self.pending)
    }

    /// Whether a partial line is being held.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let bytes = std::mem::take(buf);
    let line = bytes.strip_suffix(b"\r").unwrap_or(&bytes);
    if line.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(line).into_owned())
}

/// Reads `reader` until EOF, recording each completed line under `source`.
///
/// A trailing unterminated line is recorded when the stream closes. Read
/// errors end the capture; they are logged, never surfaced.
pub async fn capture_stream<R>(mut reader: R, source: LogSource, logs: SharedLogRing)
where
    R: AsyncRead + Unpin,
{
    let mut assembler = LineAssembler::default();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in assembler.push(&buf[..n]) {
                    logs.record(source, line);
                }
            },
            Err(e) => {
                tracing::warn!(source = source.as_str(), error = %e, "Monitor output read failed");
                break;
            },
        }
    }

    if let Some(line) = assembler.finish() {
        logs.record(source, line);
    }
}
