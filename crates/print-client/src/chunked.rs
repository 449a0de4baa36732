//! Paced, chunked writes.
//!
//! Bluetooth SPP printers have small receive buffers and drop bytes when a
//! whole label arrives in one burst. [`ChunkedSender`] splits a payload into
//! fixed-size chunks, flushes after each, and pauses between them.

use std::io::Write;
use std::thread;

use crate::PrintError;
use crate::config::ChunkConfig;
use crate::error::io_error_breaks_link;

/// Progress of one transmission attempt.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TransmissionAttempt {
    /// Bytes acknowledged by the link in the current attempt.
    pub bytes_sent: usize,
    /// Chunks fully written in the current attempt.
    pub chunks_sent: usize,
    /// Attempts made before the current one.
    pub retries_used: u32,
}

/// Writes payloads in paced chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedSender {
    config: ChunkConfig,
    trace_io: bool,
}

impl ChunkedSender {
    /// Create a sender, rejecting a zero chunk size.
    pub fn new(config: ChunkConfig) -> Result<Self, PrintError> {
        config.validate()?;
        Ok(Self {
            config,
            trace_io: false,
        })
    }

    /// Emit a hex dump of every chunk at `trace` level.
    pub fn with_trace_io(mut self, trace_io: bool) -> Self {
        self.trace_io = trace_io;
        self
    }

    /// The pacing in use.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Write `data` to `out` and return the number of bytes written.
    pub fn send<W: Write + ?Sized>(&self, out: &mut W, data: &[u8]) -> Result<usize, PrintError> {
        let mut progress = TransmissionAttempt::default();
        self.send_tracked(out, data, &mut progress)?;
        Ok(progress.bytes_sent)
    }

    /// Write `data` to `out`, recording progress as chunks land.
    ///
    /// On failure `progress` holds everything written before the failing
    /// chunk. Empty input writes nothing and skips the settle delay.
    pub fn send_tracked<W: Write + ?Sized>(
        &self,
        out: &mut W,
        data: &[u8],
        progress: &mut TransmissionAttempt,
    ) -> Result<(), PrintError> {
        progress.bytes_sent = 0;
        progress.chunks_sent = 0;
        if data.is_empty() {
            return Ok(());
        }

        let total = data.len().div_ceil(self.config.chunk_size);
        for (i, chunk) in data.chunks(self.config.chunk_size).enumerate() {
            if self.trace_io {
                tracing::trace!(chunk = i + 1, hex = %hex_dump(chunk), "tx");
            }
            write_chunk(out, chunk)?;
            progress.bytes_sent += chunk.len();
            progress.chunks_sent += 1;
            tracing::debug!(
                chunk = i + 1,
                total,
                bytes = progress.bytes_sent,
                of = data.len(),
                "chunk written"
            );

            if i + 1 < total {
                pause(self.config.inter_chunk_delay);
            }
        }

        pause(self.config.settle_delay);
        Ok(())
    }
}

fn write_chunk<W: Write + ?Sized>(out: &mut W, chunk: &[u8]) -> Result<(), PrintError> {
    out.write_all(chunk)
        .and_then(|()| out.flush())
        .map_err(|e| {
            if io_error_breaks_link(&e) {
                tracing::warn!(error = %e, "link broke mid-write");
            }
            PrintError::WriteFailed(e)
        })
}

fn pause(d: std::time::Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}
