//! Configuration types for the print client.
//!
//! With the `serde` feature every type deserializes from JSON; durations are
//! written as integer milliseconds (`*_ms` keys) and missing keys fall back
//! to the defaults below.

use std::time::Duration;

use crate::PrintError;

/// Complete link configuration: chunk pacing, retry, and connect settings.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LinkConfig {
    /// Pacing for regular jobs.
    pub chunk: ChunkConfig,
    /// Pacing for connectivity probes.
    pub probe_chunk: ChunkConfig,
    /// Retry budget and backoff.
    pub retry: RetryConfig,
    /// Connection establishment.
    pub connect: ConnectConfig,
    /// Emit hex dumps of every written chunk at `trace` level.
    pub trace_io: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            probe_chunk: ChunkConfig::probe(),
            retry: RetryConfig::default(),
            connect: ConnectConfig::default(),
            trace_io: false,
        }
    }
}

impl LinkConfig {
    /// Reject settings no link can honor.
    pub fn validate(&self) -> Result<(), PrintError> {
        self.chunk.validate()?;
        self.probe_chunk.validate()?;
        self.retry.validate()
    }
}

/// How a payload is split and paced on the wire.
///
/// Defaults suit Bluetooth SPP receivers with small input buffers:
/// 1024-byte chunks, 100 ms between chunks, 500 ms settle after the last.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChunkConfig {
    /// Maximum bytes per write. Must be at least 1.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    #[cfg_attr(feature = "serde", serde(rename = "inter_chunk_delay_ms", with = "millis"))]
    pub inter_chunk_delay: Duration,
    /// Pause after the final chunk so the printer can drain its buffer.
    #[cfg_attr(feature = "serde", serde(rename = "settle_delay_ms", with = "millis"))]
    pub settle_delay: Duration,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            inter_chunk_delay: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
        }
    }
}

impl ChunkConfig {
    /// Smaller, faster pacing for connectivity probes.
    pub fn probe() -> Self {
        Self {
            chunk_size: 512,
            inter_chunk_delay: Duration::from_millis(50),
            settle_delay: Duration::from_millis(200),
        }
    }

    /// No pacing at all, for links that buffer on their own (TCP bridges).
    pub fn unpaced(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            inter_chunk_delay: Duration::ZERO,
            settle_delay: Duration::ZERO,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), PrintError> {
        if self.chunk_size == 0 {
            return Err(PrintError::InvalidConfig("chunk_size must be >= 1".into()));
        }
        Ok(())
    }
}

/// Retry settings for transient failures.
///
/// The default is three attempts with a fixed 2 s pause. Set `exponential`
/// to double the pause each attempt, capped at `max_backoff`.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Pause between attempts.
    #[cfg_attr(feature = "serde", serde(rename = "backoff_ms", with = "millis"))]
    pub backoff: Duration,
    /// Double the pause on each attempt.
    pub exponential: bool,
    /// Upper bound for exponential backoff.
    #[cfg_attr(feature = "serde", serde(rename = "max_backoff_ms", with = "millis"))]
    pub max_backoff: Duration,
    /// Randomize each pause within `[delay/2, delay]`.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            exponential: false,
            max_backoff: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl RetryConfig {
    pub(crate) fn validate(&self) -> Result<(), PrintError> {
        if self.max_attempts == 0 {
            return Err(PrintError::InvalidConfig(
                "max_attempts must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Connection establishment settings.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectConfig {
    /// Pause after the stream opens, before the link is checked.
    #[cfg_attr(feature = "serde", serde(rename = "settle_delay_ms", with = "millis"))]
    pub settle_delay: Duration,
    /// Maximum time for the stream to open.
    #[cfg_attr(feature = "serde", serde(rename = "timeout_ms", with = "millis"))]
    pub timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
