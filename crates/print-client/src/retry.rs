//! Retry with reconnection around a [`TransportSession`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant, SystemTime};

use crate::chunked::{ChunkedSender, TransmissionAttempt};
use crate::config::RetryConfig;
use crate::{Connector, PrintError, Reconnectable, TransportSession};

/// Granularity of cancellable sleeps.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// A shared flag that aborts an in-flight retry loop.
///
/// Clones share the flag. Cancellation is cooperative: it is checked before
/// each attempt and while sleeping between attempts, never mid-write.
///
/// Requests are counted. The token stays cancelled until every
/// [`cancel`](Self::cancel) has been matched by a [`release`](Self::release),
/// so the owner of one request cannot clear another's.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicUsize>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    /// Withdraw one request once it has been served.
    pub fn release(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    /// Clear every outstanding request.
    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }

    /// Whether any cancellation request is outstanding.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst) > 0
    }

    /// Sleep for `d`, waking early on cancellation. Returns `true` if cancelled.
    pub fn sleep(&self, d: Duration) -> bool {
        let deadline = Instant::now() + d;
        loop {
            if self.is_cancelled() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}

/// A successful delivery.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Delivery {
    /// Payload bytes written in the successful attempt.
    pub bytes: usize,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Drives payloads through a session, reconnecting and retrying on
/// transient failure.
#[derive(Debug, Clone)]
pub struct RetrySupervisor {
    config: RetryConfig,
}

impl RetrySupervisor {
    /// Create a supervisor, rejecting `max_attempts == 0`.
    pub fn new(config: RetryConfig) -> Result<Self, PrintError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The retry settings in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send `data` through `session`, retrying up to `max_attempts` times.
    ///
    /// Each attempt first reconnects if the session is not live; a failed
    /// reconnect uses up the attempt. Errors that are not retryable are
    /// returned as-is. A broken link is closed before the next attempt.
    /// After the last attempt the final error is wrapped in
    /// [`PrintError::RetriesExhausted`].
    pub fn deliver<C: Connector>(
        &self,
        session: &mut TransportSession<C>,
        sender: &ChunkedSender,
        data: &[u8],
        cancel: &CancelToken,
    ) -> Result<Delivery, PrintError> {
        let max = self.config.max_attempts;
        let mut progress = TransmissionAttempt::default();
        let mut last_error = PrintError::NotConnected;

        for attempt in 0..max {
            if cancel.is_cancelled() {
                return Err(PrintError::Cancelled);
            }
            progress.retries_used = attempt;

            let result = if session.is_live() {
                session.transmit(sender, data, &mut progress)
            } else {
                tracing::warn!(attempt = attempt + 1, "session not live, reconnecting");
                session
                    .reconnect()
                    .and_then(|()| session.transmit(sender, data, &mut progress))
            };

            match result {
                Ok(()) => {
                    tracing::info!(bytes = progress.bytes_sent, attempts = attempt + 1, "payload delivered");
                    return Ok(Delivery {
                        bytes: progress.bytes_sent,
                        attempts: attempt + 1,
                    });
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max,
                        bytes_sent = progress.bytes_sent,
                        error = %e,
                        "attempt failed"
                    );
                    if e.is_link_broken() {
                        session.close();
                    }
                    last_error = e;

                    // Don't sleep after the last attempt.
                    if attempt + 1 < max {
                        let delay = compute_delay(&self.config, attempt);
                        if cancel.sleep(delay) {
                            return Err(PrintError::Cancelled);
                        }
                    }
                }
            }
        }

        tracing::error!(attempts = max, error = %last_error, "retries exhausted");
        Err(PrintError::RetriesExhausted {
            attempts: max,
            last_error: Box::new(last_error),
        })
    }
}

/// Compute the pause after `attempt` (0-indexed).
///
/// Fixed: `backoff`. Exponential: `min(backoff * 2^attempt, max_backoff)`.
/// Either way optionally jittered into `[delay/2, delay]`.
pub(crate) fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = if config.exponential {
        config
            .backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(config.max_backoff)
    } else {
        config.backoff
    };

    if config.jitter {
        // System time nanoseconds as the entropy source.
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let half = delay / 2;
        let range = delay.as_nanos().saturating_sub(half.as_nanos());
        if range == 0 {
            return delay;
        }
        let offset = u64::try_from(u128::from(nanos) % range).unwrap_or(0);
        half + Duration::from_nanos(offset)
    } else {
        delay
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
