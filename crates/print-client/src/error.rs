//! Typed error types for the print client.

use std::io;
use std::time::Duration;

use thermalink_protocol::EncodeError;

/// Everything that can go wrong between a print request and the printer.
///
/// Use [`PrintError::is_retryable()`] to separate transient link trouble
/// from permanent failures, and [`PrintError::is_link_broken()`] to decide
/// whether the current stream must be torn down before retrying.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    // -- Transport --
    /// The transport itself is missing or disabled (e.g. no Bluetooth adapter).
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    // -- Connection --
    /// The stream could not be opened.
    #[error("connection failed: {addr}")]
    ConnectionFailed {
        /// The device address that was attempted.
        addr: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The stream did not open within the configured timeout.
    #[error("connection timed out: {addr} ({timeout:?})")]
    ConnectionTimeout {
        /// The device address that was attempted.
        addr: String,
        /// The configured timeout that elapsed.
        timeout: Duration,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The stream opened but the protocol handshake failed.
    #[error("handshake failed: {addr}")]
    HandshakeFailed {
        /// The device address that was attempted.
        addr: String,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A send was attempted with no open stream.
    #[error("not connected")]
    NotConnected,

    /// No device has been opened, so there is nothing to reconnect to.
    #[error("no target device; open a connection first")]
    NoTarget,

    // -- I/O --
    /// Writing to the stream failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// The stream reports itself closed.
    #[error("link closed")]
    LinkClosed,

    // -- Encoding --
    /// The job cannot be represented in the device's protocol.
    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    // -- Retry --
    /// All attempts have been used.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Total number of attempts made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last_error: Box<PrintError>,
    },

    /// An explicit disconnect aborted the operation.
    #[error("cancelled by disconnect")]
    Cancelled,

    // -- Configuration --
    /// An invalid configuration was provided.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Address --
    /// The device address could not be parsed for this transport.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Name resolution found no addresses.
    #[error("no address found for: {0}")]
    NoAddressFound(String),

    // -- Serial --
    /// The serial port rejected its settings.
    #[error("serial port error: {0}")]
    SerialError(String),

    // -- Service --
    /// The print service worker is gone.
    #[error("print service stopped")]
    ServiceStopped,

    /// A caller-side wait elapsed before the result arrived.
    #[error("timed out after {0:?} waiting for result")]
    Timeout(Duration),

    /// An unexpected fault inside the service, caught at its boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error text fragments that indicate a dead link on stacks that report
/// everything as `ErrorKind::Other`.
const BROKEN_LINK_MARKERS: &[&str] = &[
    "broken pipe",
    "reset",
    "socket closed",
    "connection lost",
    "connection aborted",
];

impl PrintError {
    /// Returns `true` if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PrintError::ConnectionFailed { .. }
                | PrintError::ConnectionTimeout { .. }
                | PrintError::HandshakeFailed { .. }
                | PrintError::NotConnected
                | PrintError::WriteFailed(_)
                | PrintError::LinkClosed
        )
    }

    /// Returns `true` if the stream behind this error is unusable and must be
    /// closed before the next attempt.
    pub fn is_link_broken(&self) -> bool {
        match self {
            PrintError::LinkClosed => true,
            PrintError::WriteFailed(e) => io_error_breaks_link(e),
            _ => false,
        }
    }
}

/// Whether an I/O error means the underlying link is gone.
pub(crate) fn io_error_breaks_link(e: &io::Error) -> bool {
    if matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    ) {
        return true;
    }
    let text = e.to_string().to_lowercase();
    BROKEN_LINK_MARKERS.iter().any(|m| text.contains(m))
}

/// The uniform `(success, message)` result handed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrintOutcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Diagnostic text; always present on failure.
    pub message: Option<String>,
}

impl PrintOutcome {
    /// A successful outcome with no message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A failed outcome carrying the error's display chain.
    pub fn failed(err: &PrintError) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(s) = source {
            message.push_str(": ");
            message.push_str(&s.to_string());
            source = s.source();
        }
        Self {
            success: false,
            message: Some(message),
        }
    }
}

impl<T> From<&Result<T, PrintError>> for PrintOutcome {
    fn from(r: &Result<T, PrintError>) -> Self {
        match r {
            Ok(_) => PrintOutcome::ok(),
            Err(e) => PrintOutcome::failed(e),
        }
    }
}

impl<T> From<Result<T, PrintError>> for PrintOutcome {
    fn from(r: Result<T, PrintError>) -> Self {
        PrintOutcome::from(&r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermalink_protocol::Command;

    #[test]
    fn retryable_errors() {
        assert!(
            PrintError::ConnectionFailed {
                addr: "x".into(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "test"),
            }
            .is_retryable()
        );
        assert!(
            PrintError::HandshakeFailed {
                addr: "x".into(),
                source: io::Error::other("test"),
            }
            .is_retryable()
        );
        assert!(
            PrintError::WriteFailed(io::Error::new(io::ErrorKind::BrokenPipe, "test"))
                .is_retryable()
        );
        assert!(PrintError::LinkClosed.is_retryable());
        assert!(PrintError::NotConnected.is_retryable());
    }

    #[test]
    fn non_retryable_errors() {
        assert!(!PrintError::TransportUnavailable("no adapter".into()).is_retryable());
        assert!(!PrintError::NoTarget.is_retryable());
        assert!(!PrintError::Cancelled.is_retryable());
        assert!(!PrintError::InvalidConfig("x".into()).is_retryable());
        assert!(
            !PrintError::Encode(EncodeError::PayloadTooLarge {
                command: Command::PrintText,
                size: 300,
                max: 255,
            })
            .is_retryable()
        );
        assert!(
            !PrintError::RetriesExhausted {
                attempts: 3,
                last_error: Box::new(PrintError::LinkClosed),
            }
            .is_retryable()
        );
    }

    #[test]
    fn broken_link_by_kind() {
        for kind in [
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::NotConnected,
        ] {
            assert!(PrintError::WriteFailed(io::Error::new(kind, "x")).is_link_broken());
        }
        assert!(
            !PrintError::WriteFailed(io::Error::new(io::ErrorKind::TimedOut, "x"))
                .is_link_broken()
        );
    }

    #[test]
    fn broken_link_by_text() {
        let e = io::Error::other("bt socket closed, read return: -1");
        assert!(PrintError::WriteFailed(e).is_link_broken());
        let e = io::Error::other("Connection reset by peer");
        assert!(PrintError::WriteFailed(e).is_link_broken());
        assert!(!PrintError::WriteFailed(io::Error::other("busy")).is_link_broken());
    }

    #[test]
    fn outcome_carries_source_chain() {
        let err = PrintError::RetriesExhausted {
            attempts: 3,
            last_error: Box::new(PrintError::LinkClosed),
        };
        let outcome = PrintOutcome::failed(&err);
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("retries exhausted after 3 attempts: link closed")
        );
        assert_eq!(PrintOutcome::from(Ok::<(), PrintError>(())), PrintOutcome::ok());
    }
}
