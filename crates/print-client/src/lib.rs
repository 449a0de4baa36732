//! thermalink print client: deliver encoded jobs to thermal printers.
//!
//! A [`Connector`] opens [`Link`]s (Bluetooth RFCOMM serial ports, TCP
//! bridges, or test doubles). A [`TransportSession`] owns one link at a time,
//! [`ChunkedSender`] paces writes for small printer buffers, and
//! [`RetrySupervisor`] retries and reconnects on transient failure. The
//! [`PrintService`] ties them together on a worker thread so callers never
//! block on the link.
//!
//! The core API is synchronous (`std::io`), with no async runtime required.
mod chunked;
mod config;
mod error;
mod retry;
#[cfg(feature = "serial")]
mod serial;
mod service;
mod service_id;
mod session;
#[cfg(feature = "tcp")]
mod tcp;

pub use chunked::{ChunkedSender, TransmissionAttempt};
pub use config::{ChunkConfig, ConnectConfig, LinkConfig, RetryConfig};
pub use error::{PrintError, PrintOutcome};
pub use retry::{CancelToken, Delivery, RetrySupervisor};
#[cfg(feature = "serial")]
pub use serial::{SerialConnector, SerialLink};
pub use service::{Completion, PrintService, PrintServiceBuilder};
pub use service_id::ServiceId;
pub use session::{ConnectionState, StateListener, Target, TransportSession};
#[cfg(feature = "tcp")]
pub use tcp::{DEFAULT_PORT, TcpConnector, TcpLink, resolve_bridge_addr};

pub use thermalink_protocol as protocol;

use std::io::{self, Write};

use thermalink_protocol::PrinterDevice;

// ── Traits ──────────────────────────────────────────────────────────────

/// An open byte stream to a printer.
///
/// Writes go through [`std::io::Write`]; implementations should report
/// `is_open() == false` once the peer is gone so the session can reconnect
/// instead of writing into a dead stream.
pub trait Link: Write + Send {
    /// Whether the stream is still usable.
    fn is_open(&self) -> bool;

    /// Close the stream. Closing an already closed link succeeds.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens links to devices. All transports implement this.
pub trait Connector: Send {
    /// Check that the transport itself can be used at all.
    ///
    /// Returns [`PrintError::TransportUnavailable`] when it cannot (no
    /// adapter, adapter disabled). The default reports available.
    fn is_available(&self) -> Result<(), PrintError> {
        Ok(())
    }

    /// Open a stream to `device` on the given service.
    fn connect(
        &mut self,
        device: &PrinterDevice,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, PrintError>;
}

impl<C: Connector + ?Sized> Connector for Box<C> {
    fn is_available(&self) -> Result<(), PrintError> {
        (**self).is_available()
    }

    fn connect(
        &mut self,
        device: &PrinterDevice,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, PrintError> {
        (**self).connect(device, service)
    }
}

/// Something that can re-establish its connection after a failure.
///
/// [`RetrySupervisor`] calls this whenever the session is not live at the
/// start of an attempt.
pub trait Reconnectable {
    /// Close the old connection (if any) and open a fresh one to the same
    /// target.
    fn reconnect(&mut self) -> Result<(), PrintError>;
}
