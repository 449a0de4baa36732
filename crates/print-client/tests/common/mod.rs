//! Shared test helpers: an in-memory connector with scriptable failures.

#![allow(unreachable_pub, dead_code)]

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thermalink_print_client::protocol::PrinterDevice;
use thermalink_print_client::{ChunkConfig, Connector, Link, LinkConfig, PrintError, ServiceId};

// ─── Wire: what the mock printer saw ─────────────────────────────────────────

#[derive(Default)]
struct WireState {
    received: Vec<u8>,
    write_sizes: Vec<usize>,
    connects: u32,
    connect_attempts: u32,
    closes: u32,
    services: Vec<ServiceId>,
    fail_connects: u32,
    fail_writes: VecDeque<io::ErrorKind>,
    unavailable: bool,
    panic_next_write: bool,
}

/// Shared view of everything a [`MockConnector`] and its links did.
#[derive(Clone, Default)]
pub struct Wire(Arc<Mutex<WireState>>);

impl Wire {
    fn state(&self) -> MutexGuard<'_, WireState> {
        self.0.lock().unwrap()
    }

    /// All bytes accepted by any link, in order.
    pub fn received(&self) -> Vec<u8> {
        self.state().received.clone()
    }

    /// Size of every accepted write call.
    pub fn write_sizes(&self) -> Vec<usize> {
        self.state().write_sizes.clone()
    }

    /// Successful `connect` calls.
    pub fn connects(&self) -> u32 {
        self.state().connects
    }

    /// Every `connect` call, failed or not.
    pub fn connect_attempts(&self) -> u32 {
        self.state().connect_attempts
    }

    /// `close` calls on open links.
    pub fn closes(&self) -> u32 {
        self.state().closes
    }

    /// Service ids requested, one per successful connect.
    pub fn services(&self) -> Vec<ServiceId> {
        self.state().services.clone()
    }

    /// Make the next `n` connects fail with `ConnectionRefused`.
    pub fn fail_next_connects(&self, n: u32) {
        self.state().fail_connects = n;
    }

    /// Fail the next write calls with these error kinds, one per call.
    pub fn fail_writes(&self, kinds: &[io::ErrorKind]) {
        self.state().fail_writes.extend(kinds.iter().copied());
    }

    /// Report the transport as missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Panic inside the next write call.
    pub fn panic_on_next_write(&self) {
        self.state().panic_next_write = true;
    }
}

// ─── Connector and link ──────────────────────────────────────────────────────

/// A connector whose links write into a shared [`Wire`].
pub struct MockConnector {
    wire: Wire,
}

impl MockConnector {
    pub fn new() -> (Self, Wire) {
        let wire = Wire::default();
        (Self { wire: wire.clone() }, wire)
    }
}

impl Connector for MockConnector {
    fn is_available(&self) -> Result<(), PrintError> {
        if self.wire.state().unavailable {
            return Err(PrintError::TransportUnavailable("bluetooth disabled".into()));
        }
        Ok(())
    }

    fn connect(
        &mut self,
        device: &PrinterDevice,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, PrintError> {
        let mut state = self.wire.state();
        state.connect_attempts += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(PrintError::ConnectionFailed {
                addr: device.address.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "page timeout"),
            });
        }
        state.connects += 1;
        state.services.push(service);
        Ok(Box::new(MockLink {
            wire: self.wire.clone(),
            open: true,
        }))
    }
}

struct MockLink {
    wire: Wire,
    open: bool,
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let panic_now = {
            let mut state = self.wire.state();
            std::mem::take(&mut state.panic_next_write)
        };
        // Released before panicking so the wire stays readable.
        if panic_now {
            panic!("mock link fault");
        }

        let mut state = self.wire.state();
        if let Some(kind) = state.fail_writes.pop_front() {
            if matches!(kind, io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset) {
                self.open = false;
            }
            return Err(io::Error::new(kind, "mock write failure"));
        }
        state.received.extend_from_slice(buf);
        state.write_sizes.push(buf.len());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Link for MockLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> io::Result<()> {
        if self.open {
            self.open = false;
            self.wire.state().closes += 1;
        }
        Ok(())
    }
}

// ─── Config helpers ──────────────────────────────────────────────────────────

/// A config with every delay removed.
pub fn fast_config() -> LinkConfig {
    let mut config = LinkConfig::default();
    config.chunk = ChunkConfig::unpaced(1024);
    config.probe_chunk = ChunkConfig::unpaced(512);
    config.retry.backoff = Duration::ZERO;
    config.retry.max_backoff = Duration::ZERO;
    config.connect.settle_delay = Duration::ZERO;
    config
}

/// Records every state-listener call.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<bool>>>);

impl Events {
    pub fn listener(&self) -> impl Fn(bool) + Send + 'static {
        let events = Arc::clone(&self.0);
        move |connected| events.lock().unwrap().push(connected)
    }

    pub fn take(&self) -> Vec<bool> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}
