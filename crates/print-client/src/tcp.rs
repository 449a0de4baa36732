//! TCP transport for network printers and serial-over-TCP bridges.
//!
//! Bluetooth printers are often reachable through an SPP-to-TCP bridge
//! (ser2net, ESP32 gateways), and many CPCL/TSPL printers also listen on a
//! RAW port. The device address is `host[:port]`, port 9100 by default.
//! The service id is meaningless on TCP and is only logged.

use std::io::{self, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use thermalink_protocol::PrinterDevice;

use crate::error::io_error_breaks_link;
use crate::{Connector, Link, PrintError, ServiceId};

/// Default RAW printing port.
pub const DEFAULT_PORT: u16 = 9100;

/// Resolve `host[:port]` to a socket address, defaulting the port.
///
/// Accepts `192.168.1.55`, `192.168.1.55:6101`, `[::1]:9100`, `::1`,
/// `bridge.local`, and `bridge.local:4000`. The first resolved address wins.
pub fn resolve_bridge_addr(input: &str) -> Result<SocketAddr, PrintError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(PrintError::InvalidAddress("empty address".into()));
    }
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    let first = |r: io::Result<std::vec::IntoIter<SocketAddr>>| r.ok().and_then(|mut a| a.next());
    first(input.to_socket_addrs())
        .or_else(|| first((input, DEFAULT_PORT).to_socket_addrs()))
        .ok_or_else(|| PrintError::NoAddressFound(input.to_string()))
}

/// Opens [`TcpLink`]s.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    write_timeout: Duration,
    keepalive: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(30),
            keepalive: Duration::from_secs(60),
        }
    }
}

impl TcpConnector {
    /// A connector with a 5 s connect timeout and 30 s write timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-write timeout.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Connector for TcpConnector {
    fn connect(
        &mut self,
        device: &PrinterDevice,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, PrintError> {
        let addr = resolve_bridge_addr(&device.address)?;
        tracing::debug!(%addr, %service, "opening TCP link");

        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|e| {
            if e.kind() == io::ErrorKind::TimedOut {
                PrintError::ConnectionTimeout {
                    addr: addr.to_string(),
                    timeout: self.connect_timeout,
                    source: e,
                }
            } else {
                PrintError::ConnectionFailed {
                    addr: addr.to_string(),
                    source: e,
                }
            }
        })?;

        self.configure(&stream).map_err(|e| PrintError::ConnectionFailed {
            addr: addr.to_string(),
            source: e,
        })?;

        Ok(Box::new(TcpLink {
            stream,
            addr,
            open: true,
        }))
    }
}

impl TcpConnector {
    /// TCP_NODELAY, keepalive via `socket2`, and the write timeout.
    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;

        let keepalive = TcpKeepalive::new().with_time(self.keepalive);
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        let keepalive = keepalive.with_interval(self.keepalive);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;

        stream.set_write_timeout(Some(self.write_timeout))
    }
}

/// An open TCP stream.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    addr: SocketAddr,
    open: bool,
}

impl TcpLink {
    /// The peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.addr
    }

    fn track<T>(&mut self, r: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &r
            && io_error_breaks_link(e)
        {
            self.open = false;
        }
        r
    }
}

impl Write for TcpLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        let r = self.stream.write(buf);
        self.track(r)
    }

    fn flush(&mut self) -> io::Result<()> {
        let r = self.stream.flush();
        self.track(r)
    }
}

impl Link for TcpLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> io::Result<()> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
