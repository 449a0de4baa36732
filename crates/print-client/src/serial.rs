//! Bluetooth SPP transport through an OS serial device, using the
//! `serialport` crate.
//!
//! Feature-gated behind the `serial` Cargo feature.
//!
//! The RFCOMM channel is bound outside the process (`rfcomm bind` on Linux,
//! an outgoing COM port on Windows, `/dev/tty.*` on macOS), so the service
//! id is only logged here. The device address is either the serial path
//! itself or a Bluetooth address looked up in the connector's port table.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

use thermalink_protocol::PrinterDevice;

use crate::error::io_error_breaks_link;
use crate::{Connector, Link, PrintError, ServiceId};

/// RFCOMM ignores the line rate; this only satisfies the tty layer.
const DEFAULT_BAUD: u32 = 115_200;

/// Opens [`SerialLink`]s.
#[derive(Debug, Clone)]
pub struct SerialConnector {
    baud: u32,
    timeout: Duration,
    ports: HashMap<String, String>,
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            timeout: Duration::from_secs(5),
            ports: HashMap::new(),
        }
    }
}

impl SerialConnector {
    /// A connector that treats every address as a serial path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    pub fn baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set the port read/write timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Route a Bluetooth address to a serial path (e.g. `/dev/rfcomm0`).
    pub fn bind(mut self, address: impl Into<String>, path: impl Into<String>) -> Self {
        self.ports
            .insert(address.into().to_ascii_uppercase(), path.into());
        self
    }

    /// The serial path used for `address`.
    pub fn path_for<'a>(&'a self, address: &'a str) -> &'a str {
        self.ports
            .get(&address.to_ascii_uppercase())
            .map_or(address, String::as_str)
    }

    /// List serial port names on the system.
    ///
    /// Built without `libudev`; Linux enumeration uses the sysfs fallback.
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.port_name)
            .collect()
    }
}

impl Connector for SerialConnector {
    fn is_available(&self) -> Result<(), PrintError> {
        serialport::available_ports()
            .map(|_| ())
            .map_err(|e| PrintError::TransportUnavailable(e.to_string()))
    }

    fn connect(
        &mut self,
        device: &PrinterDevice,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, PrintError> {
        let path = self.path_for(&device.address).to_string();
        tracing::debug!(%path, %service, "opening serial link");

        let port = serialport::new(&path, self.baud)
            .timeout(self.timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::InvalidInput => PrintError::SerialError(e.to_string()),
                _ => PrintError::ConnectionFailed {
                    addr: device.address.clone(),
                    source: io::Error::from(e),
                },
            })?;

        Ok(Box::new(SerialLink {
            port,
            path,
            open: true,
        }))
    }
}

/// An open serial port.
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
    path: String,
    open: bool,
}

impl SerialLink {
    /// The serial path in use.
    pub fn path(&self) -> &str {
        &self.path
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

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        let r = self.port.write(buf);
        self.track(r)
    }

    fn flush(&mut self) -> io::Result<()> {
        let r = self.port.flush();
        self.track(r)
    }
}

impl Link for SerialLink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> io::Result<()> {
        // The port handle closes on drop; marking it keeps later writes off it.
        self.open = false;
        Ok(())
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}
