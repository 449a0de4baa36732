//! The transport session: one open link to one device.
//!
//! A session owns the links its [`Connector`] produces, remembers the last
//! target so it can reconnect, and reports every state change through an
//! optional listener.

use std::fmt;
use std::io::Write;

use thermalink_protocol::{Classifier, PrinterDevice, Protocol, ProtocolKind, niimbot};

use crate::chunked::{ChunkedSender, TransmissionAttempt};
use crate::config::ConnectConfig;
use crate::retry::CancelToken;
use crate::{Connector, Link, PrintError, Reconnectable, ServiceId};

/// Lifecycle of a [`TransportSession`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "state", content = "reason", rename_all = "snake_case"))]
pub enum ConnectionState {
    /// No link.
    #[default]
    Disconnected,
    /// A link is being opened.
    Connecting,
    /// The link is open and ready for jobs.
    Connected,
    /// The last open attempt failed.
    Failed(String),
}

impl ConnectionState {
    /// Whether a link is up.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// The device a session last opened, with its resolved protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The device.
    pub device: PrinterDevice,
    /// The caller's protocol selection.
    pub kind: ProtocolKind,
    /// The protocol the classifier resolved.
    pub protocol: Protocol,
}

/// Callback invoked with `true` on connect and `false` on disconnect or failure.
pub type StateListener = Box<dyn Fn(bool) + Send>;

/// Owns at most one open link.
pub struct TransportSession<C> {
    connector: C,
    classifier: Classifier,
    connect: ConnectConfig,
    link: Option<Box<dyn Link>>,
    state: ConnectionState,
    target: Option<Target>,
    listener: Option<StateListener>,
    cancel: CancelToken,
}

impl<C: Connector> TransportSession<C> {
    /// Create a disconnected session.
    pub fn new(connector: C, connect: ConnectConfig) -> Self {
        Self {
            connector,
            classifier: Classifier::default(),
            connect,
            link: None,
            state: ConnectionState::Disconnected,
            target: None,
            listener: None,
            cancel: CancelToken::new(),
        }
    }

    /// Use a custom classifier for `ProtocolKind::Auto`.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Abort the post-connect settle pause when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a state listener, replacing any previous one.
    pub fn set_listener(&mut self, listener: Option<StateListener>) {
        self.listener = listener;
    }

    /// Current state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The last target opened, kept across disconnects until
    /// [`forget()`](Self::forget).
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// The resolved protocol of the current target.
    pub fn protocol(&self) -> Option<Protocol> {
        self.target.as_ref().map(|t| t.protocol)
    }

    /// The connector behind this session.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether the session is connected and its link still reports open.
    pub fn is_live(&self) -> bool {
        self.state.is_connected() && self.link.as_ref().is_some_and(|l| l.is_open())
    }

    /// Open a link to `device`, closing any existing one first.
    ///
    /// The protocol is resolved from `kind` and the device's name and
    /// address. The target is remembered even if opening fails so a later
    /// [`reconnect()`](Reconnectable::reconnect) can try again.
    #[tracing::instrument(skip(self, device), fields(address = %device.address))]
    pub fn open(&mut self, device: PrinterDevice, kind: ProtocolKind) -> Result<Protocol, PrintError> {
        self.close();
        let protocol = self.classifier.classify_device(&device, kind);
        self.target = Some(Target {
            device,
            kind,
            protocol,
        });
        self.connect_target()
    }

    /// Close the link if one is open. Idempotent; always notifies `false`.
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.close() {
                tracing::warn!(error = %e, "error closing link");
            }
            tracing::info!("link closed");
        }
        self.state = ConnectionState::Disconnected;
        self.notify(false);
    }

    /// Close the link and drop the remembered target.
    pub fn forget(&mut self) {
        self.close();
        self.target = None;
    }

    /// Send `data` over the open link through `sender`.
    pub fn transmit(
        &mut self,
        sender: &ChunkedSender,
        data: &[u8],
        progress: &mut TransmissionAttempt,
    ) -> Result<(), PrintError> {
        let link = self.link.as_mut().ok_or(PrintError::NotConnected)?;
        if !link.is_open() {
            return Err(PrintError::LinkClosed);
        }
        sender.send_tracked(&mut **link, data, progress)
    }

    fn connect_target(&mut self) -> Result<Protocol, PrintError> {
        let target = self.target.clone().ok_or(PrintError::NoTarget)?;
        self.state = ConnectionState::Connecting;

        match self.establish(&target) {
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Connected;
                tracing::info!(address = %target.device.address, protocol = %target.protocol, "connected");
                self.notify(true);
                Ok(target.protocol)
            }
            Err(e) => {
                tracing::warn!(address = %target.device.address, error = %e, "connect failed");
                self.state = ConnectionState::Failed(e.to_string());
                self.notify(false);
                Err(e)
            }
        }
    }

    fn establish(&mut self, target: &Target) -> Result<Box<dyn Link>, PrintError> {
        self.connector.is_available()?;

        let service = ServiceId::for_protocol(target.protocol);
        let mut link = self.connector.connect(&target.device, service)?;

        if !self.connect.settle_delay.is_zero() && self.cancel.sleep(self.connect.settle_delay) {
            let _ = link.close();
            return Err(PrintError::Cancelled);
        }

        if !link.is_open() {
            let _ = link.close();
            return Err(PrintError::ConnectionFailed {
                addr: target.device.address.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "link closed during settle",
                ),
            });
        }

        if target.protocol == Protocol::Niimbot {
            let init = niimbot::init_frame();
            if let Err(e) = link.write_all(&init).and_then(|()| link.flush()) {
                let _ = link.close();
                return Err(PrintError::HandshakeFailed {
                    addr: target.device.address.clone(),
                    source: e,
                });
            }
            tracing::debug!("NIIMBOT init frame sent");
        }

        Ok(link)
    }

    fn notify(&self, connected: bool) {
        if let Some(listener) = &self.listener {
            listener(connected);
        }
    }
}

impl<C: Connector> Reconnectable for TransportSession<C> {
    fn reconnect(&mut self) -> Result<(), PrintError> {
        if self.target.is_none() {
            return Err(PrintError::NoTarget);
        }
        self.close();
        self.connect_target().map(|_| ())
    }
}

impl<C> Drop for TransportSession<C> {
    fn drop(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.close();
        }
    }
}

impl<C> fmt::Debug for TransportSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("state", &self.state)
            .field("target", &self.target)
            .field("link_open", &self.link.as_ref().map(|l| l.is_open()))
            .finish_non_exhaustive()
    }
}
