//! The print service: a session on a dedicated worker thread.
//!
//! Requests are queued on a channel and handled strictly in order, so a job
//! never interleaves with another job on the same link. Every request hands
//! back a [`Completion`] the caller can block on, poll, or drop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thermalink_protocol::{Classifier, Encoders, PrintJob, PrinterDevice, Protocol, ProtocolKind};

use crate::chunked::ChunkedSender;
use crate::config::LinkConfig;
use crate::retry::{CancelToken, Delivery, RetrySupervisor};
use crate::session::{ConnectionState, StateListener, TransportSession};
use crate::{Connector, PrintError, PrintOutcome};

// ── Completion ─────────────────────────────────────────────────────────

/// The pending result of a queued request.
#[derive(Debug)]
#[must_use = "a completion does nothing unless waited on"]
pub struct Completion<T> {
    rx: Receiver<Result<T, PrintError>>,
}

impl<T> Completion<T> {
    /// Block until the request finishes.
    pub fn wait(self) -> Result<T, PrintError> {
        self.rx.recv().unwrap_or(Err(PrintError::ServiceStopped))
    }

    /// Block for at most `timeout`.
    ///
    /// On [`PrintError::Timeout`] the request keeps running; its result is
    /// discarded.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, PrintError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(PrintError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(PrintError::ServiceStopped),
        }
    }

    /// Return the result if it is ready, without blocking.
    pub fn try_result(&self) -> Option<Result<T, PrintError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(PrintError::ServiceStopped)),
        }
    }

    /// Block and collapse the result into a [`PrintOutcome`].
    pub fn outcome(self) -> PrintOutcome {
        PrintOutcome::from(self.wait())
    }
}

// ── Requests ───────────────────────────────────────────────────────────

type Reply<T> = Sender<Result<T, PrintError>>;

enum Request {
    Connect {
        device: PrinterDevice,
        kind: ProtocolKind,
        reply: Reply<Protocol>,
    },
    Print {
        job: PrintJob,
        reply: Reply<Delivery>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    Shutdown,
}

// ── Builder ────────────────────────────────────────────────────────────

/// Configures and starts a [`PrintService`].
pub struct PrintServiceBuilder<C> {
    connector: C,
    config: LinkConfig,
    encoders: Encoders,
    classifier: Classifier,
    listener: Option<StateListener>,
}

impl<C: Connector + 'static> PrintServiceBuilder<C> {
    /// Link pacing, retry, and connect settings.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Encoder settings (copies, NIIMBOT feed/cut, TSPL QR options).
    pub fn encoders(mut self, encoders: Encoders) -> Self {
        self.encoders = encoders;
        self
    }

    /// Classifier used for `ProtocolKind::Auto`.
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Called on the worker thread with `true` on connect and `false` on
    /// disconnect or failure.
    pub fn on_state_change(mut self, listener: impl Fn(bool) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Validate the configuration and start the worker thread.
    pub fn spawn(self) -> Result<PrintService, PrintError> {
        self.config.validate()?;
        let cancel = CancelToken::new();
        let worker = Worker {
            supervisor: RetrySupervisor::new(self.config.retry.clone())?,
            job_sender: ChunkedSender::new(self.config.chunk)?.with_trace_io(self.config.trace_io),
            probe_sender: ChunkedSender::new(self.config.probe_chunk)?
                .with_trace_io(self.config.trace_io),
            encoders: self.encoders,
            session: TransportSession::new(self.connector, self.config.connect)
                .with_classifier(self.classifier)
                .with_cancel(cancel.clone()),
            cancel: cancel.clone(),
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
        };
        let state = Arc::clone(&worker.state);
        let listener = self.listener;

        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("thermalink-print".into())
            .spawn(move || worker.run(rx, listener))
            .map_err(|e| PrintError::Internal(format!("failed to spawn worker: {e}")))?;

        Ok(PrintService {
            tx,
            cancel,
            state,
            worker: Some(handle),
        })
    }
}

// ── Service ────────────────────────────────────────────────────────────

/// Non-blocking front end to one printer link.
///
/// # Example
///
/// ```rust,no_run
/// use thermalink_print_client::{PrintService, TcpConnector};
/// use thermalink_print_client::protocol::{PrintJob, PrinterDevice, ProtocolKind};
///
/// let service = PrintService::builder(TcpConnector::new()).spawn().unwrap();
/// let device = PrinterDevice::new("192.168.1.50").with_name("POS-80");
/// service.connect(device, ProtocolKind::Auto).wait().unwrap();
/// let outcome = service.print(PrintJob::text("hello")).outcome();
/// assert!(outcome.success);
/// ```
pub struct PrintService {
    tx: Sender<Request>,
    cancel: CancelToken,
    state: Arc<Mutex<ConnectionState>>,
    worker: Option<JoinHandle<()>>,
}

impl PrintService {
    /// Start configuring a service around `connector`.
    pub fn builder<C: Connector + 'static>(connector: C) -> PrintServiceBuilder<C> {
        PrintServiceBuilder {
            connector,
            config: LinkConfig::default(),
            encoders: Encoders::default(),
            classifier: Classifier::default(),
            listener: None,
        }
    }

    /// Open a link to `device`, closing any current one. Resolves to the
    /// protocol in use.
    pub fn connect(&self, device: PrinterDevice, kind: ProtocolKind) -> Completion<Protocol> {
        self.submit(|reply| Request::Connect {
            device,
            kind,
            reply,
        })
    }

    /// Encode `job` for the connected device and deliver it.
    pub fn print(&self, job: PrintJob) -> Completion<Delivery> {
        self.submit(|reply| Request::Print { job, reply })
    }

    /// Send a protocol-appropriate connectivity probe.
    pub fn probe(&self) -> Completion<Delivery> {
        self.print(PrintJob::Probe)
    }

    /// Close the link and forget the device.
    ///
    /// A job currently retrying is aborted with [`PrintError::Cancelled`]
    /// before its next attempt.
    pub fn disconnect(&self) -> Completion<()> {
        self.cancel.cancel();
        self.submit(|reply| Request::Disconnect { reply })
    }

    /// The state published after the most recent request.
    pub fn state(&self) -> ConnectionState {
        lock(&self.state).clone()
    }

    /// Whether the last published state is connected.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).is_connected()
    }

    fn submit<T>(&self, make: impl FnOnce(Reply<T>) -> Request) -> Completion<T> {
        let (reply, rx) = mpsc::channel();
        if let Err(mpsc::SendError(request)) = self.tx.send(make(reply)) {
            // The worker is gone; answer directly so `wait` does not hang.
            fail(request, || PrintError::ServiceStopped);
        }
        Completion { rx }
    }
}

impl Drop for PrintService {
    fn drop(&mut self) {
        self.cancel.cancel();
        let _ = self.tx.send(Request::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for PrintService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintService")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ── Worker ─────────────────────────────────────────────────────────────

struct Worker<C> {
    session: TransportSession<C>,
    supervisor: RetrySupervisor,
    job_sender: ChunkedSender,
    probe_sender: ChunkedSender,
    encoders: Encoders,
    cancel: CancelToken,
    state: Arc<Mutex<ConnectionState>>,
}

impl<C: Connector> Worker<C> {
    fn run(mut self, rx: Receiver<Request>, listener: Option<StateListener>) {
        self.session.set_listener(listener);
        tracing::debug!("print worker started");

        while let Ok(request) = rx.recv() {
            match request {
                Request::Connect {
                    device,
                    kind,
                    reply,
                } => {
                    let result = guarded(|| self.session.open(device, kind));
                    self.publish();
                    let _ = reply.send(result);
                }
                Request::Print { job, reply } => {
                    let result = guarded(|| self.print(&job));
                    self.publish();
                    let _ = reply.send(result);
                }
                Request::Disconnect { reply } => {
                    let result = guarded(|| {
                        self.session.forget();
                        Ok(())
                    });
                    self.cancel.release();
                    self.publish();
                    let _ = reply.send(result);
                }
                Request::Shutdown => break,
            }
        }

        self.session.forget();
        self.publish();
        tracing::debug!("print worker stopped");
    }

    fn print(&mut self, job: &PrintJob) -> Result<Delivery, PrintError> {
        let protocol = self.session.protocol().ok_or(PrintError::NoTarget)?;
        let payload = self.encoders.encode(protocol, job)?;
        let sender = if job.is_probe() {
            &self.probe_sender
        } else {
            &self.job_sender
        };
        self.supervisor
            .deliver(&mut self.session, sender, payload.as_bytes(), &self.cancel)
    }

    fn publish(&self) {
        *lock(&self.state) = self.session.state().clone();
    }
}

/// Run `f`, converting a panic into [`PrintError::Internal`].
fn guarded<T>(f: impl FnOnce() -> Result<T, PrintError>) -> Result<T, PrintError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(%message, "request panicked");
        Err(PrintError::Internal(message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

fn fail(request: Request, err: impl Fn() -> PrintError) {
    match request {
        Request::Connect { reply, .. } => {
            let _ = reply.send(Err(err()));
        }
        Request::Print { reply, .. } => {
            let _ = reply.send(Err(err()));
        }
        Request::Disconnect { reply } => {
            let _ = reply.send(Err(err()));
        }
        Request::Shutdown => {}
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
