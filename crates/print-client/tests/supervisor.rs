//! Session, chunked sender, and retry supervisor against an in-memory link.

mod common;

use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};

use common::{Events, MockConnector, Wire, fast_config};
use thermalink_print_client::protocol::{PrinterDevice, Protocol, ProtocolKind, niimbot};
use thermalink_print_client::{
    CancelToken, ChunkConfig, ChunkedSender, ConnectionState, PrintError, RetrySupervisor,
    ServiceId, TransportSession,
};

fn session() -> (TransportSession<MockConnector>, Wire) {
    let (connector, wire) = MockConnector::new();
    (TransportSession::new(connector, fast_config().connect), wire)
}

fn pos80() -> PrinterDevice {
    PrinterDevice::new("00:11:22:33:44:55").with_name("POS-80")
}

fn sender() -> ChunkedSender {
    ChunkedSender::new(ChunkConfig::unpaced(1024)).unwrap()
}

fn supervisor(max_attempts: u32) -> RetrySupervisor {
    let mut retry = fast_config().retry;
    retry.max_attempts = max_attempts;
    RetrySupervisor::new(retry).unwrap()
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[test]
fn open_generic_device_uses_serial_port_profile() {
    let (mut session, wire) = session();
    let protocol = session.open(pos80(), ProtocolKind::Auto).unwrap();

    assert_eq!(protocol, Protocol::Cpcl);
    assert_eq!(session.state(), &ConnectionState::Connected);
    assert!(session.is_live());
    assert_eq!(wire.services(), [ServiceId::SERIAL_PORT]);
    assert!(wire.received().is_empty(), "CPCL has no handshake");
}

#[test]
fn open_niimbot_sends_init_frame() {
    let (mut session, wire) = session();
    let device = PrinterDevice::new("00:00:00:00:00:01").with_name("NIIMBOT-B1");
    let protocol = session.open(device, ProtocolKind::Auto).unwrap();

    assert_eq!(protocol, Protocol::Niimbot);
    assert_eq!(wire.services(), [ServiceId::NIIMBOT]);
    assert_eq!(wire.received(), niimbot::init_frame());
    assert_eq!(wire.received(), [0x02, 0x00, 0x00, 0x03]);
}

#[test]
fn explicit_kind_overrides_classifier() {
    let (mut session, wire) = session();
    let device = PrinterDevice::new("C0:4E:30:00:00:01").with_name("niimbot");
    assert_eq!(session.open(device, ProtocolKind::Tspl).unwrap(), Protocol::Tspl);
    assert_eq!(wire.services(), [ServiceId::SERIAL_PORT]);
}

#[test]
fn unavailable_transport_fails_without_connecting() {
    let (mut session, wire) = session();
    wire.set_unavailable(true);

    let err = session.open(pos80(), ProtocolKind::Auto).unwrap_err();
    assert!(matches!(err, PrintError::TransportUnavailable(_)), "{err:?}");
    assert!(matches!(session.state(), ConnectionState::Failed(_)));
    assert!(!session.is_live());
    assert_eq!(wire.connects(), 0);
}

#[test]
fn listener_sees_every_transition() {
    let (mut session, _wire) = session();
    let events = Events::default();
    session.set_listener(Some(Box::new(events.listener())));

    session.open(pos80(), ProtocolKind::Auto).unwrap();
    // open() closes first, then reports the new link.
    assert_eq!(events.take(), [false, true]);

    session.close();
    session.close();
    assert_eq!(events.take(), [false, false]);
    assert_eq!(session.state(), &ConnectionState::Disconnected);
}

#[test]
fn close_keeps_target_and_forget_drops_it() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    session.close();
    assert_eq!(wire.closes(), 1);
    assert_eq!(session.protocol(), Some(Protocol::Cpcl));

    session.forget();
    assert!(session.target().is_none());
}

#[test]
fn reopen_closes_previous_link() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    session.open(pos80(), ProtocolKind::Tspl).unwrap();
    assert_eq!(wire.connects(), 2);
    assert_eq!(wire.closes(), 1);
}

// ─── Delivery ────────────────────────────────────────────────────────────────

#[test]
fn delivers_in_chunk_sized_writes() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();

    let sender = ChunkedSender::new(ChunkConfig::unpaced(4)).unwrap();
    let delivery = supervisor(3)
        .deliver(&mut session, &sender, b"0123456789", &CancelToken::new())
        .unwrap();

    assert_eq!(delivery.bytes, 10);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(wire.write_sizes(), [4, 4, 2]);
    assert_eq!(wire.received(), b"0123456789");
}

#[test]
fn transient_failure_retries_on_same_link() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    wire.fail_writes(&[ErrorKind::TimedOut]);

    let delivery = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap();

    assert_eq!(delivery.attempts, 2);
    assert_eq!(wire.connects(), 1, "link was not broken, no reconnect");
    assert_eq!(wire.received(), b"label");
}

#[test]
fn broken_link_is_reconnected() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    wire.fail_writes(&[ErrorKind::BrokenPipe]);

    let delivery = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap();

    assert_eq!(delivery.attempts, 2);
    assert_eq!(wire.connects(), 2);
    assert!(session.is_live());
    assert_eq!(wire.received(), b"label");
}

#[test]
fn failed_reconnect_uses_an_attempt() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    wire.fail_writes(&[ErrorKind::BrokenPipe]);
    wire.fail_next_connects(1);

    let delivery = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap();

    // write fails, reconnect fails, reconnect + write succeed
    assert_eq!(delivery.attempts, 3);
    assert_eq!(wire.received(), b"label");
}

#[test]
fn exhaustion_wraps_last_error() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    wire.fail_writes(&[ErrorKind::BrokenPipe; 3]);

    let err = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap_err();

    match err {
        PrintError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, PrintError::WriteFailed(_)));
        }
        other => panic!("expected RetriesExhausted, got: {other:?}"),
    }
    assert!(wire.received().is_empty());
}

#[test]
fn cancel_interrupts_settle_delay() {
    let (connector, wire) = MockConnector::new();
    let mut connect = fast_config().connect;
    connect.settle_delay = Duration::from_secs(10);
    let cancel = CancelToken::new();
    let mut session = TransportSession::new(connector, connect).with_cancel(cancel.clone());

    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });

    let start = Instant::now();
    let err = session.open(pos80(), ProtocolKind::Auto).unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, PrintError::Cancelled), "{err:?}");
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(matches!(session.state(), ConnectionState::Failed(_)));
    assert!(!session.is_live());
    assert_eq!(wire.closes(), 1, "settled link must be closed");
}

#[test]
fn dead_transport_stops_after_max_attempts() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    let connects_before = wire.connect_attempts();
    wire.fail_writes(&[ErrorKind::BrokenPipe]);
    wire.fail_next_connects(u32::MAX);

    let err = supervisor(4)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap_err();

    match err {
        PrintError::RetriesExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 4);
            assert!(
                matches!(*last_error, PrintError::ConnectionFailed { .. }),
                "{last_error:?}"
            );
        }
        other => panic!("expected RetriesExhausted, got: {other:?}"),
    }
    // One failed write, then one reconnect per remaining attempt.
    let connects_during = wire.connect_attempts() - connects_before;
    assert!(connects_during <= 4);
    assert_eq!(connects_during, 3);
    assert!(!session.is_live());
    assert!(wire.received().is_empty());
}

#[test]
fn unavailable_transport_during_reconnect_is_not_retried() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    wire.fail_writes(&[ErrorKind::BrokenPipe]);
    wire.set_unavailable(true);

    let err = supervisor(5)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap_err();

    assert!(matches!(err, PrintError::TransportUnavailable(_)), "{err:?}");
    assert_eq!(wire.connects(), 1);
}

#[test]
fn no_target_is_reported_immediately() {
    let (mut session, wire) = session();
    let err = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, PrintError::NoTarget), "{err:?}");
    assert_eq!(wire.connects(), 0);
}

#[test]
fn closed_session_reconnects_to_last_target() {
    let (mut session, wire) = session();
    let device = PrinterDevice::new("00:00:00:00:00:01").with_name("NIIMBOT-D11");
    session.open(device, ProtocolKind::Auto).unwrap();
    session.close();

    supervisor(3)
        .deliver(&mut session, &sender(), b"\x02\x06\x01\x00\x03", &CancelToken::new())
        .unwrap();

    // Two handshakes: the original open and the reconnect.
    let mut expected = niimbot::init_frame();
    expected.extend(niimbot::init_frame());
    expected.extend(b"\x02\x06\x01\x00\x03");
    assert_eq!(wire.received(), expected);
    assert_eq!(wire.services(), [ServiceId::NIIMBOT, ServiceId::NIIMBOT]);
}

#[test]
fn cancelled_token_stops_before_first_attempt() {
    let (mut session, wire) = session();
    session.open(pos80(), ProtocolKind::Auto).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = supervisor(3)
        .deliver(&mut session, &sender(), b"label", &cancel)
        .unwrap_err();
    assert!(matches!(err, PrintError::Cancelled));
    assert!(wire.received().is_empty());
}
