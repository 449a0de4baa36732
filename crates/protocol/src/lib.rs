//! thermalink protocol library.
//!
//! Pure encoders for the three printer command languages (CPCL, TSPL, and
//! the NIIMBOT binary frame protocol), the device classifier that picks one
//! of them, and the data model shared with the transport crate. Nothing in
//! this crate performs I/O.

#![warn(missing_docs)]

/// Device protocol classification.
pub mod classify;
/// CPCL encoder.
pub mod cpcl;
/// The encoder trait and protocol dispatch.
pub mod encode;
/// Encoding and frame-decoding errors.
pub mod error;
/// Devices, protocol selection, jobs, and payloads.
pub mod model;
/// NIIMBOT frames and encoder.
pub mod niimbot;
/// Predefined document layouts.
pub mod template;
/// TSPL encoder.
pub mod tspl;

// ── Convenience re-exports ──────────────────────────────────────────────────

pub use classify::{Classification, Classifier, Reason, classify};
pub use cpcl::{CpclEncoder, CpclForm};
pub use encode::{Encoder, Encoders, encode_job};
pub use error::{EncodeError, FrameError};
pub use model::{EncodedPayload, Label, PairingState, PrintJob, PrinterDevice, Protocol, ProtocolKind};
pub use niimbot::{Command, Frame, NiimbotEncoder, decode_frame, decode_frames};
pub use template::{ParkingTicket, ProductLabel, Receipt, ReceiptItem, Template, TestPage, format_amount};
pub use tspl::{QrEcc, TsplEncoder};
