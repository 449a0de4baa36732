//! Typed errors for encoding and frame decoding.

use crate::model::Protocol;
use crate::niimbot::Command;

/// An input that cannot be represented in the target protocol.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A frame payload does not fit the one-byte length field.
    #[error("{command:?} payload too large ({size} bytes, max {max})")]
    PayloadTooLarge {
        /// The frame command that would have carried the payload.
        command: Command,
        /// Actual payload size in bytes.
        size: usize,
        /// Maximum representable payload size.
        max: usize,
    },

    /// The protocol has no layout for this template.
    #[error("{protocol} cannot render the {template} template")]
    UnsupportedTemplate {
        /// Protocol asked to render.
        protocol: Protocol,
        /// Template name.
        template: &'static str,
    },
}

/// A byte sequence that is not a well-formed NIIMBOT frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The input ended before the frame was complete.
    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required for the frame announced by the header.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },

    /// The first byte was not STX (0x02).
    #[error("expected STX (0x02), found 0x{found:02X}")]
    MissingStx {
        /// The byte found in place of STX.
        found: u8,
    },

    /// The byte after the payload was not ETX (0x03).
    #[error("expected ETX (0x03), found 0x{found:02X}")]
    MissingEtx {
        /// The byte found in place of ETX.
        found: u8,
    },

    /// The command byte is not one of the defined codes.
    #[error("unknown command code 0x{0:02X}")]
    UnknownCommand(u8),
}
