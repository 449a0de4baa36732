//! NIIMBOT binary framing and encoder.
//!
//! Every frame is `[STX][CMD][LEN][PAYLOAD; LEN][ETX]` with STX = 0x02 and
//! ETX = 0x03. LEN is a single byte, so a payload carries at most 255 bytes;
//! longer payloads are rejected rather than truncated.
//!
//! A print interaction is one `INIT` frame, one or more content frames, and
//! one `FEED` frame, optionally followed by `CUT`.

use crate::encode::Encoder;
use crate::error::{EncodeError, FrameError};
use crate::model::{Label, Protocol};

/// Start of frame.
pub const STX: u8 = 0x02;
/// End of frame.
pub const ETX: u8 = 0x03;
/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Bytes framing a payload: STX, CMD, LEN, and ETX.
const OVERHEAD: usize = 4;

/// Frame command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Session initialization / handshake.
    Init = 0x00,
    /// Print a text run.
    PrintText = 0x01,
    /// Print a title/subtitle label.
    PrintLabel = 0x02,
    /// Print a QR code.
    PrintQr = 0x03,
    /// Print a barcode.
    PrintBarcode = 0x04,
    /// Feed media.
    Feed = 0x05,
    /// Cut media.
    Cut = 0x06,
}

impl Command {
    /// The wire byte.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = FrameError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        Ok(match b {
            0x00 => Command::Init,
            0x01 => Command::PrintText,
            0x02 => Command::PrintLabel,
            0x03 => Command::PrintQr,
            0x04 => Command::PrintBarcode,
            0x05 => Command::Feed,
            0x06 => Command::Cut,
            other => return Err(FrameError::UnknownCommand(other)),
        })
    }
}

/// One STX…ETX unit. The payload length always fits the LEN byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame, rejecting payloads longer than [`MAX_PAYLOAD`].
    pub fn new(command: Command, payload: impl Into<Vec<u8>>) -> Result<Self, EncodeError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(EncodeError::PayloadTooLarge {
                command,
                size: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self { command, payload })
    }

    /// The command code.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Append the wire form of this frame to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.reserve(self.payload.len() + OVERHEAD);
        out.push(STX);
        out.push(self.command.code());
        // `new` guarantees the length fits a byte.
        out.push(self.payload.len() as u8);
        out.extend_from_slice(&self.payload);
        out.push(ETX);
    }

    /// The wire form of this frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + OVERHEAD);
        self.write_to(&mut out);
        out
    }
}

/// Decode one frame from the start of `bytes`.
///
/// Returns the frame and the number of bytes it occupied.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
    if bytes.len() < OVERHEAD {
        return Err(FrameError::Truncated {
            needed: OVERHEAD,
            available: bytes.len(),
        });
    }
    if bytes[0] != STX {
        return Err(FrameError::MissingStx { found: bytes[0] });
    }
    let command = Command::try_from(bytes[1])?;
    let len = bytes[2] as usize;
    let total = len + OVERHEAD;
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    if bytes[total - 1] != ETX {
        return Err(FrameError::MissingEtx {
            found: bytes[total - 1],
        });
    }
    let frame = Frame {
        command,
        payload: bytes[3..3 + len].to_vec(),
    };
    Ok((frame, total))
}

/// Decode a contiguous stream of frames. Trailing bytes are an error.
pub fn decode_frames(mut bytes: &[u8]) -> Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let (frame, used) = decode_frame(bytes)?;
        frames.push(frame);
        bytes = &bytes[used..];
    }
    Ok(frames)
}

/// The INIT frame used both to start a job and as the connect handshake.
pub fn init_frame() -> Vec<u8> {
    vec![STX, Command::Init.code(), 0x00, ETX]
}

/// Settings for NIIMBOT output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NiimbotEncoder {
    /// Lines to feed after the content.
    pub feed_lines: u8,
    /// Append a CUT frame after the feed.
    pub cut: bool,
}

impl Default for NiimbotEncoder {
    fn default() -> Self {
        Self {
            feed_lines: 1,
            cut: false,
        }
    }
}

impl NiimbotEncoder {
    fn interaction(&self, content: &[Frame]) -> Result<Vec<u8>, EncodeError> {
        let mut out = init_frame();
        for frame in content {
            frame.write_to(&mut out);
        }
        Frame::new(Command::Feed, [self.feed_lines])?.write_to(&mut out);
        if self.cut {
            Frame::new(Command::Cut, [0x00])?.write_to(&mut out);
        }
        Ok(out)
    }
}

/// PRINT_LABEL payload: `[title_len][title][0x00][subtitle]`.
fn label_payload(label: &Label) -> Result<Vec<u8>, EncodeError> {
    let title = label.title.as_bytes();
    let subtitle = label.subtitle.as_bytes();
    let size = title.len() + subtitle.len() + 2;
    if size > MAX_PAYLOAD {
        return Err(EncodeError::PayloadTooLarge {
            command: Command::PrintLabel,
            size,
            max: MAX_PAYLOAD,
        });
    }
    let mut payload = Vec::with_capacity(size);
    // Bounded by the size check above.
    payload.push(title.len() as u8);
    payload.extend_from_slice(title);
    payload.push(0x00);
    payload.extend_from_slice(subtitle);
    Ok(payload)
}

impl Encoder for NiimbotEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Niimbot
    }

    fn encode_text(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        let frame = Frame::new(Command::PrintText, text.as_bytes())?;
        self.interaction(&[frame])
    }

    fn encode_label(&self, label: &Label) -> Result<Vec<u8>, EncodeError> {
        let mut content = vec![Frame::new(Command::PrintLabel, label_payload(label)?)?];
        if !label.barcode.is_empty() {
            content.push(Frame::new(Command::PrintBarcode, label.barcode.as_bytes())?);
        }
        if !label.qr_data.is_empty() {
            content.push(Frame::new(Command::PrintQr, label.qr_data.as_bytes())?);
        }
        self.interaction(&content)
    }

    fn encode_probe(&self) -> Vec<u8> {
        init_frame()
    }
}
