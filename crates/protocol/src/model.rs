//! Core data model: devices, protocol selection, and print jobs.

use std::fmt;
use std::str::FromStr;

use crate::template::Template;

/// Bonding state of a device as reported by the host's Bluetooth stack.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PairingState {
    /// Not bonded.
    #[default]
    None,
    /// Bonding in progress.
    Pairing,
    /// Bonded with the host.
    Paired,
}

/// A previously discovered printer. Owned by the caller, passed by value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PrinterDevice {
    /// Stable identifier: a Bluetooth address, serial path, or `host:port`.
    pub address: String,
    /// Advertised display name, if any. Used for classification and logs.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    /// Pairing state at discovery time.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pairing: PairingState,
}

impl PrinterDevice {
    /// A device known only by its address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            pairing: PairingState::None,
        }
    }

    /// Attach an advertised display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the pairing state.
    pub fn with_pairing(mut self, pairing: PairingState) -> Self {
        self.pairing = pairing;
        self
    }

    /// Name for log lines: the display name, or the address when unnamed.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }
}

/// Protocol selection supplied by the caller.
///
/// `Auto` delegates to the [`Classifier`](crate::Classifier); the other
/// variants force an encoder family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ProtocolKind {
    /// Pick the protocol from the device name and address.
    #[default]
    Auto,
    /// Force CPCL.
    Cpcl,
    /// Force TSPL.
    Tspl,
    /// Force the NIIMBOT binary protocol.
    Niimbot,
}

impl ProtocolKind {
    /// The forced protocol, or `None` for `Auto`.
    pub fn forced(self) -> Option<Protocol> {
        match self {
            ProtocolKind::Auto => None,
            ProtocolKind::Cpcl => Some(Protocol::Cpcl),
            ProtocolKind::Tspl => Some(Protocol::Tspl),
            ProtocolKind::Niimbot => Some(Protocol::Niimbot),
        }
    }
}

impl From<Protocol> for ProtocolKind {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Cpcl => ProtocolKind::Cpcl,
            Protocol::Tspl => ProtocolKind::Tspl,
            Protocol::Niimbot => ProtocolKind::Niimbot,
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolKind::Auto => f.write_str("auto"),
            ProtocolKind::Cpcl => f.write_str("cpcl"),
            ProtocolKind::Tspl => f.write_str("tspl"),
            ProtocolKind::Niimbot => f.write_str("niimbot"),
        }
    }
}

impl FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ProtocolKind::Auto),
            "cpcl" => Ok(ProtocolKind::Cpcl),
            "tspl" => Ok(ProtocolKind::Tspl),
            "niimbot" => Ok(ProtocolKind::Niimbot),
            other => Err(format!(
                "unknown protocol {other:?} (expected auto, cpcl, tspl, or niimbot)"
            )),
        }
    }
}

/// A concrete encoder family. Produced by classification, never `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Protocol {
    /// Line-oriented CPCL page description.
    Cpcl,
    /// Line-oriented TSPL label language.
    Tspl,
    /// NIIMBOT STX/CMD/LEN/PAYLOAD/ETX binary frames.
    Niimbot,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ProtocolKind::from(*self).fmt(f)
    }
}

/// The fields of a label print request. Empty strings mean "absent".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Label {
    /// Main heading, printed centered.
    pub title: String,
    /// Secondary line under the title.
    pub subtitle: String,
    /// Code 128 barcode content.
    pub barcode: String,
    /// QR code payload, treated as an opaque string.
    pub qr_data: String,
}

impl Label {
    /// A label with only a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set the subtitle.
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = subtitle.into();
        self
    }

    /// Set the barcode content.
    pub fn barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = barcode.into();
        self
    }

    /// Set the QR payload.
    pub fn qr_data(mut self, qr_data: impl Into<String>) -> Self {
        self.qr_data = qr_data.into();
        self
    }
}

/// A logical print request, converted to bytes by exactly one encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PrintJob {
    /// Free text. Each line becomes one text element.
    RawText {
        /// The text to print.
        text: String,
    },
    /// A structured label.
    Label(Label),
    /// A predefined document layout.
    Template(Template),
    /// A minimal command that checks link liveness without printing.
    Probe,
}

impl PrintJob {
    /// Shorthand for [`PrintJob::RawText`].
    pub fn text(text: impl Into<String>) -> Self {
        PrintJob::RawText { text: text.into() }
    }

    /// Whether this job is a probe (sent with the short-payload chunk profile).
    pub fn is_probe(&self) -> bool {
        matches!(self, PrintJob::Probe)
    }
}

/// Bytes ready for transmission, tagged with the protocol that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    protocol: Protocol,
    bytes: Vec<u8>,
}

impl EncodedPayload {
    /// Wrap encoder output.
    pub fn new(protocol: Protocol, bytes: Vec<u8>) -> Self {
        Self { protocol, bytes }
    }

    /// The protocol that produced these bytes.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing was encoded.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Take ownership of the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl AsRef<[u8]> for EncodedPayload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TestPage;

    #[test]
    fn protocol_kind_parses_case_insensitively() {
        assert_eq!("CPCL".parse::<ProtocolKind>().unwrap(), ProtocolKind::Cpcl);
        assert_eq!(" niimbot ".parse::<ProtocolKind>().unwrap(), ProtocolKind::Niimbot);
        assert!("escpos".parse::<ProtocolKind>().is_err());
    }

    #[test]
    fn auto_forces_nothing() {
        assert_eq!(ProtocolKind::Auto.forced(), None);
        assert_eq!(ProtocolKind::Tspl.forced(), Some(Protocol::Tspl));
    }

    #[test]
    fn device_label_falls_back_to_address() {
        let dev = PrinterDevice::new("00:11:22:33:44:55");
        assert_eq!(dev.label(), "00:11:22:33:44:55");
        assert_eq!(dev.with_name("B1").label(), "B1");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn print_job_json_shape() {
        let job: PrintJob =
            serde_json::from_str(r#"{"kind":"label","title":"A","qr_data":"Q"}"#).unwrap();
        assert_eq!(job, PrintJob::Label(Label::new("A").qr_data("Q")));

        let json = serde_json::to_string(&PrintJob::text("hi")).unwrap();
        assert_eq!(json, r#"{"kind":"raw_text","text":"hi"}"#);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn template_job_nests_its_tag() {
        let job: PrintJob =
            serde_json::from_str(r#"{"kind":"template","template":"test_page","printed_at":"now"}"#)
                .unwrap();
        assert_eq!(job, PrintJob::Template(Template::TestPage(TestPage::new("now"))));
    }
}
