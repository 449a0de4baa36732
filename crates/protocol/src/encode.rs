//! The encoder seam and protocol dispatch.

use crate::cpcl::CpclEncoder;
use crate::error::EncodeError;
use crate::model::{EncodedPayload, Label, PrintJob, Protocol};
use crate::niimbot::NiimbotEncoder;
use crate::template::Template;
use crate::tspl::TsplEncoder;

/// Turns logical print requests into protocol bytes. Implementations are
/// pure: the same input always yields the same bytes, and nothing is written
/// anywhere.
pub trait Encoder {
    /// The protocol this encoder speaks.
    fn protocol(&self) -> Protocol;

    /// Encode free text. Blank text still produces a complete, harmless job.
    fn encode_text(&self, text: &str) -> Result<Vec<u8>, EncodeError>;

    /// Encode a structured label.
    fn encode_label(&self, label: &Label) -> Result<Vec<u8>, EncodeError>;

    /// A minimal command that exercises the link without visible output.
    fn encode_probe(&self) -> Vec<u8>;

    /// Render a predefined layout. Protocols without one refuse it.
    fn encode_template(&self, template: &Template) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::UnsupportedTemplate {
            protocol: self.protocol(),
            template: template.name(),
        })
    }

    /// Encode any job into a tagged payload.
    fn encode(&self, job: &PrintJob) -> Result<EncodedPayload, EncodeError> {
        let bytes = match job {
            PrintJob::RawText { text } => self.encode_text(text)?,
            PrintJob::Label(label) => self.encode_label(label)?,
            PrintJob::Template(template) => self.encode_template(template)?,
            PrintJob::Probe => self.encode_probe(),
        };
        Ok(EncodedPayload::new(self.protocol(), bytes))
    }
}

/// One configured encoder per protocol family.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Encoders {
    /// CPCL encoder settings.
    pub cpcl: CpclEncoder,
    /// TSPL encoder settings.
    pub tspl: TsplEncoder,
    /// NIIMBOT encoder settings.
    pub niimbot: NiimbotEncoder,
}

impl Encoders {
    /// Borrow the encoder for `protocol`.
    pub fn for_protocol(&self, protocol: Protocol) -> &dyn Encoder {
        match protocol {
            Protocol::Cpcl => &self.cpcl,
            Protocol::Tspl => &self.tspl,
            Protocol::Niimbot => &self.niimbot,
        }
    }

    /// Encode `job` with the encoder for `protocol`.
    pub fn encode(&self, protocol: Protocol, job: &PrintJob) -> Result<EncodedPayload, EncodeError> {
        let payload = self.for_protocol(protocol).encode(job)?;
        tracing::debug!(%protocol, bytes = payload.len(), "encoded job");
        Ok(payload)
    }
}

/// Encode `job` for `protocol` with default encoder settings.
pub fn encode_job(protocol: Protocol, job: &PrintJob) -> Result<EncodedPayload, EncodeError> {
    Encoders::default().encode(protocol, job)
}

/// Replace line breaks so a field cannot terminate its directive early.
pub(crate) fn one_line(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect()
}

/// Split text into printable lines. Empty input yields one empty line so the
/// printer still receives a directive.
pub(crate) fn text_lines(text: &str) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() { vec![""] } else { lines }
}
