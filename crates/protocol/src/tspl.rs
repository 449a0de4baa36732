//! TSPL encoder.
//!
//! A TSPL job sets up the media (`SIZE`, `GAP`, `DIRECTION`, `CLS`), places
//! each element with an explicit directive, and ends with `PRINT <copies>`.
//! Coordinates are dots at 8 dots/mm (203 dpi).

use crate::encode::{Encoder, one_line, text_lines};
use crate::error::EncodeError;
use crate::model::{Label, Protocol};

/// Printer resolution in dots per millimetre.
pub const DOTS_PER_MM: u32 = 8;

const CRLF: &str = "\r\n";

const LABEL_MM: u32 = 60;
const GAP_MM: u32 = 2;
const MARGIN: u32 = 24;
const TEXT_LINE_HEIGHT: u32 = 32;

/// Error-correction level for QR codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QrEcc {
    /// ~7% recovery.
    L,
    /// ~15% recovery.
    #[default]
    M,
    /// ~25% recovery.
    Q,
    /// ~30% recovery.
    H,
}

impl QrEcc {
    fn as_str(self) -> &'static str {
        match self {
            QrEcc::L => "L",
            QrEcc::M => "M",
            QrEcc::Q => "Q",
            QrEcc::H => "H",
        }
    }
}

/// Settings for TSPL output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TsplEncoder {
    /// Copy count passed to `PRINT`.
    pub copies: u16,
    /// QR error-correction level.
    pub qr_ecc: QrEcc,
    /// QR module (cell) width in dots.
    pub qr_module_size: u8,
}

impl Default for TsplEncoder {
    fn default() -> Self {
        Self {
            copies: 1,
            qr_ecc: QrEcc::M,
            qr_module_size: 4,
        }
    }
}

/// One `TEXT` element.
struct TextElement<'a> {
    x: u32,
    y: u32,
    font: &'a str,
    rotation: u16,
    x_scale: u8,
    y_scale: u8,
    content: &'a str,
}

fn directive(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

/// Quote a string argument. TSPL escapes an embedded `"` as `\["]`.
fn quoted(s: &str) -> String {
    format!("\"{}\"", one_line(s).replace('"', "\\[\"]"))
}

impl TsplEncoder {
    fn setup(&self, out: &mut String, height_mm: u32) {
        directive(out, &format!("SIZE {LABEL_MM} mm,{height_mm} mm"));
        directive(out, &format!("GAP {GAP_MM} mm,0 mm"));
        directive(out, "DIRECTION 1");
        directive(out, "CLS");
    }

    fn text(out: &mut String, el: &TextElement<'_>) {
        directive(
            out,
            &format!(
                "TEXT {},{},{},{},{},{},{}",
                el.x,
                el.y,
                quoted(el.font),
                el.rotation,
                el.x_scale,
                el.y_scale,
                quoted(el.content)
            ),
        );
    }

    fn qr(&self, out: &mut String, x: u32, y: u32, data: &str) {
        directive(
            out,
            &format!(
                "QRCODE {x},{y},{},{},A,0,{}",
                self.qr_ecc.as_str(),
                self.qr_module_size,
                quoted(data)
            ),
        );
    }

    fn finish(&self, out: &mut String) {
        directive(out, &format!("PRINT {}", self.copies));
    }
}

impl Encoder for TsplEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Tspl
    }

    fn encode_text(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        let lines = text_lines(text);
        let rows = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        let needed_dots = MARGIN
            .saturating_mul(2)
            .saturating_add(rows.saturating_mul(TEXT_LINE_HEIGHT));
        let height_mm = needed_dots.div_ceil(DOTS_PER_MM).max(LABEL_MM);

        let mut out = String::new();
        self.setup(&mut out, height_mm);
        let mut y = MARGIN;
        for line in lines {
            Self::text(
                &mut out,
                &TextElement {
                    x: MARGIN,
                    y,
                    font: "3",
                    rotation: 0,
                    x_scale: 1,
                    y_scale: 1,
                    content: line,
                },
            );
            y = y.saturating_add(TEXT_LINE_HEIGHT);
        }
        self.finish(&mut out);
        Ok(out.into_bytes())
    }

    fn encode_label(&self, label: &Label) -> Result<Vec<u8>, EncodeError> {
        let width = LABEL_MM * DOTS_PER_MM;
        let mut out = String::new();
        self.setup(&mut out, LABEL_MM);

        Self::text(
            &mut out,
            &TextElement {
                x: MARGIN,
                y: MARGIN,
                font: "4",
                rotation: 0,
                x_scale: 1,
                y_scale: 1,
                content: &label.title,
            },
        );
        if !label.subtitle.is_empty() {
            Self::text(
                &mut out,
                &TextElement {
                    x: MARGIN,
                    y: 80,
                    font: "3",
                    rotation: 0,
                    x_scale: 1,
                    y_scale: 1,
                    content: &label.subtitle,
                },
            );
        }
        directive(&mut out, &format!("BAR {MARGIN},120,{},2", width - 2 * MARGIN));

        let mut y = 140;
        if !label.barcode.is_empty() {
            directive(
                &mut out,
                &format!("BARCODE {MARGIN},{y},\"128\",64,1,0,2,2,{}", quoted(&label.barcode)),
            );
            y += 100;
        }
        if !label.qr_data.is_empty() {
            self.qr(&mut out, MARGIN, y, &label.qr_data);
        }

        self.finish(&mut out);
        Ok(out.into_bytes())
    }

    fn encode_probe(&self) -> Vec<u8> {
        CRLF.as_bytes().to_vec()
    }
}
