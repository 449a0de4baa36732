//! CPCL encoder.
//!
//! CPCL jobs are forms: a `!` header declaring resolution, height in dots,
//! and copy count, a body of positioned directives, and a `FORM` / `PRINT`
//! trailer. Every directive ends with CRLF.

use crate::encode::{Encoder, one_line, text_lines};
use crate::error::EncodeError;
use crate::model::{Label, Protocol};
use crate::template::{ParkingTicket, ProductLabel, Receipt, Template, TestPage, format_amount};

/// Horizontal and vertical resolution declared in the form header.
pub const DPI: u32 = 200;

/// Width and height of a 60×60 mm label in printer dots.
pub const LABEL_60MM_DOTS: u32 = 240;

/// Form height used for text jobs short enough to fit.
pub const DEFAULT_FORM_HEIGHT: u32 = 210;

const CRLF: &str = "\r\n";

const MARGIN: u32 = 20;
const TEXT_LINE_HEIGHT: u32 = 30;
const TEXT_FONT: u32 = 7;
const TITLE_FONT: u32 = 4;
const SUBTITLE_FONT: u32 = 7;

const TITLE_Y: u32 = 10;
const SUBTITLE_Y: u32 = 60;
const SEPARATOR_Y: u32 = 90;
const CONTENT_Y: u32 = 100;
const BARCODE_HEIGHT: u32 = 40;

/// Print width of receipts and other roll documents, in dots.
pub const RECEIPT_WIDTH: u32 = 400;

const HEADING_FONT: u32 = 4;
const EMPHASIS_FONT: u32 = 5;
// Worst-case modules per side for the payloads templates carry.
const QR_MODULES: u32 = 25;
const RULE_X: u32 = 50;
const RULE_WIDTH: u32 = 300;
const AMOUNT_X: u32 = 250;

/// Settings for CPCL output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CpclEncoder {
    /// Copies requested in the form header.
    pub copies: u16,
}

impl Default for CpclEncoder {
    fn default() -> Self {
        Self { copies: 1 }
    }
}

impl CpclEncoder {
    fn header(&self, out: &mut String, height: u32) {
        directive(out, &format!("! 0 {DPI} {DPI} {height} {}", self.copies));
    }
}

fn directive(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}

fn trailer(out: &mut String) {
    directive(out, "FORM");
    directive(out, "PRINT");
}

// ── Form builder ────────────────────────────────────────────────────────

/// A CPCL form assembled element by element.
///
/// The header is written by [`CpclForm::finish`], sized to the lowest
/// element placed. Text fields are flattened to one line. Centered text
/// switches the form to `CENTER`; every other element switches it back to
/// `LEFT`, so a justification directive appears only on a change.
#[derive(Debug, Clone)]
pub struct CpclForm {
    width: u32,
    body: String,
    bottom: u32,
    centered: bool,
}

impl CpclForm {
    /// An empty form `width` dots wide.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            body: String::new(),
            bottom: 0,
            centered: false,
        }
    }

    fn left(&mut self) {
        if self.centered {
            directive(&mut self.body, "LEFT");
            self.centered = false;
        }
    }

    fn center(&mut self) {
        if !self.centered {
            directive(&mut self.body, &format!("CENTER {}", self.width));
            self.centered = true;
        }
    }

    fn reach(&mut self, y: u32) {
        self.bottom = self.bottom.max(y);
    }

    /// Left-aligned text at `(x, y)`.
    pub fn text(&mut self, font: u32, x: u32, y: u32, text: &str) -> &mut Self {
        self.left();
        directive(&mut self.body, &format!("TEXT {font} 0 {x} {y} {}", one_line(text)));
        self.reach(y.saturating_add(TEXT_LINE_HEIGHT));
        self
    }

    /// Text centered across the form width.
    pub fn center_text(&mut self, font: u32, y: u32, text: &str) -> &mut Self {
        self.center();
        directive(&mut self.body, &format!("TEXT {font} 0 0 {y} {}", one_line(text)));
        self.reach(y.saturating_add(TEXT_LINE_HEIGHT));
        self
    }

    /// Horizontal rule `width` dots long.
    pub fn hline(&mut self, x: u32, y: u32, width: u32, thickness: u32) -> &mut Self {
        self.left();
        let x1 = x.saturating_add(width);
        directive(&mut self.body, &format!("LINE {x} {y} {x1} {y} {thickness}"));
        self.reach(y.saturating_add(thickness));
        self
    }

    /// Rectangle outline.
    pub fn rect(&mut self, x: u32, y: u32, width: u32, height: u32, thickness: u32) -> &mut Self {
        self.left();
        let (x1, y1) = (x.saturating_add(width), y.saturating_add(height));
        directive(&mut self.body, &format!("BOX {x} {y} {x1} {y1} {thickness}"));
        self.reach(y1);
        self
    }

    /// Code 128 barcode.
    pub fn code128(&mut self, x: u32, y: u32, height: u32, data: &str) -> &mut Self {
        self.barcode("128", x, y, height, data)
    }

    /// Code 39 barcode.
    pub fn code39(&mut self, x: u32, y: u32, height: u32, data: &str) -> &mut Self {
        self.barcode("39", x, y, height, data)
    }

    fn barcode(&mut self, kind: &str, x: u32, y: u32, height: u32, data: &str) -> &mut Self {
        self.left();
        directive(
            &mut self.body,
            &format!("B {kind} 1 1 {height} {x} {y} {}", one_line(data)),
        );
        self.reach(y.saturating_add(height));
        self
    }

    /// QR code with module size `size`.
    pub fn qr(&mut self, x: u32, y: u32, size: u32, data: &str) -> &mut Self {
        self.left();
        directive(&mut self.body, &format!("B QR {x} {y} {size} {}", one_line(data)));
        self.reach(y.saturating_add(size.saturating_mul(QR_MODULES)));
        self
    }

    /// Header, body, and trailer.
    pub fn finish(&self, copies: u16) -> Vec<u8> {
        let height = self
            .bottom
            .saturating_add(MARGIN)
            .max(DEFAULT_FORM_HEIGHT);
        let mut out = String::with_capacity(self.body.len() + 32);
        directive(&mut out, &format!("! 0 {DPI} {DPI} {height} {copies}"));
        out.push_str(&self.body);
        trailer(&mut out);
        out.into_bytes()
    }
}

// ── Templates ───────────────────────────────────────────────────────────

fn test_page(page: &TestPage) -> CpclForm {
    let mut f = CpclForm::new(RECEIPT_WIDTH);
    f.center_text(HEADING_FONT, 50, "TEST PAGE")
        .center_text(EMPHASIS_FONT, 80, "Thermal Printer")
        .center_text(EMPHASIS_FONT, 110, "Bluetooth")
        .hline(RULE_X, 130, RULE_WIDTH, 2);
    if !page.printed_at.is_empty() {
        f.text(TEXT_FONT, RULE_X, 160, &format!("Printed: {}", page.printed_at));
    }
    f.text(TEXT_FONT, RULE_X, 200, "Print test")
        .text(TEXT_FONT, RULE_X, 220, "CPCL commands")
        .hline(RULE_X, 250, RULE_WIDTH, 1)
        .code128(RULE_X, 280, BARCODE_HEIGHT, &page.barcode)
        .qr(AMOUNT_X, 280, 5, &page.qr_data);
    f
}

fn receipt(r: &Receipt) -> CpclForm {
    let mut f = CpclForm::new(RECEIPT_WIDTH);
    f.center_text(HEADING_FONT, 50, &r.company)
        .center_text(EMPHASIS_FONT, 80, "RECEIPT")
        .hline(RULE_X, 100, RULE_WIDTH, 1);
    if !r.issued_at.is_empty() {
        f.text(TEXT_FONT, RULE_X, 120, &format!("Date: {}", r.issued_at));
    }
    f.hline(RULE_X, 140, RULE_WIDTH, 1);

    let mut y = 160;
    for item in &r.items {
        f.text(TEXT_FONT, RULE_X, y, &item.name).text(
            TEXT_FONT,
            AMOUNT_X,
            y,
            &format_amount(&r.currency, item.price_cents),
        );
        y = y.saturating_add(20);
    }

    f.hline(RULE_X, y, RULE_WIDTH, 1)
        .text(EMPHASIS_FONT, RULE_X, y + 20, "TOTAL:")
        .text(
            EMPHASIS_FONT,
            AMOUNT_X,
            y + 20,
            &format_amount(&r.currency, r.total_cents),
        )
        .center_text(EMPHASIS_FONT, y + 50, "Thank you!");
    f
}

fn parking_ticket(t: &ParkingTicket) -> CpclForm {
    const QR_Y: u32 = 240;
    const QR_SIZE: u32 = 5;

    let mut f = CpclForm::new(RECEIPT_WIDTH);
    f.center_text(HEADING_FONT, 50, "PARKING")
        .center_text(EMPHASIS_FONT, 80, "RECEIPT")
        .hline(RULE_X, 100, RULE_WIDTH, 2)
        .text(EMPHASIS_FONT, RULE_X, 130, &format!("Plate: {}", t.plate))
        .text(TEXT_FONT, RULE_X, 150, &format!("Entry: {}", t.entry_time))
        .text(TEXT_FONT, RULE_X, 170, &format!("Duration: {}", t.duration))
        .text(
            EMPHASIS_FONT,
            RULE_X,
            190,
            &format!("Amount: {}", format_amount(&t.currency, t.amount_cents)),
        )
        .hline(RULE_X, 210, RULE_WIDTH, 1)
        .qr(150, QR_Y, QR_SIZE, &t.qr_payload())
        .center_text(TEXT_FONT, QR_Y + QR_SIZE * QR_MODULES + 10, "Have a good trip!");
    f
}

fn product_label(p: &ProductLabel) -> CpclForm {
    let mut f = CpclForm::new(LABEL_60MM_DOTS);
    f.center_text(EMPHASIS_FONT, 50, &p.name)
        .center_text(HEADING_FONT, 80, &format_amount(&p.currency, p.price_cents))
        .code128(MARGIN, 110, 50, &p.barcode)
        .center_text(TEXT_FONT, 165, &p.barcode);
    f
}

impl CpclEncoder {
    /// Lay out `template` as an unfinished form, for callers that add elements.
    pub fn template_form(&self, template: &Template) -> CpclForm {
        match template {
            Template::TestPage(page) => test_page(page),
            Template::Receipt(r) => receipt(r),
            Template::ParkingTicket(t) => parking_ticket(t),
            Template::ProductLabel(p) => product_label(p),
        }
    }
}

impl Encoder for CpclEncoder {
    fn protocol(&self) -> Protocol {
        Protocol::Cpcl
    }

    fn encode_text(&self, text: &str) -> Result<Vec<u8>, EncodeError> {
        let lines = text_lines(text);
        let rows = u32::try_from(lines.len()).unwrap_or(u32::MAX);
        let needed = MARGIN
            .saturating_mul(2)
            .saturating_add(rows.saturating_mul(TEXT_LINE_HEIGHT));
        let height = needed.max(DEFAULT_FORM_HEIGHT);

        let mut out = String::new();
        self.header(&mut out, height);
        let mut y = MARGIN;
        for line in lines {
            directive(&mut out, &format!("TEXT {TEXT_FONT} 0 {MARGIN} {y} {line}"));
            y = y.saturating_add(TEXT_LINE_HEIGHT);
        }
        trailer(&mut out);
        Ok(out.into_bytes())
    }

    fn encode_label(&self, label: &Label) -> Result<Vec<u8>, EncodeError> {
        let mut out = String::new();
        self.header(&mut out, LABEL_60MM_DOTS);

        // Titles are centered across the full label width.
        directive(&mut out, &format!("CENTER {LABEL_60MM_DOTS}"));
        directive(
            &mut out,
            &format!("TEXT {TITLE_FONT} 0 0 {TITLE_Y} {}", one_line(&label.title)),
        );
        if !label.subtitle.is_empty() {
            directive(
                &mut out,
                &format!(
                    "TEXT {SUBTITLE_FONT} 0 0 {SUBTITLE_Y} {}",
                    one_line(&label.subtitle)
                ),
            );
        }
        directive(&mut out, "LEFT");
        directive(
            &mut out,
            &format!(
                "LINE {MARGIN} {SEPARATOR_Y} {} {SEPARATOR_Y} 1",
                LABEL_60MM_DOTS - MARGIN
            ),
        );

        let mut y = CONTENT_Y;
        if !label.barcode.is_empty() {
            directive(
                &mut out,
                &format!(
                    "B 128 1 1 {BARCODE_HEIGHT} {MARGIN} {y} {}",
                    one_line(&label.barcode)
                ),
            );
            y += BARCODE_HEIGHT + 10;
        }
        if !label.qr_data.is_empty() {
            // Module size shrinks when a barcode already took vertical space.
            let size = if label.barcode.is_empty() { 4 } else { 3 };
            directive(
                &mut out,
                &format!("B QR 80 {y} {size} {}", one_line(&label.qr_data)),
            );
        }

        trailer(&mut out);
        Ok(out.into_bytes())
    }

    fn encode_probe(&self) -> Vec<u8> {
        CRLF.as_bytes().to_vec()
    }

    fn encode_template(&self, template: &Template) -> Result<Vec<u8>, EncodeError> {
        Ok(self.template_form(template).finish(self.copies))
    }
}
