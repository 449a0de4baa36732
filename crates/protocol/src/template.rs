//! Fixed-layout documents: test page, receipt, parking ticket, product label.
//!
//! These carry data only. Layout lives with the encoder that can render
//! them; today that is CPCL.

/// A predefined document layout.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "template", rename_all = "snake_case"))]
pub enum Template {
    /// Printer self-test with a barcode and a QR code.
    TestPage(TestPage),
    /// Itemized sales receipt.
    Receipt(Receipt),
    /// Parking receipt with a QR code encoding plate and entry time.
    ParkingTicket(ParkingTicket),
    /// Shelf label with price and Code 128 barcode.
    ProductLabel(ProductLabel),
}

impl Template {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Template::TestPage(_) => "test_page",
            Template::Receipt(_) => "receipt",
            Template::ParkingTicket(_) => "parking_ticket",
            Template::ProductLabel(_) => "product_label",
        }
    }
}

/// Default currency prefix for printed amounts.
pub const DEFAULT_CURRENCY: &str = "R$";

/// Render `cents` as `"<currency> <units>.<cents>"`.
pub fn format_amount(currency: &str, cents: u64) -> String {
    format!("{currency} {}.{:02}", cents / 100, cents % 100)
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

/// Contents of the self-test page.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TestPage {
    /// When the page was printed, as the caller wants it shown. Empty omits the line.
    pub printed_at: String,
    /// Code 128 content.
    pub barcode: String,
    /// QR payload.
    pub qr_data: String,
}

impl Default for TestPage {
    fn default() -> Self {
        Self {
            printed_at: String::new(),
            barcode: "TEST123".to_string(),
            qr_data: "https://github.com/thermalink/thermalink".to_string(),
        }
    }
}

impl TestPage {
    /// Test page stamped with `printed_at`.
    pub fn new(printed_at: impl Into<String>) -> Self {
        Self {
            printed_at: printed_at.into(),
            ..Self::default()
        }
    }
}

/// One receipt line.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReceiptItem {
    /// Item description.
    pub name: String,
    /// Price in cents.
    pub price_cents: u64,
}

/// An itemized receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Receipt {
    /// Business name, printed as the heading.
    pub company: String,
    /// Issue timestamp as it should be shown.
    pub issued_at: String,
    /// Line items in print order.
    pub items: Vec<ReceiptItem>,
    /// Printed total in cents. [`Receipt::item`] keeps it equal to the item sum.
    pub total_cents: u64,
    /// Prefix for amounts.
    pub currency: String,
}

impl Default for Receipt {
    fn default() -> Self {
        Self {
            company: String::new(),
            issued_at: String::new(),
            items: Vec::new(),
            total_cents: 0,
            currency: default_currency(),
        }
    }
}

impl Receipt {
    /// An empty receipt for `company`.
    pub fn new(company: impl Into<String>, issued_at: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            issued_at: issued_at.into(),
            ..Self::default()
        }
    }

    /// Append an item and add its price to the total.
    pub fn item(mut self, name: impl Into<String>, price_cents: u64) -> Self {
        self.total_cents = self.total_cents.saturating_add(price_cents);
        self.items.push(ReceiptItem {
            name: name.into(),
            price_cents,
        });
        self
    }
}

/// A parking receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParkingTicket {
    /// Vehicle plate.
    pub plate: String,
    /// Entry time as shown.
    pub entry_time: String,
    /// Stay duration as shown.
    pub duration: String,
    /// Amount charged in cents.
    pub amount_cents: u64,
    /// Prefix for amounts.
    pub currency: String,
}

impl Default for ParkingTicket {
    fn default() -> Self {
        Self {
            plate: String::new(),
            entry_time: String::new(),
            duration: String::new(),
            amount_cents: 0,
            currency: default_currency(),
        }
    }
}

impl ParkingTicket {
    /// Payload of the ticket's QR code.
    pub fn qr_payload(&self) -> String {
        format!("PARKING:{}:{}", self.plate, self.entry_time)
    }
}

/// A shelf label.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProductLabel {
    /// Product name.
    pub name: String,
    /// Price in cents.
    pub price_cents: u64,
    /// Code 128 content, also printed in human-readable form.
    pub barcode: String,
    /// Prefix for amounts.
    pub currency: String,
}

impl Default for ProductLabel {
    fn default() -> Self {
        Self {
            name: String::new(),
            price_cents: 0,
            barcode: String::new(),
            currency: default_currency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_keep_two_decimals() {
        assert_eq!(format_amount("R$", 1250), "R$ 12.50");
        assert_eq!(format_amount("$", 7), "$ 0.07");
        assert_eq!(format_amount("EUR", 0), "EUR 0.00");
    }

    #[test]
    fn receipt_total_follows_items() {
        let r = Receipt::new("Shop", "").item("a", 150).item("b", 250);
        assert_eq!(r.items.len(), 2);
        assert_eq!(r.total_cents, 400);
    }

    #[test]
    fn parking_qr_joins_plate_and_entry() {
        let t = ParkingTicket {
            plate: "ABC1D23".into(),
            entry_time: "08:15".into(),
            ..ParkingTicket::default()
        };
        assert_eq!(t.qr_payload(), "PARKING:ABC1D23:08:15");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn template_json_is_tagged() {
        let json = r#"{"template":"product_label","name":"Tea","price_cents":399,"barcode":"789"}"#;
        let t: Template = serde_json::from_str(json).unwrap();
        match t {
            Template::ProductLabel(p) => {
                assert_eq!(p.name, "Tea");
                assert_eq!(p.currency, DEFAULT_CURRENCY);
            }
            other => panic!("unexpected template {other:?}"),
        }
    }
}
