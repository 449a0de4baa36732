//! Device protocol classification.
//!
//! An explicit [`ProtocolKind`] always wins. For `Auto`, the device name is
//! matched case-insensitively against vendor markers and the address against
//! vendor OUI prefixes; any hit selects NIIMBOT, otherwise CPCL.
//!
//! The built-in `"blue"` / `"bluetooth"` markers match many generic devices.
//! Misclassified printers are corrected by passing an explicit kind.

use crate::model::{PrinterDevice, Protocol, ProtocolKind};

/// Name markers that identify NIIMBOT devices, lowercase.
pub const DEFAULT_MARKERS: &[&str] = &["niimbot", "niim", "blue", "bluetooth"];

/// Address prefixes (OUIs) seen on NIIMBOT devices, uppercase and
/// colon-separated.
pub const DEFAULT_OUI_PREFIXES: &[&str] = &["C0:4E:30", "D8:A0:1D", "60:6E:41"];

/// Why a protocol was chosen. Useful in logs and CLI output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "reason", content = "value", rename_all = "snake_case"))]
pub enum Reason {
    /// The caller forced a protocol.
    Override,
    /// The name contained this marker.
    NameMarker(String),
    /// The address started with this prefix.
    AddressPrefix(String),
    /// Nothing matched.
    Fallback,
}

/// A classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Classification {
    /// The resolved protocol.
    pub protocol: Protocol,
    /// Why it was chosen.
    pub reason: Reason,
}

/// Name/address heuristic with configurable marker sets.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Classifier {
    /// Case-insensitive name substrings that select NIIMBOT.
    pub markers: Vec<String>,
    /// Address prefixes that select NIIMBOT.
    pub oui_prefixes: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|s| s.to_string()).collect(),
            oui_prefixes: DEFAULT_OUI_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Classifier {
    /// Resolve the protocol and report why.
    pub fn explain(&self, name: Option<&str>, address: &str, kind: ProtocolKind) -> Classification {
        if let Some(protocol) = kind.forced() {
            return Classification {
                protocol,
                reason: Reason::Override,
            };
        }

        if let Some(name) = name {
            let name = name.to_lowercase();
            if let Some(marker) = self
                .markers
                .iter()
                .find(|m| !m.is_empty() && name.contains(&m.to_lowercase()))
            {
                return Classification {
                    protocol: Protocol::Niimbot,
                    reason: Reason::NameMarker(marker.clone()),
                };
            }
        }

        let address = normalize_address(address);
        if let Some(prefix) = self
            .oui_prefixes
            .iter()
            .find(|p| !p.is_empty() && address.starts_with(&normalize_address(p)))
        {
            return Classification {
                protocol: Protocol::Niimbot,
                reason: Reason::AddressPrefix(prefix.clone()),
            };
        }

        Classification {
            protocol: Protocol::Cpcl,
            reason: Reason::Fallback,
        }
    }

    /// Resolve the protocol for a name, address, and caller selection.
    pub fn classify(&self, name: Option<&str>, address: &str, kind: ProtocolKind) -> Protocol {
        let c = self.explain(name, address, kind);
        tracing::debug!(
            address,
            name = name.unwrap_or(""),
            protocol = %c.protocol,
            reason = ?c.reason,
            "classified device"
        );
        c.protocol
    }

    /// Resolve the protocol for a device.
    pub fn classify_device(&self, device: &PrinterDevice, kind: ProtocolKind) -> Protocol {
        self.classify(device.name.as_deref(), &device.address, kind)
    }
}

/// Classify with the built-in marker sets.
pub fn classify(name: Option<&str>, address: &str, kind: ProtocolKind) -> Protocol {
    Classifier::default().classify(name, address, kind)
}

/// Uppercase and unify separators so `c0-4e-30…` matches `C0:4E:30`.
fn normalize_address(addr: &str) -> String {
    addr.trim()
        .chars()
        .map(|c| if c == '-' { ':' } else { c.to_ascii_uppercase() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn niimbot_name_selects_niimbot() {
        assert_eq!(
            classify(Some("NIIMBOT-B1"), "00:00:00:00:00:01", ProtocolKind::Auto),
            Protocol::Niimbot
        );
    }

    #[test]
    fn generic_name_falls_back_to_cpcl() {
        assert_eq!(
            classify(Some("Generic POS-80"), "00:00:00:00:00:01", ProtocolKind::Auto),
            Protocol::Cpcl
        );
    }

    #[test]
    fn override_wins_over_name() {
        assert_eq!(
            classify(Some("my niimbot"), "C0:4E:30:00:00:01", ProtocolKind::Tspl),
            Protocol::Tspl
        );
    }

    #[test]
    fn missing_name_uses_address() {
        let c = Classifier::default().explain(None, "c0-4e-30-11-22-33", ProtocolKind::Auto);
        assert_eq!(c.protocol, Protocol::Niimbot);
        assert_eq!(c.reason, Reason::AddressPrefix("C0:4E:30".into()));
    }

    #[test]
    fn first_marker_wins() {
        let c = Classifier::default().explain(Some("Niimbot Bluetooth"), "x", ProtocolKind::Auto);
        assert_eq!(c.reason, Reason::NameMarker("niimbot".into()));
    }

    #[test]
    fn broad_marker_matches_generic_device() {
        // Known over-match: "blue" appears in many unrelated names.
        assert_eq!(
            classify(Some("BlueTooth Printer"), "00:11:22:33:44:55", ProtocolKind::Auto),
            Protocol::Niimbot
        );
    }

    #[test]
    fn custom_sets_replace_defaults() {
        let c = Classifier {
            markers: vec!["D11".into()],
            oui_prefixes: vec![],
        };
        assert_eq!(
            c.classify(Some("d11_h"), "00:00", ProtocolKind::Auto),
            Protocol::Niimbot
        );
        assert_eq!(
            c.classify(Some("niimbot"), "C0:4E:30:00:00:00", ProtocolKind::Auto),
            Protocol::Cpcl
        );
    }
}
