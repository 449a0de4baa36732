//! RFCOMM service identifiers.

use std::fmt;

use thermalink_protocol::Protocol;
use uuid::Uuid;

/// The Bluetooth service a link is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Standard Serial Port Profile, used by CPCL and TSPL printers.
    pub const SERIAL_PORT: ServiceId =
        ServiceId(Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5F9B_34FB));

    /// Vendor service exposed by NIIMBOT printers.
    pub const NIIMBOT: ServiceId =
        ServiceId(Uuid::from_u128(0xe781_0a71_73ae_499d_8c15_faa9_aef0_c3f2));

    /// Wrap an arbitrary service UUID.
    pub const fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The service a device speaking `protocol` listens on.
    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Niimbot => Self::NIIMBOT,
            Protocol::Cpcl | Protocol::Tspl => Self::SERIAL_PORT,
        }
    }

    /// The underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
