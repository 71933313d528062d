//! Device discovery for PTT hardware
//!
//! Enumerates every HID device the OS currently exposes and selects the
//! first one whose descriptive attributes contain the operator-configured
//! identifier substring. Enumeration is always fresh: device node paths can
//! change between plug events, so nothing is cached across calls.

use std::ffi::CString;
use std::fmt;

use hidapi::HidApi;
use tracing::{debug, info};

use crate::error::PttError;

/// Bus a candidate device hangs off, for diagnostics output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Usb,
    Bluetooth,
    I2c,
    Spi,
    Unknown,
}

impl From<hidapi::BusType> for BusKind {
    fn from(bus: hidapi::BusType) -> Self {
        use hidapi::BusType;
        match bus {
            BusType::Usb => BusKind::Usb,
            BusType::Bluetooth => BusKind::Bluetooth,
            BusType::I2c => BusKind::I2c,
            BusType::Spi => BusKind::Spi,
            _ => BusKind::Unknown,
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusKind::Usb => "USB",
            BusKind::Bluetooth => "Bluetooth",
            BusKind::I2c => "I2C",
            BusKind::Spi => "SPI",
            BusKind::Unknown => "Other",
        };
        f.write_str(name)
    }
}

/// Which attribute selected a device, in match priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedAttribute {
    VendorId,
    ProductId,
    Manufacturer,
    Product,
    Serial,
}

impl fmt::Display for MatchedAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchedAttribute::VendorId => "vendor id",
            MatchedAttribute::ProductId => "product id",
            MatchedAttribute::Manufacturer => "manufacturer",
            MatchedAttribute::Product => "product",
            MatchedAttribute::Serial => "serial",
        };
        f.write_str(name)
    }
}

/// A device selected by [`locate`], ready to be opened by a session.
///
/// The path is only valid until the device is replugged; reconnect logic
/// must re-run [`locate`] rather than reuse a stored path.
#[derive(Debug, Clone)]
pub struct LocatedDevice {
    /// OS device node path to open
    pub path: CString,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Bus the device is attached to
    pub bus: BusKind,
    /// Attribute that matched the identifier substring
    pub matched: MatchedAttribute,
}

/// Descriptive attributes of one enumeration candidate.
///
/// Ids are matched in their 4-digit lower-hex form, the same spelling the
/// kernel exposes in sysfs. Strings the device did not report are `None`
/// and are skipped, continuing with the next attribute.
#[derive(Debug, Clone)]
pub(crate) struct CandidateAttributes {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial: Option<String>,
}

impl CandidateAttributes {
    fn from_device_info(info: &hidapi::DeviceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            manufacturer: info.manufacturer_string().map(|s| s.to_string()),
            product: info.product_string().map(|s| s.to_string()),
            serial: info.serial_number().map(|s| s.to_string()),
        }
    }
}

/// Substring-match `query` against the fixed ordered attribute list.
///
/// First attribute that contains the query wins; remaining attributes are
/// not consulted.
pub(crate) fn match_candidate(
    query: &str,
    attrs: &CandidateAttributes,
) -> Option<MatchedAttribute> {
    if format!("{:04x}", attrs.vendor_id).contains(query) {
        return Some(MatchedAttribute::VendorId);
    }
    if format!("{:04x}", attrs.product_id).contains(query) {
        return Some(MatchedAttribute::ProductId);
    }
    let string_attrs = [
        (&attrs.manufacturer, MatchedAttribute::Manufacturer),
        (&attrs.product, MatchedAttribute::Product),
        (&attrs.serial, MatchedAttribute::Serial),
    ];
    for (value, which) in string_attrs {
        if let Some(value) = value {
            if value.contains(query) {
                return Some(which);
            }
        }
    }
    None
}

/// Find the first enumerated device matching the identifier substring.
///
/// Returns `Ok(None)` when nothing matched; "not found" is a normal
/// outcome, not an error. Enumeration failure itself is an error.
pub fn locate(query: &str) -> Result<Option<LocatedDevice>, PttError> {
    let api = HidApi::new()?;

    for info in api.device_list() {
        let attrs = CandidateAttributes::from_device_info(info);
        debug!(
            "candidate {:04x}:{:04x} product={:?} serial={:?}",
            attrs.vendor_id, attrs.product_id, attrs.product, attrs.serial
        );

        if let Some(matched) = match_candidate(query, &attrs) {
            info!(
                "PTT device {:04x}:{:04x} selected by {} match, node {:?}",
                attrs.vendor_id,
                attrs.product_id,
                matched,
                info.path()
            );
            return Ok(Some(LocatedDevice {
                path: info.path().to_owned(),
                vendor_id: attrs.vendor_id,
                product_id: attrs.product_id,
                bus: info.bus_type().into(),
                matched,
            }));
        }
    }

    info!("No device matched PTT identifier {query:?}");
    Ok(None)
}
