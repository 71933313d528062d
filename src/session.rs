//! Open device session: diagnostics queries and report reads
//!
//! A session owns exactly one open HID handle. It performs no retry of its
//! own; open failures surface to the caller and reconnect policy lives in
//! the monitor loop.

use hidapi::{HidApi, HidDevice};
use tracing::{info, warn};

use crate::error::PttError;
use crate::locator::{BusKind, LocatedDevice};

/// PTT reports are always two bytes
pub const REPORT_SIZE: usize = 2;

/// Best-effort device description emitted once after a successful open
#[derive(Debug, Clone)]
pub struct DeviceDiagnostics {
    /// Product string, if the device reports one
    pub product: Option<String>,
    /// Manufacturer string, if the device reports one
    pub manufacturer: Option<String>,
    /// Serial number, if the device reports one
    pub serial: Option<String>,
    /// Bus type captured at enumeration time
    pub bus: BusKind,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
}

/// One open PTT device handle
pub struct DeviceSession {
    device: HidDevice,
    bus: BusKind,
    vendor_id: u16,
    product_id: u16,
    read_timeout_ms: i32,
}

impl DeviceSession {
    /// Open the located device node.
    ///
    /// Busy or vanished nodes map to [`PttError::Open`], missing permissions
    /// to [`PttError::PermissionDenied`]. Neither is retried here.
    pub fn open(
        api: &HidApi,
        located: &LocatedDevice,
        read_timeout_ms: i32,
    ) -> Result<Self, PttError> {
        let device = api.open_path(&located.path).map_err(|e| {
            let msg = format!("{:?}: {e}", located.path);
            if msg.contains("Permission denied") || msg.contains("EPERM") {
                PttError::PermissionDenied(msg)
            } else {
                PttError::Open(msg)
            }
        })?;
        info!("PTT device node: {:?}", located.path);

        Ok(Self {
            device,
            bus: located.bus,
            vendor_id: located.vendor_id,
            product_id: located.product_id,
            read_timeout_ms,
        })
    }

    /// Query the device's descriptive strings.
    ///
    /// Each query can fail independently; failures are logged and replaced
    /// by `None` rather than blocking device use.
    pub fn diagnostics(&self) -> DeviceDiagnostics {
        let product = self
            .device
            .get_product_string()
            .unwrap_or_else(|e| {
                warn!("product string query failed: {e}");
                None
            });
        let manufacturer = self
            .device
            .get_manufacturer_string()
            .unwrap_or_else(|e| {
                warn!("manufacturer string query failed: {e}");
                None
            });
        let serial = self
            .device
            .get_serial_number_string()
            .unwrap_or_else(|e| {
                warn!("serial number query failed: {e}");
                None
            });

        DeviceDiagnostics {
            product,
            manufacturer,
            serial,
            bus: self.bus,
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }

    /// Emit the diagnostics description to the log, once per open
    pub fn log_diagnostics(&self) {
        let diag = self.diagnostics();
        info!(
            "Raw name: {}",
            diag.product.as_deref().unwrap_or("(unknown)")
        );
        info!(
            "Manufacturer: {}",
            diag.manufacturer.as_deref().unwrap_or("(unknown)")
        );
        info!(
            "Serial: {}",
            diag.serial.as_deref().unwrap_or("(unknown)")
        );
        info!(
            "Bus: {}, vendor: 0x{:04x}, product: 0x{:04x}",
            diag.bus, diag.vendor_id, diag.product_id
        );
    }

    /// Read one report with the configured timeout.
    ///
    /// `Ok(0)` means no data arrived within the timeout window; fewer than
    /// [`REPORT_SIZE`] bytes is a runt report the caller discards. The
    /// short timeout exists so the monitor loop observes its shutdown flag
    /// even when the device is silent.
    pub fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> Result<usize, PttError> {
        self.device
            .read_timeout(buf, self.read_timeout_ms)
            .map_err(|e| PttError::Read(e.to_string()))
    }
}
