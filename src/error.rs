//! Monitor error types

use thiserror::Error;

/// Errors that can occur while locating, opening, or reading a PTT device
#[derive(Error, Debug)]
pub enum PttError {
    /// No enumerated device matched the identifier substring
    #[error("No PTT device matched identifier {0:?}")]
    NotFound(String),

    /// Device node exists but could not be opened (busy, vanished)
    #[error("Failed to open PTT device: {0}")]
    Open(String),

    /// Device node could not be opened due to missing permissions
    #[error("Permission denied opening PTT device: {0}")]
    PermissionDenied(String),

    /// Handle became invalid mid-read (unplug, I/O fault)
    #[error("PTT device read failed: {0}")]
    Read(String),

    /// Other HID layer error (enumeration failure, API init)
    #[error("HID error: {0}")]
    Hid(String),

    /// Monitor configuration was rejected
    #[error("Invalid monitor configuration: {0}")]
    InvalidConfig(String),
}

impl From<hidapi::HidError> for PttError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            PttError::PermissionDenied(msg)
        } else {
            PttError::Hid(msg)
        }
    }
}
