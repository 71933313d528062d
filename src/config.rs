//! Monitor configuration
//!
//! Supports TOML serialization for persistent config storage. The only
//! required field is the device identifier substring; everything else has
//! defaults matching the behavior of the deployed hardware.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PttError;

/// Configuration for a [`PttMonitor`](crate::PttMonitor) instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Substring matched against each candidate device's vendor id, product
    /// id, manufacturer, product, and serial attributes (in that order)
    pub device_query: String,

    /// Source id reported for simple-encoding (single button) devices
    #[serde(default = "default_usb_source_id")]
    pub usb_source_id: u8,

    /// Unconditional pause after every read, bounding device chatter
    #[serde(default = "default_poll_throttle_ms")]
    pub poll_throttle_ms: u64,

    /// Read timeout; bounds how long a quiet device can delay a shutdown
    /// check
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: i32,

    /// Wait between failed reconnect attempts
    #[serde(default = "default_recover_cooldown_ms")]
    pub recover_cooldown_ms: u64,

    /// Bound on joining the monitor thread during shutdown
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_usb_source_id() -> u8 {
    crate::event::HEADSET_SOURCE
}
fn default_poll_throttle_ms() -> u64 {
    500
}
fn default_read_timeout_ms() -> i32 {
    200
}
fn default_recover_cooldown_ms() -> u64 {
    5000
}
fn default_shutdown_timeout_ms() -> u64 {
    5000
}

impl MonitorConfig {
    /// Config with defaults for the given device identifier substring
    pub fn new(device_query: impl Into<String>) -> Self {
        Self {
            device_query: device_query.into(),
            usb_source_id: default_usb_source_id(),
            poll_throttle_ms: default_poll_throttle_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            recover_cooldown_ms: default_recover_cooldown_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self, PttError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PttError::InvalidConfig(format!("{}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| PttError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), PttError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PttError::InvalidConfig(format!("{}: {e}", parent.display())))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| PttError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| PttError::InvalidConfig(format!("{}: {e}", path.display())))
    }

    pub(crate) fn validate(&self) -> Result<(), PttError> {
        if self.device_query.is_empty() {
            return Err(PttError::InvalidConfig(
                "device_query must not be empty".into(),
            ));
        }
        Ok(())
    }
}
