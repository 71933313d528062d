//! PTT device monitor
//!
//! This crate watches one physical push-to-talk input device (a raw USB HID
//! button box or a joystick-style HID device) and converts its raw 2-byte
//! reports into debounced pressed/released notifications:
//!
//! - **Locate**: enumerate HID devices and select the one whose vendor id,
//!   product id, manufacturer, product, or serial contains an
//!   operator-configured substring.
//! - **Monitor**: a dedicated background thread reads reports, classifies
//!   them against the two supported encodings, debounces per logical
//!   source, and fans each edge out to registered listeners and broadcast
//!   subscribers.
//! - **Recover**: on read failure the handle is dropped and discovery is
//!   re-run, with a cooldown between attempts, indefinitely until
//!   shutdown.
//!
//! ```no_run
//! use ptt_monitor::{MonitorConfig, PttEvent, PttListener, PttMonitor};
//!
//! struct Radio;
//!
//! impl PttListener for Radio {
//!     fn ptt_pressed(&mut self, event: &PttEvent) {
//!         println!("keying up, source {}", event.source_id);
//!     }
//!     fn ptt_released(&mut self, event: &PttEvent) {
//!         println!("unkeyed, source {}", event.source_id);
//!     }
//! }
//!
//! let monitor = PttMonitor::initialize(MonitorConfig::new("ACME"))?;
//! monitor.add_listener(Radio);
//! # Ok::<(), ptt_monitor::PttError>(())
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod locator;
pub mod monitor;
pub mod session;

pub use config::MonitorConfig;
pub use decoder::ReportDecoder;
pub use error::PttError;
pub use event::{
    ListenerSet, PttEvent, PttListener, PttTransition, HANDSET_SOURCE, HEADSET_SOURCE,
};
pub use locator::{locate, BusKind, LocatedDevice, MatchedAttribute};
pub use monitor::{DeviceBackend, HidBackend, PttMonitor, ReportSource};
pub use session::{DeviceDiagnostics, DeviceSession, REPORT_SIZE};
