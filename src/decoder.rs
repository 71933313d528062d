//! Report classification and per-source debounce
//!
//! Two fixed 2-byte encodings exist, distinguished by a byte-pattern
//! heuristic rather than a device-type tag:
//!
//! - **Simple encoding** (`b1 == 0x00`): `b0` is `0x01` pressed / `0x00`
//!   released for a single configured source.
//! - **Two-axis encoding** (`b0` is `0x7F` or `0xFF`): each byte position
//!   is its own source — byte 0 the handset (source 4), byte 1 the headset
//!   (source 1) — with `0xFF` pressed / `0x7F` released.
//!
//! A report is tested against the simple pattern first; only a non-match
//! falls through to the two-axis interpretation. The discriminator is kept
//! exactly for wire compatibility, fragile as it would be if a third
//! encoding ever appeared.
//!
//! Debounce: each source carries one "currently pressed" flag, and a
//! transition is emitted only on a flag change. Steady-state repeats emit
//! nothing.

use tracing::{debug, warn};

use crate::event::{PttEvent, PttTransition, HANDSET_SOURCE, HEADSET_SOURCE};

/// Simple-encoding released byte
pub const USB_KEY_RELEASED: u8 = 0x00;
/// Simple-encoding pressed byte
pub const USB_KEY_PRESSED: u8 = 0x01;
/// Two-axis released sentinel
pub const JS_KEY_RELEASED: u8 = 0x7F;
/// Two-axis pressed sentinel
pub const JS_KEY_PRESSED: u8 = 0xFF;

/// Per-source debounce state machine over raw 2-byte reports.
///
/// State lives for the duration of one monitor run; it is deliberately not
/// reset on reconnect, so a state change that happened while the device was
/// unplugged is reported as a single transition once reports resume.
#[derive(Debug)]
pub struct ReportDecoder {
    usb_source_id: u8,
    usb_pressed: bool,
    handset_pressed: bool,
    headset_pressed: bool,
}

impl ReportDecoder {
    /// All sources start released. `usb_source_id` is the source reported
    /// for simple-encoding devices (conventionally 1).
    pub fn new(usb_source_id: u8) -> Self {
        Self {
            usb_source_id,
            usb_pressed: false,
            handset_pressed: false,
            headset_pressed: false,
        }
    }

    /// Classify one report and return the debounced transitions it caused.
    ///
    /// At most one transition results from a simple-encoding report; a
    /// two-axis report can change both sources at once.
    pub fn feed(&mut self, b0: u8, b1: u8) -> Vec<PttTransition> {
        let mut out = Vec::new();

        if b1 == 0x00 {
            match b0 {
                USB_KEY_PRESSED => {
                    if !self.usb_pressed {
                        self.usb_pressed = true;
                        out.push(transition(self.usb_source_id, true));
                    }
                }
                USB_KEY_RELEASED => {
                    if self.usb_pressed {
                        self.usb_pressed = false;
                        out.push(transition(self.usb_source_id, false));
                    }
                }
                other => {
                    // Invalid report value: treated as released, no edge emitted
                    warn!("Invalid PTT report byte 0x{other:02X}");
                    self.usb_pressed = false;
                }
            }
        } else if b0 == JS_KEY_PRESSED || b0 == JS_KEY_RELEASED {
            // Byte 0 drives the handset source
            if b0 == JS_KEY_PRESSED && !self.handset_pressed {
                self.handset_pressed = true;
                out.push(transition(HANDSET_SOURCE, true));
            } else if b0 == JS_KEY_RELEASED && self.handset_pressed {
                self.handset_pressed = false;
                out.push(transition(HANDSET_SOURCE, false));
            }

            // Byte 1 drives the headset source independently; values other
            // than the two sentinels leave it untouched
            if b1 == JS_KEY_PRESSED && !self.headset_pressed {
                self.headset_pressed = true;
                out.push(transition(HEADSET_SOURCE, true));
            } else if b1 == JS_KEY_RELEASED && self.headset_pressed {
                self.headset_pressed = false;
                out.push(transition(HEADSET_SOURCE, false));
            }
        } else {
            debug!("Unrecognized PTT report: {b0:02X} {b1:02X}");
        }

        out
    }
}

fn transition(source_id: u8, pressed: bool) -> PttTransition {
    PttTransition {
        event: PttEvent { source_id },
        pressed,
    }
}
