//! PTT notification records and listener fan-out
//!
//! A [`PttEvent`] carries only the logical source that produced it. Two
//! sources exist in practice: the headset button (source 1, also the default
//! for simple-encoding devices) and the handset button (source 4). Events are
//! created fresh for each notification and never persisted.

/// Conventional source id for the headset PTT button
pub const HEADSET_SOURCE: u8 = 1;

/// Conventional source id for the handset PTT button
pub const HANDSET_SOURCE: u8 = 4;

/// The unit of notification: which logical control changed state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PttEvent {
    /// Logical source that produced the event
    pub source_id: u8,
}

/// A single debounced edge: an event plus its direction
///
/// This is what the monitor's broadcast channel carries; listener callbacks
/// receive the direction implicitly through which method is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PttTransition {
    /// The event record
    pub event: PttEvent,
    /// `true` for a press edge, `false` for a release edge
    pub pressed: bool,
}

/// Trait for reacting to debounced PTT state changes.
///
/// Callbacks run synchronously on the monitor's thread, in registration
/// order, before the next device read begins. A listener that blocks stalls
/// the read cycle; keeping callbacks fast is the implementor's
/// responsibility.
pub trait PttListener: Send {
    fn ptt_pressed(&mut self, event: &PttEvent);
    fn ptt_released(&mut self, event: &PttEvent);
}

/// Insertion-ordered set of listeners with synchronous fan-out.
///
/// Held by the monitor by ownership rather than inherited from, so the
/// monitor is-not-a broadcaster; it has one.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn PttListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registration is expected to complete before
    /// monitoring starts; ordering relative to in-flight dispatch is
    /// unspecified.
    pub fn register(&mut self, listener: Box<dyn PttListener>) {
        self.listeners.push(listener);
    }

    pub fn notify_pressed(&mut self, event: &PttEvent) {
        for listener in &mut self.listeners {
            listener.ptt_pressed(event);
        }
    }

    pub fn notify_released(&mut self, event: &PttEvent) {
        for listener in &mut self.listeners {
            listener.ptt_released(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl PttListener for Tagged {
        fn ptt_pressed(&mut self, event: &PttEvent) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}+{}", self.tag, event.source_id));
        }

        fn ptt_released(&mut self, event: &PttEvent) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}-{}", self.tag, event.source_id));
        }
    }

    #[test]
    fn fan_out_preserves_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.register(Box::new(Tagged {
            tag: "a",
            log: log.clone(),
        }));
        set.register(Box::new(Tagged {
            tag: "b",
            log: log.clone(),
        }));

        let event = PttEvent {
            source_id: HEADSET_SOURCE,
        };
        set.notify_pressed(&event);
        set.notify_released(&event);

        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["a+1", "b+1", "a-1", "b-1"]);
    }
}
