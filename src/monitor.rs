//! The monitor: background read loop, recovery policy, and lifecycle
//!
//! One [`PttMonitor`] owns one dedicated background thread. The thread
//! drives a session through a read/decode/dispatch cycle, reconnecting on
//! failure, until the owner clears the running flag. The flag is the only
//! state shared across the thread boundary; debounce state and the device
//! handle are private to the loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hidapi::HidApi;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::decoder::ReportDecoder;
use crate::error::PttError;
use crate::event::{ListenerSet, PttListener, PttTransition};
use crate::locator::{self, LocatedDevice};
use crate::session::{DeviceSession, REPORT_SIZE};

/// Broadcast channel capacity for transition events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Poll interval while waiting for the monitor thread to finish
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Step size for cooldown sleeps, so shutdown is observed promptly
const COOLDOWN_STEP: Duration = Duration::from_millis(20);

/// Source of raw 2-byte PTT reports.
///
/// `Ok(0)` means no data arrived within the source's timeout window; an
/// error means the handle is gone and the loop must recover.
pub trait ReportSource: Send {
    fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> Result<usize, PttError>;
}

impl ReportSource for DeviceSession {
    fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> Result<usize, PttError> {
        DeviceSession::read_report(self, buf)
    }
}

/// Seam between the monitor loop and the hardware layer.
///
/// The monitor invokes this from the constructor (initial locate) and from
/// its own thread (open, recovery) — never from two threads at once.
pub trait DeviceBackend: Send + 'static {
    type Source: ReportSource;

    /// Fresh enumeration; must not cache results across calls
    fn locate(&mut self, query: &str) -> Result<Option<LocatedDevice>, PttError>;

    /// Open the located device and emit its diagnostics
    fn open(&mut self, located: &LocatedDevice) -> Result<Self::Source, PttError>;
}

/// hidapi-backed implementation of [`DeviceBackend`]
pub struct HidBackend {
    read_timeout_ms: i32,
}

impl HidBackend {
    pub fn new(read_timeout_ms: i32) -> Self {
        Self { read_timeout_ms }
    }
}

impl DeviceBackend for HidBackend {
    type Source = DeviceSession;

    fn locate(&mut self, query: &str) -> Result<Option<LocatedDevice>, PttError> {
        locator::locate(query)
    }

    fn open(&mut self, located: &LocatedDevice) -> Result<DeviceSession, PttError> {
        let api = HidApi::new()?;
        let session = DeviceSession::open(&api, located, self.read_timeout_ms)?;
        session.log_diagnostics();
        Ok(session)
    }
}

/// Handle to a running PTT monitor.
///
/// Created by [`PttMonitor::initialize`]; dropping the handle (or calling
/// [`shutdown`](Self::shutdown)) stops the background thread, bounded by
/// the configured shutdown timeout.
pub struct PttMonitor {
    running: Arc<AtomicBool>,
    listeners: Arc<Mutex<ListenerSet>>,
    event_tx: broadcast::Sender<PttTransition>,
    thread: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl PttMonitor {
    /// Locate the configured device and start monitoring it.
    ///
    /// The only error that reaches the caller is a failed initial locate
    /// (or invalid config); everything after construction is absorbed by
    /// the recovery loop.
    pub fn initialize(config: MonitorConfig) -> Result<Self, PttError> {
        let backend = HidBackend::new(config.read_timeout_ms);
        Self::with_backend(config, backend)
    }

    /// Start monitoring against an explicit backend.
    ///
    /// This is the seam the integration tests use to drive the loop with
    /// scripted reports instead of hardware.
    pub fn with_backend<B: DeviceBackend>(
        config: MonitorConfig,
        mut backend: B,
    ) -> Result<Self, PttError> {
        config.validate()?;

        let located = backend
            .locate(&config.device_query)?
            .ok_or_else(|| PttError::NotFound(config.device_query.clone()))?;

        let running = Arc::new(AtomicBool::new(true));
        let listeners = Arc::new(Mutex::new(ListenerSet::new()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shutdown_timeout = Duration::from_millis(config.shutdown_timeout_ms);

        let monitor_loop = MonitorLoop {
            backend,
            config,
            running: running.clone(),
            listeners: listeners.clone(),
            event_tx: event_tx.clone(),
        };

        let thread = thread::Builder::new()
            .name("ptt-monitor".into())
            .spawn(move || monitor_loop.run(located))
            .expect("Failed to spawn ptt-monitor thread");

        Ok(Self {
            running,
            listeners,
            event_tx,
            thread: Some(thread),
            shutdown_timeout,
        })
    }

    /// Register a listener for synchronous press/release callbacks.
    ///
    /// Registration is expected to complete before the device starts
    /// producing reports; dispatch order relative to a concurrent
    /// registration is unspecified. Must not be called from inside a
    /// listener callback: dispatch holds the listener lock, so re-entrant
    /// registration deadlocks.
    pub fn add_listener(&self, listener: impl PttListener + 'static) {
        self.listeners.lock().register(Box::new(listener));
    }

    /// Subscribe to transition events via a broadcast channel.
    ///
    /// Lagging receivers lose events; they never block the monitor loop.
    pub fn subscribe(&self) -> broadcast::Receiver<PttTransition> {
        self.event_tx.subscribe()
    }

    /// Whether the monitor thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the monitor and wait for its thread, bounded by the shutdown
    /// timeout. Equivalent to dropping the handle.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        let Some(handle) = self.thread.take() else {
            return;
        };

        let deadline = Instant::now() + self.shutdown_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.is_finished() {
            let _ = handle.join();
            debug!("ptt-monitor thread joined");
        } else {
            // Best-effort escape hatch: the thread is detached and may leak
            // its in-flight read. With the poll-timeout reads this branch
            // is only reachable if a read call wedges inside the kernel.
            warn!(
                "ptt-monitor thread did not stop within {:?}, detaching",
                self.shutdown_timeout
            );
        }
    }
}

impl Drop for PttMonitor {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// State owned by the monitor thread
struct MonitorLoop<B: DeviceBackend> {
    backend: B,
    config: MonitorConfig,
    running: Arc<AtomicBool>,
    listeners: Arc<Mutex<ListenerSet>>,
    event_tx: broadcast::Sender<PttTransition>,
}

impl<B: DeviceBackend> MonitorLoop<B> {
    fn run(mut self, located: LocatedDevice) {
        debug!("ptt-monitor thread started");

        let mut decoder = ReportDecoder::new(self.config.usb_source_id);
        let throttle = Duration::from_millis(self.config.poll_throttle_ms);

        // Initial open; a failure here enters recovery like any later loss
        // rather than silently ending the thread
        let mut session = match self.backend.open(&located) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Initial open failed: {e}");
                None
            }
        };

        while self.running.load(Ordering::Relaxed) {
            let Some(source) = session.as_mut() else {
                session = self.recover();
                continue;
            };

            let mut buf = [0u8; REPORT_SIZE];
            let outcome = source.read_report(&mut buf);

            // Unconditional throttle, bounding device chatter and CPU
            thread::sleep(throttle);

            match outcome {
                Err(e) => {
                    warn!("PTT read failed: {e}");
                    session = None;
                }
                Ok(n) if n < REPORT_SIZE => {
                    // Timeout or runt report: discard silently
                }
                Ok(_) => {
                    debug!("PTT report: {:02X} {:02X}", buf[0], buf[1]);
                    for t in decoder.feed(buf[0], buf[1]) {
                        self.dispatch(t);
                    }
                }
            }
        }

        debug!("ptt-monitor thread exiting");
    }

    /// Fan one transition out to listeners and channel subscribers, on this
    /// thread, before the next read begins
    fn dispatch(&self, t: PttTransition) {
        info!(
            "PTT source {} {}",
            t.event.source_id,
            if t.pressed { "pressed" } else { "released" }
        );

        let mut listeners = self.listeners.lock();
        if t.pressed {
            listeners.notify_pressed(&t.event);
        } else {
            listeners.notify_released(&t.event);
        }
        drop(listeners);

        // No subscribers is fine
        let _ = self.event_tx.send(t);
    }

    /// One recovery attempt: fresh locate, then open. On failure, wait out
    /// the cooldown (still honoring the running flag) and report no
    /// session; the outer loop retries indefinitely.
    fn recover(&mut self) -> Option<B::Source> {
        info!(
            "Trying to reconnect PTT device {:?}",
            self.config.device_query
        );

        match self.try_reconnect() {
            Ok(session) => {
                info!("PTT device reconnected");
                Some(session)
            }
            Err(e) => {
                warn!(
                    "PTT recovery failed: {e}; retrying in {}ms",
                    self.config.recover_cooldown_ms
                );
                self.cooldown();
                None
            }
        }
    }

    fn try_reconnect(&mut self) -> Result<B::Source, PttError> {
        let located = self
            .backend
            .locate(&self.config.device_query)?
            .ok_or_else(|| PttError::NotFound(self.config.device_query.clone()))?;
        self.backend.open(&located)
    }

    fn cooldown(&self) {
        let deadline = Instant::now() + Duration::from_millis(self.config.recover_cooldown_ms);
        while self.running.load(Ordering::Relaxed) && Instant::now() < deadline {
            thread::sleep(COOLDOWN_STEP);
        }
    }
}
