//! Monitor loop integration tests against a scripted backend.
//!
//! No hardware involved: a fake `DeviceBackend` feeds canned reports,
//! simulated read failures, and hangs, and the tests observe the debounced
//! notifications and lifecycle behavior from the outside.

use std::collections::VecDeque;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ptt_monitor::{
    BusKind, DeviceBackend, LocatedDevice, MatchedAttribute, MonitorConfig, PttError, PttEvent,
    PttListener, PttMonitor, ReportSource, REPORT_SIZE,
};

/// One scripted read outcome
#[derive(Clone)]
enum Step {
    /// Deliver a 2-byte report
    Report([u8; 2]),
    /// Simulate an unplug: the read fails and the loop must recover
    Fail,
    /// Wedge the read forever (shutdown escape-hatch test)
    Hang,
}

struct ScriptedSource {
    steps: VecDeque<Step>,
    /// Reads return no data until the test opens the gate, so listeners
    /// can be registered before any report is dispatched
    gate: Arc<AtomicBool>,
}

impl ReportSource for ScriptedSource {
    fn read_report(&mut self, buf: &mut [u8; REPORT_SIZE]) -> Result<usize, PttError> {
        if !self.gate.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }
        match self.steps.pop_front() {
            Some(Step::Report(bytes)) => {
                *buf = bytes;
                Ok(REPORT_SIZE)
            }
            Some(Step::Fail) => Err(PttError::Read("simulated unplug".into())),
            Some(Step::Hang) => loop {
                std::thread::sleep(Duration::from_millis(50));
            },
            None => {
                std::thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
        }
    }
}

struct ScriptedBackend {
    /// Each successful open consumes the next script
    sessions: VecDeque<Vec<Step>>,
    /// Per-call locate outcomes: `true` = "not found". Exhausted pattern
    /// means every further locate succeeds.
    miss_pattern: VecDeque<bool>,
    gate: Arc<AtomicBool>,
    locates: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(sessions: Vec<Vec<Step>>) -> Self {
        Self {
            sessions: sessions.into(),
            miss_pattern: VecDeque::new(),
            gate: Arc::new(AtomicBool::new(false)),
            locates: Arc::new(AtomicUsize::new(0)),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn located() -> LocatedDevice {
        LocatedDevice {
            path: CString::new("scripted0").unwrap(),
            vendor_id: 0x16c0,
            product_id: 0x05df,
            bus: BusKind::Usb,
            matched: MatchedAttribute::Product,
        }
    }
}

impl DeviceBackend for ScriptedBackend {
    type Source = ScriptedSource;

    fn locate(&mut self, _query: &str) -> Result<Option<LocatedDevice>, PttError> {
        self.locates.fetch_add(1, Ordering::SeqCst);
        if self.miss_pattern.pop_front().unwrap_or(false) {
            return Ok(None);
        }
        Ok(Some(Self::located()))
    }

    fn open(&mut self, _located: &LocatedDevice) -> Result<ScriptedSource, PttError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let steps = self.sessions.pop_front().unwrap_or_default();
        Ok(ScriptedSource {
            steps: steps.into(),
            gate: self.gate.clone(),
        })
    }
}

/// Listener that records every edge it sees
#[derive(Clone, Default)]
struct Recorder {
    log: Arc<Mutex<Vec<(u8, bool)>>>,
}

impl Recorder {
    fn edges(&self) -> Vec<(u8, bool)> {
        self.log.lock().unwrap().clone()
    }
}

impl PttListener for Recorder {
    fn ptt_pressed(&mut self, event: &PttEvent) {
        self.log.lock().unwrap().push((event.source_id, true));
    }

    fn ptt_released(&mut self, event: &PttEvent) {
        self.log.lock().unwrap().push((event.source_id, false));
    }
}

fn fast_config() -> MonitorConfig {
    let mut config = MonitorConfig::new("scripted");
    config.poll_throttle_ms = 1;
    config.read_timeout_ms = 1;
    config.recover_cooldown_ms = 10;
    config.shutdown_timeout_ms = 2000;
    config
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[test]
fn simple_encoding_emits_one_edge_per_run() {
    let backend = ScriptedBackend::new(vec![vec![
        Step::Report([0x01, 0x00]),
        Step::Report([0x01, 0x00]),
        Step::Report([0x01, 0x00]),
        Step::Report([0x00, 0x00]),
        Step::Report([0x00, 0x00]),
    ]]);
    let gate = backend.gate.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    let recorder = Recorder::default();
    monitor.add_listener(recorder.clone());
    gate.store(true, Ordering::SeqCst);

    assert!(wait_until(Duration::from_secs(5), || recorder.edges().len() >= 2));
    // Give the loop a moment to prove no further edges arrive
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.edges(), vec![(1, true), (1, false)]);

    monitor.shutdown();
}

#[test]
fn two_axis_columns_update_independently() {
    let backend = ScriptedBackend::new(vec![vec![
        Step::Report([0xFF, 0x7F]),
        Step::Report([0xFF, 0x7F]),
        Step::Report([0x7F, 0xFF]),
    ]]);
    let gate = backend.gate.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    let recorder = Recorder::default();
    monitor.add_listener(recorder.clone());
    gate.store(true, Ordering::SeqCst);

    assert!(wait_until(Duration::from_secs(5), || recorder.edges().len() >= 3));
    std::thread::sleep(Duration::from_millis(50));
    // First report: handset pressed, headset stays released. Second is a
    // repeat. Third changes both columns.
    assert_eq!(
        recorder.edges(),
        vec![(4, true), (4, false), (1, true)]
    );

    monitor.shutdown();
}

#[test]
fn read_failure_triggers_rediscovery_and_resumes() {
    let backend = ScriptedBackend::new(vec![
        vec![Step::Report([0x01, 0x00]), Step::Fail],
        vec![Step::Report([0x00, 0x00])],
    ]);
    let gate = backend.gate.clone();
    let locates = backend.locates.clone();
    let opens = backend.opens.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    let recorder = Recorder::default();
    monitor.add_listener(recorder.clone());
    gate.store(true, Ordering::SeqCst);

    assert!(wait_until(Duration::from_secs(5), || recorder.edges().len() >= 2));
    std::thread::sleep(Duration::from_millis(50));

    // The release from the second session arrived exactly once; no stale
    // re-delivery of the press after reconnect
    assert_eq!(recorder.edges(), vec![(1, true), (1, false)]);
    // Initial locate plus at least one rediscovery, and two opens
    assert!(locates.load(Ordering::SeqCst) >= 2);
    assert_eq!(opens.load(Ordering::SeqCst), 2);

    monitor.shutdown();
}

#[test]
fn recovery_retries_after_locate_misses() {
    let mut backend = ScriptedBackend::new(vec![
        vec![Step::Fail],
        vec![Step::Report([0x01, 0x00])],
    ]);
    // Initial locate succeeds; the next two (recovery) attempts report
    // "not found" and each costs one cooldown before the retry lands
    backend.miss_pattern = vec![false, true, true].into();
    let gate = backend.gate.clone();
    let locates = backend.locates.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    let recorder = Recorder::default();
    monitor.add_listener(recorder.clone());
    gate.store(true, Ordering::SeqCst);

    assert!(wait_until(Duration::from_secs(5), || {
        recorder.edges() == vec![(1, true)]
    }));
    // Initial + two misses + the successful rediscovery
    assert!(locates.load(Ordering::SeqCst) >= 4);

    monitor.shutdown();
}

#[test]
fn locator_miss_yields_no_monitor() {
    let mut backend = ScriptedBackend::new(vec![]);
    backend.miss_pattern = vec![true].into();
    let opens = backend.opens.clone();

    let result = PttMonitor::with_backend(fast_config(), backend);
    assert!(matches!(result, Err(PttError::NotFound(_))));

    // No thread started, nothing was ever opened
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(opens.load(Ordering::SeqCst), 0);
}

#[test]
fn empty_device_query_is_rejected() {
    let backend = ScriptedBackend::new(vec![]);
    let mut config = fast_config();
    config.device_query = String::new();

    let result = PttMonitor::with_backend(config, backend);
    assert!(matches!(result, Err(PttError::InvalidConfig(_))));
}

#[test]
fn shutdown_of_quiet_device_is_prompt() {
    // Sessions run dry immediately; the loop just polls quiet reads
    let backend = ScriptedBackend::new(vec![vec![]]);
    let gate = backend.gate.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    gate.store(true, Ordering::SeqCst);
    assert!(monitor.is_running());

    let start = Instant::now();
    monitor.shutdown();
    // Well within the 2s bound: the poll-timeout read observes the flag
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn blocked_read_still_returns_within_shutdown_timeout() {
    let backend = ScriptedBackend::new(vec![vec![Step::Hang]]);
    let gate = backend.gate.clone();

    let mut config = fast_config();
    config.shutdown_timeout_ms = 300;

    let monitor = PttMonitor::with_backend(config, backend).unwrap();
    gate.store(true, Ordering::SeqCst);

    // Let the loop reach the hanging read
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    monitor.shutdown();
    let elapsed = start.elapsed();

    // Forced-detach path: control returns around the timeout even though
    // the read never unblocks (the detached thread is leaked by design)
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[test]
fn broadcast_subscription_sees_transitions() {
    let backend = ScriptedBackend::new(vec![vec![
        Step::Report([0x01, 0x00]),
        Step::Report([0x00, 0x00]),
    ]]);
    let gate = backend.gate.clone();

    let monitor = PttMonitor::with_backend(fast_config(), backend).unwrap();
    let mut rx = monitor.subscribe();
    gate.store(true, Ordering::SeqCst);

    let mut seen = Vec::new();
    assert!(wait_until(Duration::from_secs(5), || {
        while let Ok(t) = rx.try_recv() {
            seen.push((t.event.source_id, t.pressed));
        }
        seen.len() >= 2
    }));
    assert_eq!(seen, vec![(1, true), (1, false)]);

    monitor.shutdown();
}
