//! End-to-end loopback runs against the in-memory backend and routing platform.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use audio_loopback_core::mock::{MockBackend, MockRouting, ReadStep};
use audio_loopback_core::{
    DeviceError, EngineError, LoopbackConfiguration, LoopbackDelegate, LoopbackEngine, RoutingError, SessionState,
};

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct RecordingDelegate {
    states: Mutex<Vec<SessionState>>,
    errors: Mutex<Vec<EngineError>>,
}

impl LoopbackDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_error(&self, error: &EngineError) {
        self.errors.lock().push(error.clone());
    }
}

struct Harness {
    engine: LoopbackEngine<MockBackend, MockRouting>,
    backend: MockBackend,
    routing: Arc<MockRouting>,
    delegate: Arc<RecordingDelegate>,
}

fn harness(min_buffer_samples: usize, config: LoopbackConfiguration) -> Harness {
    let backend = MockBackend::new(min_buffer_samples);
    let routing = Arc::new(MockRouting::new());
    let engine = LoopbackEngine::with_configuration(backend.clone(), Arc::clone(&routing), config).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    engine.set_delegate(delegate.clone());
    Harness {
        engine,
        backend,
        routing,
        delegate,
    }
}

fn quick_config() -> LoopbackConfiguration {
    LoopbackConfiguration {
        stop_timeout_ms: 100,
        ..Default::default()
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn unity_gain_passes_frame_through() {
    let h = harness(512, quick_config());
    let probe = h.backend.probe();
    probe.push_read(ReadStep::Frame(vec![1000; 512]));

    h.engine.start(1.0).unwrap();
    assert!(probe.wait_for_played_frames(1, WAIT));
    h.engine.stop();

    assert_eq!(probe.played_frames(), vec![vec![1000; 512]]);
}

#[test]
fn gain_saturates_instead_of_wrapping() {
    let h = harness(4, quick_config());
    let probe = h.backend.probe();
    probe.push_read(ReadStep::Frame(vec![20_000, -20_000, 100, 0]));

    h.engine.start(2.0).unwrap();
    assert!(probe.wait_for_played_frames(1, WAIT));
    h.engine.stop();

    assert_eq!(probe.played_samples(), vec![i16::MAX, i16::MIN, 200, 0]);
}

#[test]
fn focus_denial_opens_no_endpoints() {
    let h = harness(64, quick_config());
    h.routing.set_focus_granted(false);

    let err = h.engine.start(1.0).unwrap_err();
    assert_eq!(err, EngineError::Routing(RoutingError::FocusDenied));
    assert_eq!(h.backend.probe().captures_opened(), 0);
    assert_eq!(h.backend.probe().playbacks_opened(), 0);
    assert_eq!(h.engine.state(), SessionState::Idle);
}

#[test]
fn transient_read_failures_are_ridden_out() {
    let h = harness(8, quick_config());
    let probe = h.backend.probe();
    for _ in 0..3 {
        probe.push_read(ReadStep::Fail("overrun".into()));
    }
    probe.push_read(ReadStep::Frame(vec![7; 8]));

    h.engine.start(1.0).unwrap();
    assert!(probe.wait_for_played_frames(1, WAIT));
    assert!(h.engine.is_running());

    assert!(wait_until(WAIT, || h.engine.diagnostics().frames_processed == 1));
    assert_eq!(h.engine.diagnostics().read_failures, 3);
    h.engine.stop();
    assert_eq!(probe.played_frames(), vec![vec![7; 8]]);
}

#[test]
fn persistent_read_failures_stop_the_engine() {
    let config = LoopbackConfiguration {
        max_consecutive_failures: 3,
        ..quick_config()
    };
    let h = harness(8, config);
    let probe = h.backend.probe();
    for _ in 0..4 {
        probe.push_read(ReadStep::Fail("device unplugged".into()));
    }

    h.engine.start(1.0).unwrap();
    assert!(wait_until(WAIT, || h.engine.state() == SessionState::Idle));
    assert!(wait_until(WAIT, || !h.delegate.errors.lock().is_empty()));

    let errors = h.delegate.errors.lock().clone();
    assert!(matches!(
        errors.as_slice(),
        [EngineError::Device(DeviceError::TooManyFailures { consecutive: 4, .. })]
    ));
    assert!(matches!(
        h.engine.diagnostics().last_error,
        Some(DeviceError::TooManyFailures { .. })
    ));
    assert!(probe.wait_for_live_handles(0, WAIT));
    assert!(!h.routing.focus_held());

    // A fresh start works after a self-stop.
    h.engine.start(1.0).unwrap();
    assert!(h.engine.is_running());
    h.engine.stop();
}

#[test]
fn endless_empty_reads_stop_the_engine() {
    let config = LoopbackConfiguration {
        max_consecutive_failures: 2,
        ..quick_config()
    };
    let h = harness(8, config);
    let probe = h.backend.probe();
    for _ in 0..3 {
        probe.push_read(ReadStep::Empty);
    }

    h.engine.start(1.0).unwrap();
    assert!(wait_until(WAIT, || !h.delegate.errors.lock().is_empty()));

    assert_eq!(h.engine.state(), SessionState::Idle);
    assert!(matches!(
        h.delegate.errors.lock().as_slice(),
        [EngineError::Device(DeviceError::TooManyFailures { consecutive: 3, .. })]
    ));
    assert_eq!(h.engine.diagnostics().read_failures, 3);
    assert!(probe.played_frames().is_empty());
    assert!(probe.wait_for_live_handles(0, WAIT));
}

#[test]
fn stop_during_unresponsive_read_is_bounded() {
    let h = harness(8, quick_config());
    let probe = h.backend.probe();
    probe.push_read(ReadStep::Hang(Duration::from_millis(1500)));

    h.engine.start(1.0).unwrap();
    assert!(probe.wait_for_reads_served(1, WAIT));

    let began = Instant::now();
    h.engine.stop();
    assert!(began.elapsed() < Duration::from_millis(1000));

    assert_eq!(h.engine.state(), SessionState::Idle);
    assert_eq!(probe.live_handles(), 0);
    assert!(!h.routing.focus_held());
}

#[test]
fn stop_interrupts_a_blocked_read() {
    let h = harness(8, quick_config());
    let probe = h.backend.probe();
    probe.push_read(ReadStep::Block(Duration::from_secs(10)));

    h.engine.start(1.0).unwrap();
    assert!(probe.wait_for_reads_served(1, WAIT));

    let began = Instant::now();
    h.engine.stop();
    assert!(began.elapsed() < Duration::from_millis(500));
    assert_eq!(probe.live_handles(), 0);
}

#[test]
fn start_while_running_opens_nothing_new() {
    let h = harness(64, quick_config());
    h.engine.start(1.0).unwrap();

    assert_eq!(h.engine.start(1.0), Err(EngineError::AlreadyRunning));
    assert_eq!(h.backend.probe().captures_opened(), 1);
    assert_eq!(h.backend.probe().playbacks_opened(), 1);
    assert!(h.engine.is_running());
    h.engine.stop();
}

#[test]
fn stop_is_idempotent() {
    let h = harness(64, quick_config());
    h.engine.stop();
    assert!(h.delegate.states.lock().is_empty());

    h.engine.start(1.0).unwrap();
    h.engine.stop();
    h.engine.stop();

    assert_eq!(
        *h.delegate.states.lock(),
        vec![
            SessionState::Starting,
            SessionState::Running,
            SessionState::Stopping,
            SessionState::Idle
        ]
    );
    assert_eq!(h.backend.probe().captures_released(), 1);
    assert_eq!(h.backend.probe().playbacks_released(), 1);
}

#[test]
fn gain_change_applies_to_next_frame() {
    let h = harness(2, quick_config());
    let probe = h.backend.probe();
    probe.push_read(ReadStep::Frame(vec![100, -100]));

    h.engine.start(1.0).unwrap();
    assert!(probe.wait_for_played_frames(1, WAIT));

    h.engine.set_gain(3.0);
    probe.push_read(ReadStep::Frame(vec![100, -100]));
    assert!(probe.wait_for_played_frames(2, WAIT));
    h.engine.stop();

    assert_eq!(probe.played_frames(), vec![vec![100, -100], vec![300, -300]]);
}

#[test]
fn reconfigure_restarts_without_passing_through_idle() {
    let h = harness(64, quick_config());
    h.engine.start(1.5).unwrap();

    let config = LoopbackConfiguration {
        stop_timeout_ms: 100,
        ..LoopbackConfiguration::bluetooth_headset()
    };
    h.engine.reconfigure(config).unwrap();

    assert!(h.engine.is_running());
    assert_eq!(h.engine.gain(), 1.5);
    assert_eq!(h.backend.probe().last_buffer_samples(), Some(256));
    assert_eq!(h.backend.probe().live_handles(), 2);
    assert_eq!(
        *h.delegate.states.lock(),
        vec![
            SessionState::Starting,
            SessionState::Running,
            SessionState::Stopping,
            SessionState::Starting,
            SessionState::Running
        ]
    );
    h.engine.stop();
}

#[test]
fn reconfigure_rejects_invalid_configuration() {
    let h = harness(64, quick_config());
    h.engine.start(1.0).unwrap();

    let config = LoopbackConfiguration {
        stop_timeout_ms: 0,
        ..Default::default()
    };
    assert!(matches!(h.engine.reconfigure(config), Err(EngineError::InvalidConfiguration(_))));
    assert!(h.engine.is_running());
    h.engine.stop();
}

#[test]
fn playback_open_failure_rolls_back_routing() {
    let h = harness(64, quick_config());
    h.backend.probe().fail_playback_open(true);

    let err = h.engine.start(1.0).unwrap_err();
    assert!(matches!(err, EngineError::Device(DeviceError::OpenFailed { .. })));
    assert_eq!(h.backend.probe().live_handles(), 0);
    assert!(!h.routing.focus_held());
    assert_eq!(h.engine.state(), SessionState::Idle);
}

#[test]
fn required_bluetooth_without_headset_fails_start() {
    let config = LoopbackConfiguration {
        require_bluetooth: true,
        ..quick_config()
    };
    let h = harness(64, config);
    h.routing.set_sco_available(false);

    let err = h.engine.start(1.0).unwrap_err();
    assert!(matches!(err, EngineError::Routing(RoutingError::ScoUnavailable(_))));
    assert_eq!(h.backend.probe().captures_opened(), 0);
    assert!(!h.routing.focus_held());
}

#[test]
fn missing_headset_falls_back_to_default_route() {
    let h = harness(4, quick_config());
    h.routing.set_sco_available(false);
    h.backend.probe().push_read(ReadStep::Frame(vec![1, 2, 3, 4]));

    h.engine.start(1.0).unwrap();
    assert!(h.backend.probe().wait_for_played_frames(1, WAIT));
    assert!(!h.engine.routing_state().bluetooth_sco_enabled);
    h.engine.stop();
}
