use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use uuid::Uuid;

use crate::models::config::{LoopbackConfiguration, ProcessingOptions};
use crate::models::devices::BufferConfig;
use crate::models::diagnostics::{LoopStats, LoopbackDiagnostics};
use crate::models::error::{DeviceError, EngineError, RoutingError};
use crate::models::routing_state::RoutingState;
use crate::models::state::SessionState;
use crate::processing::gain::GainSetting;
use crate::routing::controller::RoutingController;
use crate::session::device_session::{DeviceSession, SessionOptions};
use crate::traits::audio_backend::AudioBackend;
use crate::traits::delegate::LoopbackDelegate;
use crate::traits::routing_platform::RoutingPlatform;

use super::worker;

const LOOP_THREAD_NAME: &str = "audio-loopback";

/// One running session: its endpoints, loop thread, and the handles to stop it.
struct ActiveSession<B: AudioBackend> {
    id: Uuid,
    session: Arc<DeviceSession<B::Capture, B::Playback>>,
    /// Cleared exactly once; whoever clears it owns teardown.
    run: Arc<AtomicBool>,
    /// Disconnects when the loop body returns.
    done: Receiver<()>,
    worker: Option<thread::JoinHandle<()>>,
    stop_timeout: Duration,
}

/// Delegate callback queued while the `active` slot is held.
enum Notification {
    State(SessionState),
    Error(EngineError),
}

struct EngineInner<B: AudioBackend, R: RoutingPlatform> {
    backend: B,
    routing: RoutingController<R>,
    config: Mutex<LoopbackConfiguration>,
    gain: Arc<GainSetting>,
    state: Mutex<SessionState>,
    /// Held across every start/stop/reconfigure so transitions never interleave.
    active: Mutex<Option<ActiveSession<B>>>,
    stats: Arc<LoopStats>,
    diagnostics: Mutex<LoopbackDiagnostics>,
    delegate: Mutex<Option<Arc<dyn LoopbackDelegate>>>,
    /// Filled under the `active` lock, drained after it is released.
    outbox: Mutex<Vec<Notification>>,
    /// Held by the one thread currently delivering the outbox.
    delivering: Mutex<()>,
}

/// Real-time microphone → speaker loopback with adjustable gain.
///
/// Owns the routing controller and at most one device session. Control calls
/// may come from any thread; the audio itself moves on a dedicated loop thread.
///
/// ```text
/// start:  routing.acquire → DeviceSession::open → start_io → loop thread
/// stop:   run=false → interrupt → bounded join → release session → routing.release
/// ```
pub struct LoopbackEngine<B: AudioBackend, R: RoutingPlatform> {
    inner: Arc<EngineInner<B, R>>,
}

impl<B: AudioBackend, R: RoutingPlatform> LoopbackEngine<B, R> {
    pub fn new(backend: B, routing: Arc<R>) -> Self {
        Self::build(backend, routing, LoopbackConfiguration::default())
    }

    pub fn with_configuration(
        backend: B,
        routing: Arc<R>,
        config: LoopbackConfiguration,
    ) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::InvalidConfiguration)?;
        Ok(Self::build(backend, routing, config))
    }

    fn build(backend: B, routing: Arc<R>, config: LoopbackConfiguration) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                backend,
                routing: RoutingController::new(routing),
                config: Mutex::new(config),
                gain: Arc::new(GainSetting::default()),
                state: Mutex::new(SessionState::Idle),
                active: Mutex::new(None),
                stats: Arc::new(LoopStats::default()),
                diagnostics: Mutex::new(LoopbackDiagnostics::default()),
                delegate: Mutex::new(None),
                outbox: Mutex::new(Vec::new()),
                delivering: Mutex::new(()),
            }),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn LoopbackDelegate>) {
        *self.inner.delegate.lock() = Some(delegate);
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn routing(&self) -> &RoutingController<R> {
        &self.inner.routing
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn configuration(&self) -> LoopbackConfiguration {
        self.inner.config.lock().clone()
    }

    pub fn routing_state(&self) -> RoutingState {
        self.inner.routing.state()
    }

    /// Current or last session, with live loop counters.
    ///
    /// The counters are read without locking; the session metadata sits behind
    /// a mutex the loop never takes while running.
    pub fn diagnostics(&self) -> LoopbackDiagnostics {
        self.inner.diagnostics.lock().clone().with_counters(&self.inner.stats)
    }

    /// Start loopback at `gain`.
    ///
    /// Transitions: idle → starting → running. Any failure rolls back what was
    /// acquired, in reverse order, and leaves the engine idle.
    pub fn start(&self, gain: f32) -> Result<(), EngineError> {
        let result = {
            let mut active = self.inner.active.lock();
            if active.is_some() || !self.state().is_idle() {
                return Err(EngineError::AlreadyRunning);
            }

            let config = self.inner.config.lock().clone();
            let applied = self.inner.gain.set(gain);
            log::info!("Starting audio loopback (gain {:.2})", applied);

            self.inner.launch(&config).map(|session| *active = Some(session))
        };
        self.inner.flush_notifications();
        result
    }

    /// Stop loopback and release everything. No-op when idle.
    ///
    /// Transitions: running → stopping → idle. Waits at most the configured
    /// stop timeout for the loop thread; a thread that does not exit in time is
    /// abandoned and its endpoints released anyway.
    pub fn stop(&self) {
        {
            let mut active = self.inner.active.lock();
            let Some(current) = active.take() else {
                return;
            };
            log::info!("Stopping audio loopback");
            self.inner.teardown(current, SessionState::Idle);
        }
        self.inner.flush_notifications();
    }

    /// Set the gain applied from the next frame on. Clamped to `[0, 8]`.
    pub fn set_gain(&self, gain: f32) -> f32 {
        let applied = self.inner.gain.set(gain);
        log::debug!("Gain set to {:.2}", applied);
        applied
    }

    pub fn gain(&self) -> f32 {
        self.inner.gain.get()
    }

    /// Replace the configuration and restart with it, keeping the current gain.
    ///
    /// Starts the engine even when it was idle. Callers see
    /// running → stopping → starting → running, never idle in between.
    pub fn reconfigure(&self, config: LoopbackConfiguration) -> Result<(), EngineError> {
        config.validate().map_err(EngineError::InvalidConfiguration)?;

        let result = {
            let mut active = self.inner.active.lock();
            self.inner.reconfigure_locked(&mut active, config)
        };
        self.inner.flush_notifications();
        result
    }

    /// Record which capture effects to request. Applies from the next start.
    pub fn enable_processing(&self, echo_cancellation: bool, noise_suppression: bool) {
        self.inner.config.lock().processing = ProcessingOptions {
            echo_cancellation,
            noise_suppression,
        };
        log::debug!(
            "Processing for next session: echo cancellation={}, noise suppression={}",
            echo_cancellation,
            noise_suppression
        );
    }

    /// Toggle the low-latency playback path, restarting a running session.
    pub fn set_low_latency_mode(&self, enable: bool) -> Result<(), EngineError> {
        let result = {
            let mut active = self.inner.active.lock();
            let mut config = self.inner.config.lock().clone();
            if config.low_latency == enable {
                return Ok(());
            }
            config.low_latency = enable;
            if active.is_some() {
                self.inner.reconfigure_locked(&mut active, config)
            } else {
                *self.inner.config.lock() = config;
                Ok(())
            }
        };
        self.inner.flush_notifications();
        result
    }

    /// Platform minimum buffer and what the buffer policy makes of it.
    pub fn optimal_buffer_config(&self) -> Result<BufferConfig, EngineError> {
        let config = self.configuration();
        let min_samples = self.inner.backend.min_buffer_samples(&config.format)?;
        Ok(BufferConfig {
            min_samples,
            optimal_samples: config.buffer_policy.buffer_samples(min_samples).max(min_samples),
        })
    }

    /// Toggle Bluetooth SCO outside a session. Refused while a session owns routing.
    pub fn enable_bluetooth_sco(&self, enable: bool) -> Result<(), EngineError> {
        let active = self.inner.active.lock();
        if active.is_some() {
            return Err(EngineError::InvalidState(
                "routing is owned by the running loopback session".into(),
            ));
        }
        self.inner.routing.set_bluetooth_sco(enable)?;
        Ok(())
    }

    pub fn is_bluetooth_sco_on(&self) -> bool {
        self.inner.routing.is_bluetooth_sco_on()
    }

    pub fn is_bluetooth_a2dp_on(&self) -> bool {
        self.inner.routing.is_bluetooth_a2dp_on()
    }

    pub fn is_wired_headset_on(&self) -> bool {
        self.inner.routing.is_wired_headset_on()
    }

    pub fn is_speakerphone_on(&self) -> bool {
        self.inner.routing.is_speakerphone_on()
    }

    pub fn set_speakerphone_on(&self, on: bool) -> Result<(), RoutingError> {
        self.inner.routing.set_speakerphone_on(on)
    }

    pub fn connected_devices(&self) -> Vec<String> {
        self.inner.routing.connected_device_descriptions()
    }
}

impl<B: AudioBackend, R: RoutingPlatform> Drop for LoopbackEngine<B, R> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<B: AudioBackend, R: RoutingPlatform> EngineInner<B, R> {
    fn set_state(&self, next: SessionState) {
        {
            let mut state = self.state.lock();
            if *state == next {
                return;
            }
            *state = next;
        }
        log::debug!("Loopback state → {}", next);
        self.outbox.lock().push(Notification::State(next));
    }

    fn notify_error(&self, error: EngineError) {
        self.outbox.lock().push(Notification::Error(error));
    }

    /// Deliver queued notifications in order. Call only after the `active`
    /// guard is dropped.
    ///
    /// A thread that finds another delivering leaves its entries to that
    /// thread, so a delegate may call back into the engine from a callback.
    fn flush_notifications(&self) {
        loop {
            let Some(delivering) = self.delivering.try_lock() else {
                return;
            };
            loop {
                let batch = std::mem::take(&mut *self.outbox.lock());
                if batch.is_empty() {
                    break;
                }
                let delegate = self.delegate.lock().clone();
                let Some(delegate) = delegate else {
                    continue;
                };
                for notification in batch {
                    match notification {
                        Notification::State(state) => delegate.on_state_changed(state),
                        Notification::Error(error) => delegate.on_error(&error),
                    }
                }
            }
            drop(delivering);
            // Entries queued while this thread was delivering but after its last drain.
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    /// Store `config` and relaunch with it. Caller holds the `active` slot.
    fn reconfigure_locked(
        self: &Arc<Self>,
        active: &mut Option<ActiveSession<B>>,
        config: LoopbackConfiguration,
    ) -> Result<(), EngineError> {
        *self.config.lock() = config.clone();
        if let Some(current) = active.take() {
            log::info!("Reconfiguring audio loopback");
            self.teardown(current, SessionState::Starting);
        }

        *active = Some(self.launch(&config)?);
        Ok(())
    }

    fn release_routing(&self) {
        for failure in self.routing.release() {
            log::warn!("Routing release step failed: {}", failure);
        }
    }

    /// Bring up routing, endpoints, and the loop thread.
    ///
    /// Caller holds the `active` slot. On error everything acquired here has
    /// been released and the state is idle.
    fn launch(self: &Arc<Self>, config: &LoopbackConfiguration) -> Result<ActiveSession<B>, EngineError> {
        self.set_state(SessionState::Starting);

        if let Err(e) = self.routing.acquire(config.require_bluetooth) {
            log::error!("Audio routing unavailable: {}", e);
            self.set_state(SessionState::Idle);
            return Err(e.into());
        }

        let session = match DeviceSession::open(&self.backend, config.format, &SessionOptions::from(config)) {
            Ok(session) => Arc::new(session),
            Err(e) => {
                log::error!("Failed to open audio endpoints: {}", e);
                self.release_routing();
                self.set_state(SessionState::Idle);
                return Err(e.into());
            }
        };

        if let Err(e) = session.start_io() {
            log::error!("Failed to start audio I/O: {}", e);
            session.release();
            self.release_routing();
            self.set_state(SessionState::Idle);
            return Err(e.into());
        }

        let id = Uuid::new_v4();
        self.stats.reset();
        *self.diagnostics.lock() = LoopbackDiagnostics {
            session_id: Some(id),
            started_at: Some(Utc::now()),
            format: Some(session.format()),
            buffer_samples: session.buffer_samples(),
            attached_effects: session.attached_effects().to_vec(),
            ..Default::default()
        };

        let run = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        self.set_state(SessionState::Running);

        let spawned = {
            let inner = Arc::clone(self);
            let session = Arc::clone(&session);
            let run = Arc::clone(&run);
            let max_failures = config.max_consecutive_failures;
            thread::Builder::new()
                .name(LOOP_THREAD_NAME.into())
                .spawn(move || {
                    if let Err(e) = set_current_thread_priority(ThreadPriority::Max) {
                        log::warn!("Could not raise loopback thread priority: {:?}", e);
                    }
                    let mut frame = session.frame_buffer();
                    let outcome = worker::run_loop(&session, &mut frame, &inner.gain, &run, &inner.stats, max_failures);
                    drop(done_tx);
                    match outcome {
                        Ok(()) => log::debug!("Loopback thread exiting"),
                        Err(e) => inner.loop_failed(id, &run, e),
                    }
                })
        };

        match spawned {
            Ok(handle) => {
                log::info!(
                    "Audio loopback running: session {}, {} samples per frame",
                    id,
                    session.buffer_samples()
                );
                Ok(ActiveSession {
                    id,
                    session,
                    run,
                    done,
                    worker: Some(handle),
                    stop_timeout: config.stop_timeout(),
                })
            }
            Err(e) => {
                log::error!("Failed to spawn loopback thread: {}", e);
                run.store(false, Ordering::Release);
                session.release();
                self.release_routing();
                self.set_state(SessionState::Idle);
                Err(EngineError::Spawn(e.to_string()))
            }
        }
    }

    /// Stop the loop thread, release endpoints, then release routing.
    ///
    /// Caller holds the `active` slot and has already taken `current` out of it.
    fn teardown(&self, mut current: ActiveSession<B>, final_state: SessionState) {
        let claimed = current.run.swap(false, Ordering::AcqRel);
        self.set_state(SessionState::Stopping);
        current.session.interrupt();

        let exited = match current.done.recv_timeout(current.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        };
        if let Some(handle) = current.worker.take() {
            if !exited {
                log::warn!(
                    "Loopback thread did not exit within {:?}; detaching it",
                    current.stop_timeout
                );
            } else if claimed && handle.join().is_err() {
                log::error!("Loopback thread panicked");
            }
            // Unclaimed: the loop thread itself is running this teardown.
        }

        current.session.release();
        self.release_routing();
        log::info!("Audio loopback session {} stopped", current.id);
        self.set_state(final_state);
    }

    /// Loop thread path for a fatal I/O error: tear the session down unless a
    /// stop already claimed it, then report.
    fn loop_failed(&self, id: Uuid, run: &AtomicBool, error: DeviceError) {
        if !run.swap(false, Ordering::AcqRel) {
            log::debug!("Loop error after stop was requested: {}", error);
            return;
        }
        log::error!("Audio loopback failed: {}", error);
        self.diagnostics.lock().last_error = Some(error.clone());

        {
            let mut active = self.active.lock();
            let Some(current) = active.take_if(|a| a.id == id) else {
                return;
            };
            self.teardown(current, SessionState::Idle);
            self.notify_error(EngineError::Device(error));
        }
        self.flush_notifications();
    }
}
