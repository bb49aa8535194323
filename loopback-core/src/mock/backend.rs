use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::models::config::CaptureEffect;
use crate::models::error::{DeviceError, EndpointKind, ProcessingAttachError};
use crate::models::format::AudioFormat;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::endpoint::{CaptureEndpoint, PlaybackEndpoint};

/// One scripted outcome of a capture read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Deliver these samples (truncated to the caller's buffer).
    Frame(Vec<i16>),
    /// Return zero samples.
    Empty,
    /// Fail with [`DeviceError::ReadFailed`].
    Fail(String),
    /// Block for the duration, then return zero samples. Interruptible.
    Block(Duration),
    /// Block for the duration ignoring interrupt and release.
    Hang(Duration),
}

#[derive(Debug, Default)]
struct ProbeState {
    min_buffer_samples: usize,
    last_buffer_samples: Option<usize>,
    last_low_latency: Option<bool>,

    captures_opened: usize,
    playbacks_opened: usize,
    captures_released: usize,
    playbacks_released: usize,

    fail_capture_open: bool,
    fail_playback_open: bool,
    fail_capture_start: bool,
    effects_unavailable: bool,

    capture_running: bool,
    playback_running: bool,
    capture_interrupted: bool,

    reads: VecDeque<ReadStep>,
    reads_served: usize,

    max_write_chunk: Option<usize>,
    failing_writes: usize,
    write_calls: usize,
    played: Vec<Vec<i16>>,
}

/// Shared view of the mock hardware: scripting knobs plus counters.
#[derive(Debug)]
pub struct MockProbe {
    state: Mutex<ProbeState>,
    changed: Condvar,
}

impl MockProbe {
    fn new(min_buffer_samples: usize) -> Self {
        Self {
            state: Mutex::new(ProbeState {
                min_buffer_samples,
                ..Default::default()
            }),
            changed: Condvar::new(),
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut ProbeState) -> T) -> T {
        let value = f(&mut self.state.lock());
        self.changed.notify_all();
        value
    }

    /// Wait until `done` holds or `timeout` passes. Returns whether it held.
    fn wait_for(&self, timeout: Duration, mut done: impl FnMut(&ProbeState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !done(&*state) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return done(&*state);
            }
        }
        true
    }

    // --- Scripting ---

    /// Queue the outcome of a future capture read.
    pub fn push_read(&self, step: ReadStep) {
        self.update(|s| s.reads.push_back(step));
    }

    pub fn set_min_buffer_samples(&self, samples: usize) {
        self.update(|s| s.min_buffer_samples = samples);
    }

    pub fn fail_capture_open(&self, fail: bool) {
        self.update(|s| s.fail_capture_open = fail);
    }

    pub fn fail_playback_open(&self, fail: bool) {
        self.update(|s| s.fail_playback_open = fail);
    }

    pub fn fail_capture_start(&self, fail: bool) {
        self.update(|s| s.fail_capture_start = fail);
    }

    pub fn set_effects_available(&self, available: bool) {
        self.update(|s| s.effects_unavailable = !available);
    }

    /// Cap how many samples a single playback write accepts.
    pub fn set_max_write_chunk(&self, chunk: Option<usize>) {
        self.update(|s| s.max_write_chunk = chunk);
    }

    /// Make the next `count` playback writes fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.update(|s| s.failing_writes = count);
    }

    // --- Observation ---

    pub fn captures_opened(&self) -> usize {
        self.state.lock().captures_opened
    }

    pub fn playbacks_opened(&self) -> usize {
        self.state.lock().playbacks_opened
    }

    pub fn captures_released(&self) -> usize {
        self.state.lock().captures_released
    }

    pub fn playbacks_released(&self) -> usize {
        self.state.lock().playbacks_released
    }

    /// Endpoints opened but not yet released.
    pub fn live_handles(&self) -> usize {
        let s = self.state.lock();
        (s.captures_opened + s.playbacks_opened) - (s.captures_released + s.playbacks_released)
    }

    pub fn last_buffer_samples(&self) -> Option<usize> {
        self.state.lock().last_buffer_samples
    }

    pub fn last_low_latency(&self) -> Option<bool> {
        self.state.lock().last_low_latency
    }

    pub fn capture_running(&self) -> bool {
        self.state.lock().capture_running
    }

    pub fn playback_running(&self) -> bool {
        self.state.lock().playback_running
    }

    pub fn pending_reads(&self) -> usize {
        self.state.lock().reads.len()
    }

    pub fn reads_served(&self) -> usize {
        self.state.lock().reads_served
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().write_calls
    }

    /// Every accepted playback write, in order.
    pub fn played_frames(&self) -> Vec<Vec<i16>> {
        self.state.lock().played.clone()
    }

    pub fn played_samples(&self) -> Vec<i16> {
        self.state.lock().played.concat()
    }

    pub fn wait_for_played_frames(&self, count: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.played.len() >= count)
    }

    pub fn wait_for_reads_served(&self, count: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.reads_served >= count)
    }

    pub fn wait_for_live_handles(&self, count: usize, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| {
            (s.captures_opened + s.playbacks_opened) - (s.captures_released + s.playbacks_released) == count
        })
    }
}

/// Audio backend whose endpoints live entirely in memory.
#[derive(Debug, Clone)]
pub struct MockBackend {
    probe: Arc<MockProbe>,
}

impl MockBackend {
    /// A backend reporting `min_buffer_samples` as the platform minimum.
    pub fn new(min_buffer_samples: usize) -> Self {
        Self {
            probe: Arc::new(MockProbe::new(min_buffer_samples)),
        }
    }

    pub fn probe(&self) -> Arc<MockProbe> {
        Arc::clone(&self.probe)
    }
}

impl AudioBackend for MockBackend {
    type Capture = MockCapture;
    type Playback = MockPlayback;

    fn min_buffer_samples(&self, _format: &AudioFormat) -> Result<usize, DeviceError> {
        Ok(self.probe.state.lock().min_buffer_samples)
    }

    fn open_capture(&self, _format: &AudioFormat, buffer_samples: usize) -> Result<MockCapture, DeviceError> {
        self.probe.update(|s| {
            if s.fail_capture_open {
                return Err(DeviceError::open_failed(EndpointKind::Capture, "microphone busy"));
            }
            s.captures_opened += 1;
            s.last_buffer_samples = Some(buffer_samples);
            Ok(())
        })?;
        Ok(MockCapture {
            probe: Arc::clone(&self.probe),
            released: AtomicBool::new(false),
        })
    }

    fn open_playback(
        &self,
        _format: &AudioFormat,
        buffer_samples: usize,
        low_latency: bool,
    ) -> Result<MockPlayback, DeviceError> {
        self.probe.update(|s| {
            if s.fail_playback_open {
                return Err(DeviceError::open_failed(EndpointKind::Playback, "no output route"));
            }
            s.playbacks_opened += 1;
            s.last_buffer_samples = Some(buffer_samples);
            s.last_low_latency = Some(low_latency);
            Ok(())
        })?;
        Ok(MockPlayback {
            probe: Arc::clone(&self.probe),
            released: AtomicBool::new(false),
        })
    }
}

pub struct MockCapture {
    probe: Arc<MockProbe>,
    released: AtomicBool,
}

impl MockCapture {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Block until `deadline` unless interrupted or released first.
    fn block_until(&self, state: &mut MutexGuard<'_, ProbeState>, deadline: Instant) {
        while !state.capture_interrupted && !self.is_released() {
            if self.probe.changed.wait_until(state, deadline).timed_out() {
                break;
            }
        }
    }
}

impl CaptureEndpoint for MockCapture {
    fn start(&self) -> Result<(), DeviceError> {
        self.probe.update(|s| {
            if s.fail_capture_start {
                return Err(DeviceError::Backend("capture refused to start".into()));
            }
            s.capture_running = true;
            s.capture_interrupted = false;
            Ok(())
        })
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.probe.update(|s| s.capture_running = false);
        Ok(())
    }

    fn read(&self, buf: &mut [i16]) -> Result<usize, DeviceError> {
        let mut state = self.probe.state.lock();
        loop {
            if self.is_released() {
                return Err(DeviceError::Released);
            }
            if state.capture_interrupted {
                return Ok(0);
            }

            let Some(step) = state.reads.pop_front() else {
                self.probe.changed.wait(&mut state);
                continue;
            };
            state.reads_served += 1;
            self.probe.changed.notify_all();

            return match step {
                ReadStep::Frame(samples) => {
                    let count = samples.len().min(buf.len());
                    buf[..count].copy_from_slice(&samples[..count]);
                    Ok(count)
                }
                ReadStep::Empty => Ok(0),
                ReadStep::Fail(reason) => Err(DeviceError::ReadFailed(reason)),
                ReadStep::Block(duration) => {
                    self.block_until(&mut state, Instant::now() + duration);
                    Ok(0)
                }
                ReadStep::Hang(duration) => {
                    MutexGuard::unlocked(&mut state, || thread::sleep(duration));
                    Ok(0)
                }
            };
        }
    }

    fn attach_effect(&self, effect: CaptureEffect) -> Result<(), ProcessingAttachError> {
        if self.probe.state.lock().effects_unavailable {
            return Err(ProcessingAttachError::Unavailable(effect));
        }
        Ok(())
    }

    fn interrupt(&self) {
        self.probe.update(|s| s.capture_interrupted = true);
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.probe.update(|s| {
            s.captures_released += 1;
            s.capture_running = false;
        });
    }
}

pub struct MockPlayback {
    probe: Arc<MockProbe>,
    released: AtomicBool,
}

impl PlaybackEndpoint for MockPlayback {
    fn start(&self) -> Result<(), DeviceError> {
        self.probe.update(|s| s.playback_running = true);
        Ok(())
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.probe.update(|s| s.playback_running = false);
        Ok(())
    }

    fn write(&self, samples: &[i16]) -> Result<usize, DeviceError> {
        if self.released.load(Ordering::Acquire) {
            return Err(DeviceError::Released);
        }
        self.probe.update(|s| {
            s.write_calls += 1;
            if s.failing_writes > 0 {
                s.failing_writes -= 1;
                return Err(DeviceError::WriteFailed("underrun".into()));
            }
            let count = s.max_write_chunk.map_or(samples.len(), |chunk| chunk.min(samples.len()));
            s.played.push(samples[..count].to_vec());
            Ok(count)
        })
    }

    // Writes never block here.
    fn interrupt(&self) {}

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.probe.update(|s| {
            s.playbacks_released += 1;
            s.playback_running = false;
        });
    }
}
