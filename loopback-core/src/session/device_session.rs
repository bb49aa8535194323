use parking_lot::Mutex;

use crate::models::config::{BufferPolicy, CaptureEffect, LoopbackConfiguration, ProcessingOptions};
use crate::models::error::DeviceError;
use crate::models::format::AudioFormat;
use crate::processing::frame_buffer::FrameBuffer;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::endpoint::{CaptureEndpoint, PlaybackEndpoint};

/// Hardware I/O lifecycle of a [`DeviceSession`].
///
/// ```text
/// opened → started ↔ stopped
///    ↓        ↓         ↓
///    └──── released ────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoState {
    Opened,
    Started,
    Stopped,
    Released,
}

/// Open-time options for a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub buffer_policy: BufferPolicy,
    pub processing: ProcessingOptions,
    pub low_latency: bool,
}

impl From<&LoopbackConfiguration> for SessionOptions {
    fn from(config: &LoopbackConfiguration) -> Self {
        Self {
            buffer_policy: config.buffer_policy,
            processing: config.processing,
            low_latency: config.low_latency,
        }
    }
}

/// Owns the capture and playback endpoints of exactly one loopback run.
///
/// Shared between the control thread (start/stop/release) and the loop thread
/// (read/write) behind an `Arc`. Handles are released on every exit path:
/// explicitly through [`release`](Self::release), or on drop.
pub struct DeviceSession<C: CaptureEndpoint, P: PlaybackEndpoint> {
    format: AudioFormat,
    min_buffer_samples: usize,
    buffer_samples: usize,
    attached_effects: Vec<CaptureEffect>,
    capture: C,
    playback: P,
    io: Mutex<IoState>,
}

impl<C: CaptureEndpoint, P: PlaybackEndpoint> DeviceSession<C, P> {
    /// Open capture and playback endpoints at `format`.
    ///
    /// The buffer is sized from the platform minimum by `options.buffer_policy`.
    /// If playback fails to open, the already-open capture endpoint is released
    /// before the error is returned.
    pub fn open<B>(backend: &B, format: AudioFormat, options: &SessionOptions) -> Result<Self, DeviceError>
    where
        B: AudioBackend<Capture = C, Playback = P>,
    {
        format.validate().map_err(DeviceError::UnsupportedFormat)?;

        let min_buffer_samples = backend.min_buffer_samples(&format)?;
        if min_buffer_samples == 0 {
            return Err(DeviceError::Backend("platform reported a zero minimum buffer".into()));
        }
        let buffer_samples = options
            .buffer_policy
            .buffer_samples(min_buffer_samples)
            .max(min_buffer_samples);

        let capture = backend.open_capture(&format, buffer_samples)?;
        let playback = match backend.open_playback(&format, buffer_samples, options.low_latency) {
            Ok(playback) => playback,
            Err(e) => {
                capture.release();
                return Err(e);
            }
        };

        let mut attached_effects = Vec::new();
        for effect in options.processing.requested() {
            match capture.attach_effect(effect) {
                Ok(()) => attached_effects.push(effect),
                Err(e) => log::debug!("Continuing without {}: {}", effect, e),
            }
        }

        log::info!(
            "Device session opened: {}, buffer {} samples ({:.1} ms, min {}), effects {:?}",
            format,
            buffer_samples,
            format.duration_of(buffer_samples).as_secs_f64() * 1000.0,
            min_buffer_samples,
            attached_effects,
        );

        Ok(Self {
            format,
            min_buffer_samples,
            buffer_samples,
            attached_effects,
            capture,
            playback,
            io: Mutex::new(IoState::Opened),
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Session buffer size in samples; also the frame size of the loop.
    pub fn buffer_samples(&self) -> usize {
        self.buffer_samples
    }

    pub fn min_buffer_samples(&self) -> usize {
        self.min_buffer_samples
    }

    /// Effects that actually attached at open.
    pub fn attached_effects(&self) -> &[CaptureEffect] {
        &self.attached_effects
    }

    pub fn io_state(&self) -> IoState {
        *self.io.lock()
    }

    pub fn is_released(&self) -> bool {
        self.io_state() == IoState::Released
    }

    /// A frame buffer sized for this session.
    pub fn frame_buffer(&self) -> FrameBuffer {
        FrameBuffer::new(self.buffer_samples)
    }

    /// Begin hardware playback then capture.
    pub fn start_io(&self) -> Result<(), DeviceError> {
        let mut io = self.io.lock();
        match *io {
            IoState::Opened | IoState::Stopped => {}
            IoState::Started => return Err(DeviceError::InvalidState("I/O already started".into())),
            IoState::Released => return Err(DeviceError::InvalidState("session already released".into())),
        }

        // Playback first so the first captured frame has somewhere to go.
        self.playback.start()?;
        if let Err(e) = self.capture.start() {
            if let Err(stop_err) = self.playback.stop() {
                log::warn!("Failed to stop playback after capture start failure: {}", stop_err);
            }
            return Err(e);
        }

        *io = IoState::Started;
        Ok(())
    }

    /// Halt hardware capture and playback. Both are attempted; the first error wins.
    pub fn stop_io(&self) -> Result<(), DeviceError> {
        let mut io = self.io.lock();
        if *io != IoState::Started {
            return Err(DeviceError::InvalidState(format!(
                "stop_io without start_io (state {:?})",
                *io
            )));
        }

        let capture = self.capture.stop();
        let playback = self.playback.stop();
        *io = IoState::Stopped;
        capture.and(playback)
    }

    /// Wake the loop thread out of a blocked read or write.
    pub fn interrupt(&self) {
        self.capture.interrupt();
        self.playback.interrupt();
    }

    /// Release both endpoints. Idempotent, never fails.
    pub fn release(&self) {
        let mut io = self.io.lock();
        if *io == IoState::Released {
            return;
        }
        if *io == IoState::Started {
            if let Err(e) = self.capture.stop() {
                log::debug!("Capture stop during release failed: {}", e);
            }
            if let Err(e) = self.playback.stop() {
                log::debug!("Playback stop during release failed: {}", e);
            }
        }
        self.capture.release();
        self.playback.release();
        *io = IoState::Released;
        log::debug!("Device session released");
    }

    /// Read up to one frame from capture into `frame`. Returns samples read.
    pub fn read_frame(&self, frame: &mut FrameBuffer) -> Result<usize, DeviceError> {
        frame.clear();
        let count = self.capture.read(frame.storage_mut())?;
        frame.set_filled(count);
        Ok(frame.len())
    }

    /// Write the whole current frame to playback, retrying partial writes.
    pub fn write_frame(&self, frame: &FrameBuffer) -> Result<(), DeviceError> {
        let samples = frame.frame();
        let mut offset = 0;
        while offset < samples.len() {
            let written = self.playback.write(&samples[offset..])?;
            if written == 0 {
                return Err(DeviceError::WriteFailed(format!(
                    "playback stalled after {} of {} samples",
                    offset,
                    samples.len()
                )));
            }
            offset += written;
        }
        Ok(())
    }
}

impl<C: CaptureEndpoint, P: PlaybackEndpoint> Drop for DeviceSession<C, P> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, ReadStep};

    fn open(backend: &MockBackend) -> Result<DeviceSession<crate::mock::MockCapture, crate::mock::MockPlayback>, DeviceError> {
        DeviceSession::open(backend, AudioFormat::default(), &SessionOptions::default())
    }

    #[test]
    fn open_uses_platform_minimum_by_default() {
        let backend = MockBackend::new(256);
        let session = open(&backend).unwrap();

        assert_eq!(session.buffer_samples(), 256);
        assert_eq!(session.frame_buffer().capacity(), 256);
        assert_eq!(backend.probe().captures_opened(), 1);
        assert_eq!(backend.probe().playbacks_opened(), 1);
    }

    #[test]
    fn open_applies_buffer_multiple() {
        let backend = MockBackend::new(256);
        let options = SessionOptions {
            buffer_policy: BufferPolicy::Multiple(4),
            ..Default::default()
        };
        let session = DeviceSession::open(&backend, AudioFormat::default(), &options).unwrap();
        assert_eq!(session.buffer_samples(), 1024);
        assert_eq!(backend.probe().last_buffer_samples(), Some(1024));
    }

    #[test]
    fn playback_open_failure_releases_capture() {
        let backend = MockBackend::new(256);
        backend.probe().fail_playback_open(true);

        let err = open(&backend).err().unwrap();
        assert!(matches!(err, DeviceError::OpenFailed { .. }));
        assert_eq!(backend.probe().captures_opened(), 1);
        assert_eq!(backend.probe().captures_released(), 1);
        assert_eq!(backend.probe().live_handles(), 0);
    }

    #[test]
    fn unsupported_format_opens_nothing() {
        let backend = MockBackend::new(256);
        let err = DeviceSession::open(&backend, AudioFormat::mono_pcm16(22_050), &SessionOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, DeviceError::UnsupportedFormat(_)));
        assert_eq!(backend.probe().captures_opened(), 0);
    }

    #[test]
    fn effect_attach_failure_degrades_silently() {
        let backend = MockBackend::new(256);
        backend.probe().set_effects_available(false);
        let options = SessionOptions {
            processing: ProcessingOptions {
                echo_cancellation: true,
                noise_suppression: true,
            },
            ..Default::default()
        };

        let session = DeviceSession::open(&backend, AudioFormat::default(), &options).unwrap();
        assert!(session.attached_effects().is_empty());
    }

    #[test]
    fn effects_attach_when_available() {
        let backend = MockBackend::new(256);
        let options = SessionOptions {
            processing: ProcessingOptions::default(),
            ..Default::default()
        };
        let session = DeviceSession::open(&backend, AudioFormat::default(), &options).unwrap();
        assert_eq!(
            session.attached_effects(),
            &[CaptureEffect::EchoCancellation, CaptureEffect::NoiseSuppression]
        );
    }

    #[test]
    fn start_twice_is_invalid_state() {
        let backend = MockBackend::new(256);
        let session = open(&backend).unwrap();

        session.start_io().unwrap();
        let err = session.start_io().unwrap_err();
        assert!(matches!(err, DeviceError::InvalidState(_)));
    }

    #[test]
    fn stop_without_start_is_invalid_state() {
        let backend = MockBackend::new(256);
        let session = open(&backend).unwrap();

        assert!(matches!(session.stop_io(), Err(DeviceError::InvalidState(_))));
        session.start_io().unwrap();
        assert!(session.stop_io().is_ok());
        assert_eq!(session.io_state(), IoState::Stopped);
    }

    #[test]
    fn release_is_idempotent_and_drop_safe() {
        let backend = MockBackend::new(256);
        let session = open(&backend).unwrap();
        session.start_io().unwrap();

        session.release();
        session.release();
        assert!(session.is_released());
        drop(session);

        assert_eq!(backend.probe().captures_released(), 1);
        assert_eq!(backend.probe().playbacks_released(), 1);
        assert_eq!(backend.probe().live_handles(), 0);
    }

    #[test]
    fn drop_releases_handles() {
        let backend = MockBackend::new(256);
        {
            let session = open(&backend).unwrap();
            session.start_io().unwrap();
        }
        assert_eq!(backend.probe().live_handles(), 0);
    }

    #[test]
    fn capture_start_failure_leaves_nothing_running() {
        let backend = MockBackend::new(256);
        backend.probe().fail_capture_start(true);
        let session = open(&backend).unwrap();

        assert!(session.start_io().is_err());
        assert_eq!(session.io_state(), IoState::Opened);
        assert!(!backend.probe().playback_running());
        session.release();
        assert_eq!(backend.probe().live_handles(), 0);
    }

    #[test]
    fn read_and_write_move_one_frame() {
        let backend = MockBackend::new(4);
        backend.probe().push_read(ReadStep::Frame(vec![1, 2, 3, 4]));
        let session = open(&backend).unwrap();
        session.start_io().unwrap();

        let mut frame = session.frame_buffer();
        assert_eq!(session.read_frame(&mut frame).unwrap(), 4);
        session.write_frame(&frame).unwrap();

        assert_eq!(backend.probe().played_frames(), vec![vec![1, 2, 3, 4]]);
    }

    #[test]
    fn partial_writes_are_completed() {
        let backend = MockBackend::new(4);
        backend.probe().set_max_write_chunk(Some(3));
        let session = open(&backend).unwrap();
        session.start_io().unwrap();

        let mut frame = session.frame_buffer();
        frame.storage_mut().copy_from_slice(&[5, 6, 7, 8]);
        frame.set_filled(4);
        session.write_frame(&frame).unwrap();

        assert_eq!(backend.probe().played_samples(), vec![5, 6, 7, 8]);
        assert_eq!(backend.probe().write_calls(), 2);
    }

    #[test]
    fn read_after_release_reports_released() {
        let backend = MockBackend::new(4);
        let session = open(&backend).unwrap();
        session.start_io().unwrap();
        session.release();

        let mut frame = session.frame_buffer();
        assert_eq!(session.read_frame(&mut frame), Err(DeviceError::Released));
    }
}
