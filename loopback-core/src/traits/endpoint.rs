use crate::models::config::CaptureEffect;
use crate::models::error::{DeviceError, ProcessingAttachError};

/// Native capture endpoint (microphone side of the loopback).
///
/// Methods take `&self`: the loop thread blocks in [`read`](Self::read) while the
/// control thread may call [`interrupt`](Self::interrupt) or [`release`](Self::release)
/// concurrently. Implementations provide their own interior synchronization.
///
/// Implemented by:
/// - `WasapiCapture` (Windows)
/// - `MockCapture` (simulation)
pub trait CaptureEndpoint: Send + Sync {
    /// Begin hardware capture.
    fn start(&self) -> Result<(), DeviceError>;

    /// Halt hardware capture. The endpoint stays open.
    fn stop(&self) -> Result<(), DeviceError>;

    /// Block until up to `buf.len()` samples are available and copy them in.
    ///
    /// Blocks for at most about one buffer period. `Ok(0)` means nothing was
    /// captured this time. After `release`, fails with [`DeviceError::Released`].
    fn read(&self, buf: &mut [i16]) -> Result<usize, DeviceError>;

    /// Attach a platform voice-processing stage to this endpoint.
    fn attach_effect(&self, effect: CaptureEffect) -> Result<(), ProcessingAttachError>;

    /// Make a blocked `read` return promptly. Does not release anything.
    fn interrupt(&self);

    /// Release the native handle. Idempotent; safe from any thread.
    fn release(&self);
}

/// Native playback endpoint (speaker/headset side of the loopback).
///
/// Same threading contract as [`CaptureEndpoint`].
pub trait PlaybackEndpoint: Send + Sync {
    /// Begin hardware playback.
    fn start(&self) -> Result<(), DeviceError>;

    /// Halt hardware playback. The endpoint stays open.
    fn stop(&self) -> Result<(), DeviceError>;

    /// Queue samples for output, blocking for at most about one buffer period.
    ///
    /// May accept fewer samples than offered; returns how many were taken.
    fn write(&self, samples: &[i16]) -> Result<usize, DeviceError>;

    /// Make a blocked `write` return promptly.
    fn interrupt(&self);

    /// Release the native handle. Idempotent; safe from any thread.
    fn release(&self);
}
