use crate::models::error::DeviceError;
use crate::models::format::AudioFormat;
use crate::traits::endpoint::{CaptureEndpoint, PlaybackEndpoint};

/// Factory for native endpoints at a given format.
///
/// One implementation strategy per platform; callers never see which native
/// API variant is used underneath.
pub trait AudioBackend: Send + Sync + 'static {
    type Capture: CaptureEndpoint + 'static;
    type Playback: PlaybackEndpoint + 'static;

    /// Smallest viable buffer for `format`, in samples.
    fn min_buffer_samples(&self, format: &AudioFormat) -> Result<usize, DeviceError>;

    /// Open a capture endpoint on the communication-oriented source.
    fn open_capture(
        &self,
        format: &AudioFormat,
        buffer_samples: usize,
    ) -> Result<Self::Capture, DeviceError>;

    /// Open a playback endpoint on the communication-oriented sink.
    ///
    /// `low_latency` requests the platform's lowest-latency performance mode.
    fn open_playback(
        &self,
        format: &AudioFormat,
        buffer_samples: usize,
        low_latency: bool,
    ) -> Result<Self::Playback, DeviceError>;
}
