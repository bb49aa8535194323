use crate::models::devices::AudioDevice;
use crate::models::error::RoutingError;
use crate::models::routing_state::{AudioMode, FocusRequest, StreamType};

/// System-level audio routing primitives.
///
/// Only the [`RoutingController`](crate::routing::controller::RoutingController)
/// drives the mutating calls; everything else goes through it.
pub trait RoutingPlatform: Send + Sync + 'static {
    /// Request exclusive audio focus for `stream`.
    fn request_focus(&self, stream: StreamType) -> Result<FocusRequest, RoutingError>;

    /// Give focus back.
    fn abandon_focus(&self) -> Result<(), RoutingError>;

    /// Maximum volume index of `stream`.
    fn max_stream_volume(&self, stream: StreamType) -> Result<u32, RoutingError>;

    /// Set the volume index of `stream`.
    fn set_stream_volume(&self, stream: StreamType, index: u32) -> Result<(), RoutingError>;

    /// Bring the Bluetooth SCO link up.
    fn start_bluetooth_sco(&self) -> Result<(), RoutingError>;

    /// Tear the Bluetooth SCO link down.
    fn stop_bluetooth_sco(&self) -> Result<(), RoutingError>;

    /// Route communication audio over SCO (or stop doing so).
    fn set_bluetooth_sco_on(&self, on: bool) -> Result<(), RoutingError>;

    fn is_bluetooth_sco_on(&self) -> bool;

    fn is_bluetooth_a2dp_on(&self) -> bool;

    fn is_wired_headset_on(&self) -> bool;

    fn set_audio_mode(&self, mode: AudioMode) -> Result<(), RoutingError>;

    fn audio_mode(&self) -> AudioMode;

    fn is_speakerphone_on(&self) -> bool;

    fn set_speakerphone_on(&self, on: bool) -> Result<(), RoutingError>;

    /// Connected output devices, in platform order.
    fn connected_devices(&self) -> Result<Vec<AudioDevice>, RoutingError>;
}
