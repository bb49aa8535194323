//! Routing on Windows.
//!
//! Windows has no audio focus or global call mode: the communications role
//! decides which endpoint a call-style stream lands on. This platform maps
//! the routing contract onto that:
//! - focus: the communications microphone can be activated (privacy settings allow it)
//! - volume: master volume scalar of the communications render endpoint
//! - Bluetooth SCO: the communications render endpoint is a hands-free headset
//! - audio mode: tracked only; streams opt in via the communications category

use parking_lot::Mutex;
use windows::Win32::Foundation::*;
use windows::Win32::Media::Audio::Endpoints::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_loopback_core::models::devices::{AudioDevice, AudioDeviceKind};
use audio_loopback_core::models::error::{EndpointKind, RoutingError};
use audio_loopback_core::models::routing_state::{AudioMode, FocusRequest, StreamType};
use audio_loopback_core::traits::routing_platform::RoutingPlatform;

use crate::classify;
use crate::com::ensure_mta;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::{ComContext, WasapiError};

/// Volume "index" range exposed for the voice-call stream (percent).
const MAX_VOLUME_INDEX: u32 = 100;

#[derive(Debug, Default)]
struct RouteFlags {
    focus_held: bool,
    sco_started: bool,
    sco_on: bool,
    mode: AudioMode,
}

#[derive(Debug, Default)]
pub struct WindowsRouting {
    flags: Mutex<RouteFlags>,
}

impl WindowsRouting {
    pub fn new() -> Self {
        Self::default()
    }

    fn enumerator() -> Result<DeviceEnumerator, WasapiError> {
        ensure_mta()?;
        DeviceEnumerator::new()
    }

    fn endpoint_kind(kind: EndpointKind, communications: bool) -> Option<AudioDeviceKind> {
        let enumerator = Self::enumerator().ok()?;
        let device = if communications {
            enumerator.communications_endpoint(kind)
        } else {
            enumerator.console_endpoint(kind)
        }
        .ok()?;
        DeviceEnumerator::describe(&device).map(|info| info.kind())
    }

    fn endpoint_volume() -> Result<IAudioEndpointVolume, WasapiError> {
        let device = Self::enumerator()?.communications_endpoint(EndpointKind::Playback)?;
        unsafe { device.Activate(CLSCTX_ALL, None) }.context("activate IAudioEndpointVolume")
    }
}

/// Whether the communications microphone can be opened.
///
/// Access denied means microphone access is off in Windows privacy settings.
fn microphone_accessible() -> Result<bool, WasapiError> {
    let enumerator = WindowsRouting::enumerator()?;
    let device = match enumerator.communications_endpoint(EndpointKind::Capture) {
        Ok(device) => device,
        Err(WasapiError::NoEndpoint(_)) => return Ok(false),
        Err(e) => return Err(e),
    };

    let activated: windows::core::Result<IAudioClient> = unsafe { device.Activate(CLSCTX_ALL, None) };
    match activated {
        Ok(_) => Ok(true),
        Err(e) if e.code() == E_ACCESSDENIED || e.code() == AUDCLNT_E_DEVICE_IN_USE => Ok(false),
        Err(e) => {
            log::warn!("Unexpected error probing microphone access: {}", e);
            Ok(true)
        }
    }
}

impl RoutingPlatform for WindowsRouting {
    fn request_focus(&self, _stream: StreamType) -> Result<FocusRequest, RoutingError> {
        if microphone_accessible()? {
            self.flags.lock().focus_held = true;
            Ok(FocusRequest::Granted)
        } else {
            log::warn!("Microphone unavailable or blocked by privacy settings");
            Ok(FocusRequest::Denied)
        }
    }

    fn abandon_focus(&self) -> Result<(), RoutingError> {
        self.flags.lock().focus_held = false;
        Ok(())
    }

    fn max_stream_volume(&self, _stream: StreamType) -> Result<u32, RoutingError> {
        Ok(MAX_VOLUME_INDEX)
    }

    fn set_stream_volume(&self, _stream: StreamType, index: u32) -> Result<(), RoutingError> {
        let level = index.min(MAX_VOLUME_INDEX) as f32 / MAX_VOLUME_INDEX as f32;
        let volume = Self::endpoint_volume().map_err(|e| RoutingError::VolumeFailed(e.to_string()))?;
        unsafe { volume.SetMasterVolumeLevelScalar(level, std::ptr::null()) }
            .map_err(|e| RoutingError::VolumeFailed(e.to_string()))?;
        log::debug!("Communications endpoint volume set to {:.2}", level);
        Ok(())
    }

    fn start_bluetooth_sco(&self) -> Result<(), RoutingError> {
        let enumerator = Self::enumerator()?;
        let device = enumerator
            .communications_endpoint(EndpointKind::Playback)
            .map_err(|e| RoutingError::ScoUnavailable(e.to_string()))?;
        let info = DeviceEnumerator::describe(&device)
            .ok_or_else(|| RoutingError::ScoUnavailable("communications endpoint unreadable".into()))?;

        if info.kind() != AudioDeviceKind::BluetoothSco {
            return Err(RoutingError::ScoUnavailable(format!(
                "communications endpoint is {}",
                info.to_device().description()
            )));
        }
        self.flags.lock().sco_started = true;
        log::info!("Hands-free endpoint active: {}", info.name);
        Ok(())
    }

    fn stop_bluetooth_sco(&self) -> Result<(), RoutingError> {
        self.flags.lock().sco_started = false;
        Ok(())
    }

    fn set_bluetooth_sco_on(&self, on: bool) -> Result<(), RoutingError> {
        let mut flags = self.flags.lock();
        if on && !flags.sco_started {
            return Err(RoutingError::ScoUnavailable("SCO link not started".into()));
        }
        flags.sco_on = on;
        Ok(())
    }

    fn is_bluetooth_sco_on(&self) -> bool {
        self.flags.lock().sco_on
    }

    fn is_bluetooth_a2dp_on(&self) -> bool {
        Self::endpoint_kind(EndpointKind::Playback, false) == Some(AudioDeviceKind::BluetoothA2dp)
    }

    fn is_wired_headset_on(&self) -> bool {
        Self::endpoint_kind(EndpointKind::Playback, false).is_some_and(classify::is_wired_headset)
    }

    fn set_audio_mode(&self, mode: AudioMode) -> Result<(), RoutingError> {
        self.flags.lock().mode = mode;
        log::debug!("Audio mode now {:?}", mode);
        Ok(())
    }

    fn audio_mode(&self) -> AudioMode {
        self.flags.lock().mode
    }

    fn is_speakerphone_on(&self) -> bool {
        false
    }

    fn set_speakerphone_on(&self, _on: bool) -> Result<(), RoutingError> {
        Err(RoutingError::Unsupported("speakerphone routing"))
    }

    fn connected_devices(&self) -> Result<Vec<AudioDevice>, RoutingError> {
        let endpoints = Self::enumerator()?.list_render_endpoints()?;
        Ok(endpoints.iter().map(|info| info.to_device()).collect())
    }
}
