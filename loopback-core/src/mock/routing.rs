use parking_lot::Mutex;

use crate::models::devices::AudioDevice;
use crate::models::error::RoutingError;
use crate::models::routing_state::{AudioMode, FocusRequest, StreamType};
use crate::traits::routing_platform::RoutingPlatform;

const MAX_VOICE_CALL_VOLUME: u32 = 7;

#[derive(Debug)]
struct RoutingMockState {
    calls: Vec<String>,
    focus_granted: bool,
    focus_held: bool,
    sco_available: bool,
    fail_sco_stop: bool,
    sco_on: bool,
    a2dp_on: bool,
    wired_headset_on: bool,
    speakerphone_on: bool,
    mode: AudioMode,
    volume: u32,
    enumeration_available: bool,
    devices: Vec<AudioDevice>,
}

impl Default for RoutingMockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            focus_granted: true,
            focus_held: false,
            sco_available: true,
            fail_sco_stop: false,
            sco_on: false,
            a2dp_on: false,
            wired_headset_on: false,
            speakerphone_on: false,
            mode: AudioMode::Normal,
            volume: 0,
            enumeration_available: true,
            devices: Vec::new(),
        }
    }
}

/// Routing platform that records calls and keeps route state in memory.
#[derive(Debug, Default)]
pub struct MockRouting {
    state: Mutex<RoutingMockState>,
}

impl MockRouting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutating calls made so far, e.g. `"set_audio_mode:in_communication"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn focus_held(&self) -> bool {
        self.state.lock().focus_held
    }

    pub fn stream_volume(&self) -> u32 {
        self.state.lock().volume
    }

    pub fn max_volume(&self) -> u32 {
        MAX_VOICE_CALL_VOLUME
    }

    pub fn set_focus_granted(&self, granted: bool) {
        self.state.lock().focus_granted = granted;
    }

    /// Whether a SCO-capable headset is "connected".
    pub fn set_sco_available(&self, available: bool) {
        self.state.lock().sco_available = available;
    }

    pub fn set_fail_sco_stop(&self, fail: bool) {
        self.state.lock().fail_sco_stop = fail;
    }

    pub fn set_a2dp_on(&self, on: bool) {
        self.state.lock().a2dp_on = on;
    }

    pub fn set_wired_headset_on(&self, on: bool) {
        self.state.lock().wired_headset_on = on;
    }

    pub fn set_devices(&self, devices: Vec<AudioDevice>) {
        self.state.lock().devices = devices;
    }

    pub fn set_enumeration_available(&self, available: bool) {
        self.state.lock().enumeration_available = available;
    }

    fn record(&self, call: impl Into<String>) -> parking_lot::MutexGuard<'_, RoutingMockState> {
        let mut state = self.state.lock();
        state.calls.push(call.into());
        state
    }
}

fn mode_name(mode: AudioMode) -> &'static str {
    match mode {
        AudioMode::Normal => "normal",
        AudioMode::InCommunication => "in_communication",
    }
}

impl RoutingPlatform for MockRouting {
    fn request_focus(&self, _stream: StreamType) -> Result<FocusRequest, RoutingError> {
        let mut state = self.record("request_focus");
        if state.focus_granted {
            state.focus_held = true;
            Ok(FocusRequest::Granted)
        } else {
            Ok(FocusRequest::Denied)
        }
    }

    fn abandon_focus(&self) -> Result<(), RoutingError> {
        self.record("abandon_focus").focus_held = false;
        Ok(())
    }

    fn max_stream_volume(&self, _stream: StreamType) -> Result<u32, RoutingError> {
        self.record("max_stream_volume");
        Ok(MAX_VOICE_CALL_VOLUME)
    }

    fn set_stream_volume(&self, _stream: StreamType, index: u32) -> Result<(), RoutingError> {
        let mut state = self.record("set_stream_volume");
        if index > MAX_VOICE_CALL_VOLUME {
            return Err(RoutingError::VolumeFailed(format!("index {index} out of range")));
        }
        state.volume = index;
        Ok(())
    }

    fn start_bluetooth_sco(&self) -> Result<(), RoutingError> {
        let state = self.record("start_bluetooth_sco");
        if !state.sco_available {
            return Err(RoutingError::ScoUnavailable("no headset connected".into()));
        }
        Ok(())
    }

    fn stop_bluetooth_sco(&self) -> Result<(), RoutingError> {
        let state = self.record("stop_bluetooth_sco");
        if state.fail_sco_stop {
            return Err(RoutingError::Platform("SCO link did not close".into()));
        }
        Ok(())
    }

    fn set_bluetooth_sco_on(&self, on: bool) -> Result<(), RoutingError> {
        self.record(format!("set_bluetooth_sco_on:{on}")).sco_on = on;
        Ok(())
    }

    fn is_bluetooth_sco_on(&self) -> bool {
        self.state.lock().sco_on
    }

    fn is_bluetooth_a2dp_on(&self) -> bool {
        self.state.lock().a2dp_on
    }

    fn is_wired_headset_on(&self) -> bool {
        self.state.lock().wired_headset_on
    }

    fn set_audio_mode(&self, mode: AudioMode) -> Result<(), RoutingError> {
        self.record(format!("set_audio_mode:{}", mode_name(mode))).mode = mode;
        Ok(())
    }

    fn audio_mode(&self) -> AudioMode {
        self.state.lock().mode
    }

    fn is_speakerphone_on(&self) -> bool {
        self.state.lock().speakerphone_on
    }

    fn set_speakerphone_on(&self, on: bool) -> Result<(), RoutingError> {
        self.record(format!("set_speakerphone_on:{on}")).speakerphone_on = on;
        Ok(())
    }

    fn connected_devices(&self) -> Result<Vec<AudioDevice>, RoutingError> {
        let state = self.state.lock();
        if !state.enumeration_available {
            return Err(RoutingError::Unsupported("device enumeration"));
        }
        Ok(state.devices.clone())
    }
}
