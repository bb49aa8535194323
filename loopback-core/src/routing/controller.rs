use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::devices::AudioDevice;
use crate::models::error::RoutingError;
use crate::models::routing_state::{AudioMode, FocusRequest, RoutingState, StreamType};
use crate::traits::routing_platform::RoutingPlatform;

/// Sole owner of system audio routing: focus, stream volume, Bluetooth SCO and audio mode.
///
/// `acquire` must complete before endpoints are opened and `release` must run
/// only after they are released, so routing never changes under a live stream.
pub struct RoutingController<R: RoutingPlatform> {
    platform: Arc<R>,
    state: Mutex<RoutingState>,
}

impl<R: RoutingPlatform> RoutingController<R> {
    pub fn new(platform: Arc<R>) -> Self {
        Self {
            platform,
            state: Mutex::new(RoutingState::default()),
        }
    }

    pub fn platform(&self) -> &Arc<R> {
        &self.platform
    }

    pub fn state(&self) -> RoutingState {
        *self.state.lock()
    }

    /// Take focus on the voice-call stream, raise its volume, and bring up SCO in
    /// communication mode.
    ///
    /// Fails with [`RoutingError::FocusDenied`] without touching anything else
    /// when focus is refused. A SCO failure is fatal only when `require_bluetooth`
    /// is set; otherwise audio stays on whatever route the platform chose. Any
    /// fatal failure rolls back the steps already taken.
    pub fn acquire(&self, require_bluetooth: bool) -> Result<(), RoutingError> {
        let mut state = self.state.lock();

        match self.platform.request_focus(StreamType::VoiceCall)? {
            FocusRequest::Granted => state.focus_held = true,
            FocusRequest::Denied => {
                log::error!("Could not get audio focus");
                return Err(RoutingError::FocusDenied);
            }
        }

        if let Err(e) = self.raise_volume() {
            log::warn!("Could not raise voice-call volume: {}", e);
        }

        match self.enable_sco() {
            Ok(()) => {
                state.audio_mode = AudioMode::InCommunication;
                state.bluetooth_sco_enabled = true;
                log::info!("Bluetooth SCO started, mode={:?}", self.platform.audio_mode());
            }
            Err(e) if require_bluetooth => {
                log::error!("Bluetooth SCO required but unavailable: {}", e);
                // The mode may have switched before SCO failed.
                state.audio_mode = self.platform.audio_mode();
                for failure in Self::release_locked(&self.platform, &mut state) {
                    log::warn!("Routing rollback step failed: {}", failure);
                }
                return Err(e);
            }
            Err(e) => {
                state.audio_mode = self.platform.audio_mode();
                log::warn!("Bluetooth SCO unavailable, using default route: {}", e);
            }
        }

        Ok(())
    }

    /// Undo `acquire`: SCO off, normal mode, focus abandoned.
    ///
    /// Idempotent and best-effort. Every step is attempted; failures are returned
    /// for the caller to log and never stop the remaining steps.
    pub fn release(&self) -> Vec<RoutingError> {
        let mut state = self.state.lock();
        Self::release_locked(&self.platform, &mut state)
    }

    /// Toggle SCO plus audio mode as one step, outside of a loopback session.
    pub fn set_bluetooth_sco(&self, enable: bool) -> Result<(), RoutingError> {
        let mut state = self.state.lock();
        if enable {
            let result = self.enable_sco();
            state.audio_mode = self.platform.audio_mode();
            result?;
            state.bluetooth_sco_enabled = true;
            log::info!("Bluetooth SCO started, mode={:?}", state.audio_mode);
        } else {
            let mut first_error = None;
            for result in [
                self.platform.stop_bluetooth_sco(),
                self.platform.set_bluetooth_sco_on(false),
                self.platform.set_audio_mode(AudioMode::Normal),
            ] {
                if let Err(e) = result {
                    first_error.get_or_insert(e);
                }
            }
            state.bluetooth_sco_enabled = false;
            state.audio_mode = self.platform.audio_mode();
            log::info!("Bluetooth SCO stopped, mode={:?}", state.audio_mode);
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn is_bluetooth_sco_on(&self) -> bool {
        self.platform.is_bluetooth_sco_on()
    }

    pub fn is_bluetooth_a2dp_on(&self) -> bool {
        self.platform.is_bluetooth_a2dp_on()
    }

    pub fn is_wired_headset_on(&self) -> bool {
        self.platform.is_wired_headset_on()
    }

    pub fn is_speakerphone_on(&self) -> bool {
        self.platform.is_speakerphone_on()
    }

    pub fn set_speakerphone_on(&self, on: bool) -> Result<(), RoutingError> {
        self.platform.set_speakerphone_on(on)
    }

    /// Connected output devices as `"<kind>: <product>"` strings.
    ///
    /// When the platform cannot enumerate devices, falls back to the route flags.
    pub fn connected_device_descriptions(&self) -> Vec<String> {
        match self.platform.connected_devices() {
            Ok(devices) => devices.iter().map(AudioDevice::description).collect(),
            Err(e) => {
                log::debug!("Device enumeration unavailable ({}), using route flags", e);
                let mut descriptions = Vec::new();
                if self.platform.is_bluetooth_sco_on() {
                    descriptions.push("Bluetooth SCO".to_string());
                }
                if self.platform.is_bluetooth_a2dp_on() {
                    descriptions.push("Bluetooth A2DP".to_string());
                }
                if self.platform.is_wired_headset_on() {
                    descriptions.push("Wired Headset".to_string());
                }
                if self.platform.is_speakerphone_on() {
                    descriptions.push("Speakerphone".to_string());
                }
                descriptions
            }
        }
    }

    // --- Internal helpers ---

    fn raise_volume(&self) -> Result<(), RoutingError> {
        let max = self.platform.max_stream_volume(StreamType::VoiceCall)?;
        self.platform.set_stream_volume(StreamType::VoiceCall, max)
    }

    /// Communication mode first; SCO only routes once the mode has switched.
    fn enable_sco(&self) -> Result<(), RoutingError> {
        self.platform.set_audio_mode(AudioMode::InCommunication)?;
        self.platform.start_bluetooth_sco()?;
        self.platform.set_bluetooth_sco_on(true)
    }

    fn release_locked(platform: &R, state: &mut RoutingState) -> Vec<RoutingError> {
        let mut failures = Vec::new();
        if !state.is_acquired() {
            return failures;
        }

        if state.bluetooth_sco_enabled {
            if let Err(e) = platform.stop_bluetooth_sco() {
                failures.push(e);
            }
            if let Err(e) = platform.set_bluetooth_sco_on(false) {
                failures.push(e);
            }
            state.bluetooth_sco_enabled = false;
        }

        if state.audio_mode != AudioMode::Normal {
            if let Err(e) = platform.set_audio_mode(AudioMode::Normal) {
                failures.push(e);
            }
            state.audio_mode = AudioMode::Normal;
        }

        if state.focus_held {
            if let Err(e) = platform.abandon_focus() {
                failures.push(e);
            }
            state.focus_held = false;
        }

        log::debug!("Routing released ({} step failures)", failures.len());
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRouting;
    use crate::models::devices::AudioDeviceKind;

    fn controller() -> (RoutingController<MockRouting>, Arc<MockRouting>) {
        let platform = Arc::new(MockRouting::new());
        (RoutingController::new(Arc::clone(&platform)), platform)
    }

    #[test]
    fn acquire_takes_focus_volume_sco_and_mode() {
        let (routing, platform) = controller();
        routing.acquire(false).unwrap();

        let state = routing.state();
        assert!(state.focus_held);
        assert!(state.bluetooth_sco_enabled);
        assert_eq!(state.audio_mode, AudioMode::InCommunication);
        assert!(platform.is_bluetooth_sco_on());
        assert_eq!(platform.stream_volume(), platform.max_volume());
        assert_eq!(
            platform.calls(),
            vec![
                "request_focus",
                "max_stream_volume",
                "set_stream_volume",
                "set_audio_mode:in_communication",
                "start_bluetooth_sco",
                "set_bluetooth_sco_on:true",
            ]
        );
    }

    #[test]
    fn focus_denied_touches_nothing_else() {
        let (routing, platform) = controller();
        platform.set_focus_granted(false);

        assert_eq!(routing.acquire(false), Err(RoutingError::FocusDenied));
        assert_eq!(platform.calls(), vec!["request_focus"]);
        assert_eq!(routing.state(), RoutingState::default());
    }

    #[test]
    fn sco_failure_is_soft_by_default() {
        let (routing, platform) = controller();
        platform.set_sco_available(false);

        routing.acquire(false).unwrap();
        let state = routing.state();
        assert!(state.focus_held);
        assert!(!state.bluetooth_sco_enabled);

        routing.release();
        assert_eq!(platform.audio_mode(), AudioMode::Normal);
        assert!(!platform.focus_held());
    }

    #[test]
    fn required_sco_failure_rolls_back() {
        let (routing, platform) = controller();
        platform.set_sco_available(false);

        let err = routing.acquire(true).unwrap_err();
        assert!(matches!(err, RoutingError::ScoUnavailable(_)));
        assert_eq!(routing.state(), RoutingState::default());
        assert!(!platform.focus_held());
        assert_eq!(platform.audio_mode(), AudioMode::Normal);
    }

    #[test]
    fn release_is_idempotent() {
        let (routing, platform) = controller();
        routing.acquire(false).unwrap();

        assert!(routing.release().is_empty());
        let calls_after_first = platform.calls().len();
        assert!(routing.release().is_empty());
        assert_eq!(platform.calls().len(), calls_after_first);
        assert_eq!(routing.state(), RoutingState::default());
    }

    #[test]
    fn release_undoes_acquire_in_reverse() {
        let (routing, platform) = controller();
        routing.acquire(false).unwrap();
        platform.clear_calls();

        routing.release();
        assert_eq!(
            platform.calls(),
            vec![
                "stop_bluetooth_sco",
                "set_bluetooth_sco_on:false",
                "set_audio_mode:normal",
                "abandon_focus",
            ]
        );
    }

    #[test]
    fn release_continues_past_failing_steps() {
        let (routing, platform) = controller();
        routing.acquire(false).unwrap();
        platform.set_fail_sco_stop(true);

        let failures = routing.release();
        assert_eq!(failures.len(), 1);
        assert!(!platform.focus_held());
        assert_eq!(platform.audio_mode(), AudioMode::Normal);
        assert_eq!(routing.state(), RoutingState::default());
    }

    #[test]
    fn standalone_sco_toggle() {
        let (routing, platform) = controller();
        routing.set_bluetooth_sco(true).unwrap();
        assert!(platform.is_bluetooth_sco_on());
        assert_eq!(platform.audio_mode(), AudioMode::InCommunication);

        routing.set_bluetooth_sco(false).unwrap();
        assert!(!platform.is_bluetooth_sco_on());
        assert_eq!(platform.audio_mode(), AudioMode::Normal);
    }

    #[test]
    fn device_descriptions_from_platform() {
        let (routing, platform) = controller();
        platform.set_devices(vec![
            AudioDevice::new(AudioDeviceKind::BluetoothSco, "Headset"),
            AudioDevice::new(AudioDeviceKind::BuiltinSpeaker, "Phone"),
        ]);

        assert_eq!(
            routing.connected_device_descriptions(),
            vec!["Bluetooth SCO: Headset", "Built-in Speaker: Phone"]
        );
    }

    #[test]
    fn device_descriptions_fall_back_to_flags() {
        let (routing, platform) = controller();
        platform.set_enumeration_available(false);
        platform.set_a2dp_on(true);
        platform.set_wired_headset_on(true);
        platform.set_speakerphone_on(true).unwrap();

        assert!(routing.is_bluetooth_a2dp_on());
        assert_eq!(
            routing.connected_device_descriptions(),
            vec!["Bluetooth A2DP", "Wired Headset", "Speakerphone"]
        );
    }
}
