use std::sync::Arc;

use crate::engine::loopback::LoopbackEngine;
use crate::models::devices::BufferConfig;
use crate::models::error::EngineError;
use crate::models::state::SessionState;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::routing_platform::RoutingPlatform;

/// Boolean-result control surface for a host UI.
///
/// Every error is logged and flattened to `false` (or an empty value); use
/// [`engine`](Self::engine) when the caller needs the typed error.
pub struct LoopbackControl<B: AudioBackend, R: RoutingPlatform> {
    engine: LoopbackEngine<B, R>,
}

impl<B: AudioBackend, R: RoutingPlatform> LoopbackControl<B, R> {
    pub fn new(engine: LoopbackEngine<B, R>) -> Self {
        Self { engine }
    }

    pub fn from_parts(backend: B, routing: Arc<R>) -> Self {
        Self::new(LoopbackEngine::new(backend, routing))
    }

    pub fn engine(&self) -> &LoopbackEngine<B, R> {
        &self.engine
    }

    /// Start loopback at `gain`. Already running counts as success; the gain
    /// is still applied.
    pub fn start(&self, gain: f32) -> bool {
        match self.engine.start(gain) {
            Ok(()) => true,
            Err(EngineError::AlreadyRunning) => {
                log::debug!("Audio loopback already running");
                self.engine.set_gain(gain);
                true
            }
            Err(e) => {
                log::error!("Failed to start audio loopback: {}", e);
                false
            }
        }
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    pub fn set_gain(&self, gain: f32) {
        self.engine.set_gain(gain);
    }

    pub fn enable_processing(&self, echo_cancellation: bool, noise_suppression: bool) {
        self.engine.enable_processing(echo_cancellation, noise_suppression);
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    pub fn list_connected_devices(&self) -> Vec<String> {
        self.engine.connected_devices()
    }

    pub fn set_low_latency_mode(&self, enable: bool) -> bool {
        match self.engine.set_low_latency_mode(enable) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to switch low-latency mode: {}", e);
                false
            }
        }
    }

    pub fn enable_bluetooth_sco(&self, enable: bool) -> bool {
        match self.engine.enable_bluetooth_sco(enable) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to {} Bluetooth SCO: {}", if enable { "enable" } else { "disable" }, e);
                false
            }
        }
    }

    pub fn is_bluetooth_sco_on(&self) -> bool {
        self.engine.is_bluetooth_sco_on()
    }

    pub fn is_bluetooth_a2dp_on(&self) -> bool {
        self.engine.is_bluetooth_a2dp_on()
    }

    pub fn is_wired_headset_on(&self) -> bool {
        self.engine.is_wired_headset_on()
    }

    pub fn is_speakerphone_on(&self) -> bool {
        self.engine.is_speakerphone_on()
    }

    pub fn set_speakerphone_on(&self, on: bool) -> bool {
        match self.engine.set_speakerphone_on(on) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to set speakerphone: {}", e);
                false
            }
        }
    }

    /// `None` when the platform cannot report a minimum buffer.
    pub fn optimal_buffer_config(&self) -> Option<BufferConfig> {
        match self.engine.optimal_buffer_config() {
            Ok(config) => Some(config),
            Err(e) => {
                log::error!("Failed to query buffer sizes: {}", e);
                None
            }
        }
    }
}
