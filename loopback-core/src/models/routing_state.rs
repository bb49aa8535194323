use serde::{Deserialize, Serialize};

/// System audio mode, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    #[default]
    Normal,
    InCommunication,
}

/// Stream category whose focus and volume the routing layer manipulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    /// The communication-oriented stream; routes to a Bluetooth headset over SCO.
    VoiceCall,
}

/// Outcome of an audio focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusRequest {
    Granted,
    Denied,
}

/// What the routing controller currently holds.
///
/// Mutated only while a session is starting or stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingState {
    pub bluetooth_sco_enabled: bool,
    pub audio_mode: AudioMode,
    pub focus_held: bool,
}

impl RoutingState {
    /// Whether release has anything left to undo.
    pub fn is_acquired(&self) -> bool {
        self.bluetooth_sco_enabled || self.focus_held || self.audio_mode != AudioMode::Normal
    }
}
