use serde::{Deserialize, Serialize};

/// Kind of a connected output device, as reported by the routing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioDeviceKind {
    BluetoothSco,
    BluetoothA2dp,
    WiredHeadset,
    WiredHeadphones,
    BuiltinSpeaker,
    BuiltinEarpiece,
    /// Platform-specific type code with no dedicated variant.
    Other(u32),
}

impl std::fmt::Display for AudioDeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BluetoothSco => f.write_str("Bluetooth SCO"),
            Self::BluetoothA2dp => f.write_str("Bluetooth A2DP"),
            Self::WiredHeadset => f.write_str("Wired Headset"),
            Self::WiredHeadphones => f.write_str("Wired Headphones"),
            Self::BuiltinSpeaker => f.write_str("Built-in Speaker"),
            Self::BuiltinEarpiece => f.write_str("Built-in Earpiece"),
            Self::Other(code) => write!(f, "Other: {code}"),
        }
    }
}

/// A connected audio output device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    pub kind: AudioDeviceKind,
    pub product_name: String,
}

impl AudioDevice {
    pub fn new(kind: AudioDeviceKind, product_name: impl Into<String>) -> Self {
        Self {
            kind,
            product_name: product_name.into(),
        }
    }

    /// Human-readable description, e.g. `"Bluetooth SCO: Jabra Evolve"`.
    pub fn description(&self) -> String {
        if self.product_name.is_empty() {
            self.kind.to_string()
        } else {
            format!("{}: {}", self.kind, self.product_name)
        }
    }
}

/// Platform-reported buffer sizes for a format, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Smallest buffer the platform accepts.
    pub min_samples: usize,
    /// What the configured buffer policy yields.
    pub optimal_samples: usize,
}
