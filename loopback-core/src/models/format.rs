use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sample rates the loopback path can run at.
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [44_100, 48_000];

/// Channel layout of the loopback path. Only mono is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    #[default]
    Mono,
}

impl ChannelLayout {
    pub fn count(&self) -> u16 {
        match self {
            Self::Mono => 1,
        }
    }
}

/// Sample encoding of the loopback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SampleEncoding {
    #[default]
    #[serde(rename = "pcm16")]
    Pcm16,
}

/// Format of one loopback session.
///
/// Fixed for the lifetime of a [`DeviceSession`](crate::session::device_session::DeviceSession);
/// changing it means tearing the session down and opening a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub channels: ChannelLayout,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
}

impl AudioFormat {
    pub const fn mono_pcm16(sample_rate_hz: u32) -> Self {
        Self {
            sample_rate_hz,
            channels: ChannelLayout::Mono,
            bits_per_sample: 16,
            encoding: SampleEncoding::Pcm16,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate_hz) {
            return Err(format!("unsupported sample rate: {} Hz", self.sample_rate_hz));
        }
        if self.bits_per_sample != 16 {
            return Err(format!("unsupported bit depth: {}", self.bits_per_sample));
        }
        Ok(())
    }

    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bits_per_sample / 8)
    }

    /// Bytes per frame across all channels (the platform block alignment).
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels.count())
    }

    /// Wall-clock time covered by `samples` mono samples.
    pub fn duration_of(&self, samples: usize) -> Duration {
        Duration::from_secs_f64(samples as f64 / f64::from(self.sample_rate_hz))
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::mono_pcm16(48_000)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz / {} ch / {}-bit PCM",
            self.sample_rate_hz,
            self.channels.count(),
            self.bits_per_sample
        )
    }
}
