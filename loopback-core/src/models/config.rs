use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::format::AudioFormat;

/// Platform voice-processing stage that can be attached to the capture endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureEffect {
    EchoCancellation,
    NoiseSuppression,
}

impl std::fmt::Display for CaptureEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EchoCancellation => f.write_str("echo cancellation"),
            Self::NoiseSuppression => f.write_str("noise suppression"),
        }
    }
}

/// Which capture effects to request on the next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl ProcessingOptions {
    /// Requested effects, in attachment order.
    pub fn requested(&self) -> Vec<CaptureEffect> {
        let mut effects = Vec::with_capacity(2);
        if self.echo_cancellation {
            effects.push(CaptureEffect::EchoCancellation);
        }
        if self.noise_suppression {
            effects.push(CaptureEffect::NoiseSuppression);
        }
        effects
    }
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// How the session buffer is sized relative to the platform-reported minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPolicy {
    /// Exactly the platform minimum.
    #[default]
    Minimum,
    /// A multiple of the platform minimum, for hardware that underruns at the minimum.
    Multiple(u32),
}

impl BufferPolicy {
    /// Buffer size in samples for a platform minimum of `min_samples`.
    ///
    /// Never smaller than `min_samples`.
    pub fn buffer_samples(&self, min_samples: usize) -> usize {
        match self {
            Self::Minimum => min_samples,
            Self::Multiple(factor) => min_samples.saturating_mul((*factor).max(1) as usize),
        }
    }
}

/// Configuration for a loopback session.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfiguration {
    /// Session format (default: 48000 Hz mono PCM16).
    pub format: AudioFormat,

    /// Buffer sizing relative to the platform minimum (default: the minimum).
    pub buffer_policy: BufferPolicy,

    /// Capture effects requested at open. Effective on the next start.
    pub processing: ProcessingOptions,

    /// Request the low-latency playback performance mode (default: true).
    pub low_latency: bool,

    /// Abort start when the Bluetooth SCO link cannot be brought up (default: false,
    /// the loopback then plays through whatever route the platform picks).
    pub require_bluetooth: bool,

    /// Consecutive transient I/O failures tolerated before the loop stops itself.
    pub max_consecutive_failures: u32,

    /// Bounded wait for the loop thread when stopping, in milliseconds.
    pub stop_timeout_ms: u64,
}

impl LoopbackConfiguration {
    /// Preset for Bluetooth headsets: four times the minimum buffer to ride out
    /// the jitter of the SCO link.
    pub fn bluetooth_headset() -> Self {
        Self {
            buffer_policy: BufferPolicy::Multiple(4),
            ..Self::default()
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.format.validate()?;
        if let BufferPolicy::Multiple(0) = self.buffer_policy {
            return Err("buffer multiple must be at least 1".into());
        }
        if self.stop_timeout_ms == 0 {
            return Err("stop timeout must be positive".into());
        }
        Ok(())
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for LoopbackConfiguration {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            buffer_policy: BufferPolicy::Minimum,
            processing: ProcessingOptions::default(),
            low_latency: true,
            require_bluetooth: false,
            max_consecutive_failures: 10,
            stop_timeout_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_policy_never_below_minimum() {
        assert_eq!(BufferPolicy::Minimum.buffer_samples(960), 960);
        assert_eq!(BufferPolicy::Multiple(4).buffer_samples(960), 3840);
        assert_eq!(BufferPolicy::Multiple(0).buffer_samples(960), 960);
    }

    #[test]
    fn bluetooth_preset_quadruples_buffer() {
        let config = LoopbackConfiguration::bluetooth_headset();
        assert_eq!(config.buffer_policy, BufferPolicy::Multiple(4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_multiple() {
        let config = LoopbackConfiguration {
            buffer_policy: BufferPolicy::Multiple(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = LoopbackConfiguration::from_json(
            r#"{ "format": { "sample_rate_hz": 44100 }, "buffer_policy": { "multiple": 2 } }"#,
        )
        .unwrap();

        assert_eq!(config.format.sample_rate_hz, 44_100);
        assert_eq!(config.format.bits_per_sample, 16);
        assert_eq!(config.buffer_policy, BufferPolicy::Multiple(2));
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.stop_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn from_json_validates() {
        let err = LoopbackConfiguration::from_json(r#"{ "format": { "sample_rate_hz": 8000 } }"#)
            .unwrap_err();
        assert!(err.contains("8000"));
    }

    #[test]
    fn requested_effects_follow_flags() {
        let options = ProcessingOptions {
            echo_cancellation: false,
            noise_suppression: true,
        };
        assert_eq!(options.requested(), vec![CaptureEffect::NoiseSuppression]);
    }
}
