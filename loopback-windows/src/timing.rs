//! Conversions between WASAPI's 100-ns reference time and sample counts.

use std::time::Duration;

/// REFERENCE_TIME ticks per second.
pub const HNS_PER_SEC: i64 = 10_000_000;

/// Buffer requested when the low-latency path is off (100 ms).
pub const RELAXED_BUFFER_HNS: i64 = 1_000_000;

/// How long a blocked read or write waits for the device before giving up on
/// the current frame.
pub const DEVICE_WAIT: Duration = Duration::from_millis(200);

/// Samples covering `hns` at `sample_rate_hz`, rounded up.
pub fn hns_to_samples(hns: i64, sample_rate_hz: u32) -> usize {
    if hns <= 0 {
        return 0;
    }
    let rate = i64::from(sample_rate_hz);
    ((hns * rate + HNS_PER_SEC - 1) / HNS_PER_SEC) as usize
}

/// Reference time covering `samples` at `sample_rate_hz`, rounded up.
pub fn samples_to_hns(samples: usize, sample_rate_hz: u32) -> i64 {
    if sample_rate_hz == 0 {
        return 0;
    }
    let rate = i64::from(sample_rate_hz);
    (samples as i64 * HNS_PER_SEC + rate - 1) / rate
}

/// Buffer duration to request from `IAudioClient::Initialize`.
pub fn requested_buffer_hns(buffer_samples: usize, sample_rate_hz: u32, low_latency: bool) -> i64 {
    let exact = samples_to_hns(buffer_samples, sample_rate_hz);
    if low_latency {
        exact
    } else {
        exact.max(RELAXED_BUFFER_HNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_ms_period_at_48k() {
        assert_eq!(hns_to_samples(100_000, 48_000), 480);
        assert_eq!(samples_to_hns(480, 48_000), 100_000);
    }

    #[test]
    fn rounds_up_partial_samples() {
        // 10 ms at 44.1 kHz is 441 samples exactly; 3 ms is 132.3.
        assert_eq!(hns_to_samples(100_000, 44_100), 441);
        assert_eq!(hns_to_samples(30_000, 44_100), 133);
        assert_eq!(hns_to_samples(0, 48_000), 0);
    }

    #[test]
    fn relaxed_mode_never_shrinks_buffer() {
        assert_eq!(requested_buffer_hns(480, 48_000, true), 100_000);
        assert_eq!(requested_buffer_hns(480, 48_000, false), RELAXED_BUFFER_HNS);
        assert_eq!(requested_buffer_hns(9_600, 48_000, false), 2_000_000);
    }
}
