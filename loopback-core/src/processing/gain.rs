use portable_atomic::{AtomicF32, Ordering};

/// Unity gain.
pub const DEFAULT_GAIN: f32 = 1.0;

/// Upper clamp for the gain multiplier. Beyond this nearly every sample clips.
pub const MAX_GAIN: f32 = 8.0;

/// Clamp a requested gain into `[0.0, MAX_GAIN]`.
///
/// NaN maps to [`DEFAULT_GAIN`].
pub fn clamp_gain(value: f32) -> f32 {
    if value.is_nan() {
        return DEFAULT_GAIN;
    }
    value.clamp(0.0, MAX_GAIN)
}

/// Shared gain multiplier.
///
/// Written by the control context, read once per frame by the loop. Lock-free;
/// a store is visible to the next frame that loads it.
#[derive(Debug)]
pub struct GainSetting {
    value: AtomicF32,
}

impl GainSetting {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(clamp_gain(value)),
        }
    }

    /// Clamp and store. Returns the stored value.
    pub fn set(&self, value: f32) -> f32 {
        let clamped = clamp_gain(value);
        self.value.store(clamped, Ordering::Release);
        clamped
    }

    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }
}

impl Default for GainSetting {
    fn default() -> Self {
        Self::new(DEFAULT_GAIN)
    }
}

/// Pure gain transform over 16-bit samples.
pub struct GainStage;

impl GainStage {
    /// Multiply every sample by `gain`, rounding and saturating to the i16 range.
    ///
    /// `out = clamp(round(sample * gain), i16::MIN, i16::MAX)`; never wraps.
    pub fn apply(samples: &mut [i16], gain: f32) {
        if gain == DEFAULT_GAIN {
            return;
        }
        for sample in samples.iter_mut() {
            let scaled = (f32::from(*sample) * gain).round();
            *sample = scaled.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        }
    }

    /// Single-sample form of [`apply`](Self::apply).
    pub fn apply_one(sample: i16, gain: f32) -> i16 {
        let mut block = [sample];
        Self::apply(&mut block, gain);
        block[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gain_is_passthrough() {
        let mut samples = [0, 1000, -1000, i16::MAX, i16::MIN];
        let original = samples;
        GainStage::apply(&mut samples, 1.0);
        assert_eq!(samples, original);
    }

    #[test]
    fn doubles_within_range() {
        let mut samples = [1000, -1000, 0];
        GainStage::apply(&mut samples, 2.0);
        assert_eq!(samples, [2000, -2000, 0]);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        assert_eq!(GainStage::apply_one(20_000, 2.0), i16::MAX);
        assert_eq!(GainStage::apply_one(-20_000, 2.0), i16::MIN);
        assert_eq!(GainStage::apply_one(i16::MIN, MAX_GAIN), i16::MIN);
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(GainStage::apply_one(3, 0.5), 2); // 1.5 rounds away from zero
        assert_eq!(GainStage::apply_one(-3, 0.5), -2);
        assert_eq!(GainStage::apply_one(10, 0.33), 3);
    }

    #[test]
    fn zero_gain_silences() {
        let mut samples = [i16::MAX, i16::MIN, 123];
        GainStage::apply(&mut samples, 0.0);
        assert_eq!(samples, [0, 0, 0]);
    }

    #[test]
    fn output_always_in_range_and_exact_when_representable() {
        let gains = [0.0f32, 0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 8.0];
        let samples = [i16::MIN, -20_000, -4096, -1, 0, 1, 777, 4096, 20_000, i16::MAX];
        for &g in &gains {
            for &s in &samples {
                let out = GainStage::apply_one(s, g);
                let expected = (f64::from(s) * f64::from(g)).round();
                if expected >= f64::from(i16::MIN) && expected <= f64::from(i16::MAX) {
                    assert_eq!(f64::from(out), expected, "s={s} g={g}");
                } else if expected > 0.0 {
                    assert_eq!(out, i16::MAX, "s={s} g={g}");
                } else {
                    assert_eq!(out, i16::MIN, "s={s} g={g}");
                }
            }
        }
    }

    #[test]
    fn clamp_gain_bounds() {
        assert_eq!(clamp_gain(-1.0), 0.0);
        assert_eq!(clamp_gain(100.0), MAX_GAIN);
        assert_eq!(clamp_gain(f32::INFINITY), MAX_GAIN);
        assert_eq!(clamp_gain(f32::NAN), DEFAULT_GAIN);
        assert_eq!(clamp_gain(2.5), 2.5);
    }

    #[test]
    fn gain_setting_clamps_on_store() {
        let gain = GainSetting::default();
        assert_eq!(gain.get(), 1.0);
        assert_eq!(gain.set(12.0), MAX_GAIN);
        assert_eq!(gain.get(), MAX_GAIN);
        gain.set(0.5);
        approx::assert_relative_eq!(gain.get(), 0.5);
    }
}
