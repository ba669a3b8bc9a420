//! Compressor effect: dynamics processing ahead of the EQ bands.
//!
//! Feed-forward compressor with threshold, ratio, knee, attack, and release
//! parameters matching the WebAudio DynamicsCompressorNode controls. Level
//! detection is linked across channels so the stereo image does not shift.

use crate::params::CompressorSettings;

/// Knee width used when none is configured (the WebAudio default).
pub const DEFAULT_KNEE_DB: f64 = 30.0;

/// A multichannel dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,
    settings: CompressorSettings,
    /// Knee width in dB (0 = hard knee).
    knee: f64,
    /// Makeup gain in dB.
    pub makeup_gain: f64,

    attack_coef: f64,
    release_coef: f64,
    envelope: f64, // Current envelope level (linear)
}

impl Compressor {
    pub fn new(sample_rate: f64, settings: CompressorSettings, knee: f64) -> Self {
        let mut c = Self {
            sample_rate,
            settings,
            knee: knee.max(0.0),
            makeup_gain: 0.0,
            attack_coef: 0.0,
            release_coef: 0.0,
            envelope: 0.0,
        };
        c.set_settings(settings);
        c
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Replace all parameters at once. Values are clamped.
    pub fn set_settings(&mut self, settings: CompressorSettings) {
        self.settings = settings.clamped();
        self.attack_coef = Self::time_coef(self.settings.attack_sec, self.sample_rate);
        self.release_coef = Self::time_coef(self.settings.release_sec, self.sample_rate);
    }

    /// One-pole smoothing coefficient; zero time means an instant follower.
    fn time_coef(seconds: f64, sample_rate: f64) -> f64 {
        if seconds <= 0.0 {
            0.0
        } else {
            (-1.0 / (seconds * sample_rate)).exp()
        }
    }

    /// Convert linear amplitude to dB.
    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    /// Convert dB to linear amplitude.
    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Compute gain reduction (≤ 0 dB) for a given input level in dB.
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let threshold = self.settings.threshold_db;
        let slope = 1.0 - 1.0 / self.settings.ratio;
        let knee = self.knee;

        if knee <= 0.0 {
            // Hard knee
            if input_db <= threshold {
                0.0
            } else {
                (threshold - input_db) * slope
            }
        } else {
            // Soft knee
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold - input_db) * slope
            } else {
                // In the knee region - quadratic interpolation
                let x = input_db - knee_start;
                -(x * x) / (2.0 * knee) * slope
            }
        }
    }

    /// Advance the envelope with one detector sample and return the linear gain.
    #[inline]
    fn next_gain(&mut self, input_level: f64) -> f32 {
        let coef = if input_level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * input_level;

        let gain_reduction_db = self.compute_gain(Self::linear_to_db(self.envelope));
        Self::db_to_linear(gain_reduction_db + self.makeup_gain) as f32
    }

    /// Process planar channel slices in place. All slices must share a length.
    pub fn process_channels(&mut self, channels: &mut [&mut [f32]]) {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        for i in 0..frames {
            let input_level = channels
                .iter()
                .map(|c| c[i].abs())
                .fold(0.0_f32, f32::max) as f64;
            let gain = self.next_gain(input_level);
            for channel in channels.iter_mut() {
                channel[i] *= gain;
            }
        }
    }

    /// Reset the compressor state.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    /// Current gain reduction in dB (for metering).
    pub fn gain_reduction(&self) -> f64 {
        -self.compute_gain(Self::linear_to_db(self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(threshold_db: f64, ratio: f64, attack_sec: f64, release_sec: f64) -> CompressorSettings {
        CompressorSettings {
            threshold_db,
            ratio,
            attack_sec,
            release_sec,
        }
    }

    fn run(comp: &mut Compressor, level: f32, samples: usize) -> f32 {
        let mut l = vec![level; samples];
        let mut r = vec![level; samples];
        comp.process_channels(&mut [&mut l[..], &mut r[..]]);
        l[samples - 1]
    }

    #[test]
    fn ratio_one_is_identity() {
        let mut comp = Compressor::new(44100.0, CompressorSettings::transparent(), DEFAULT_KNEE_DB);
        let mut mono: Vec<f32> = (0..4000).map(|i| ((i as f32) * 0.37).sin()).collect();
        let expected = mono.clone();
        comp.process_channels(&mut [&mut mono[..]]);
        assert_eq!(mono, expected);
    }

    #[test]
    fn passthrough_below_threshold() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 4.0, 0.001, 0.1), 0.0);
        let out = run(&mut comp, 0.05, 1000); // -26 dB
        assert!((out - 0.05).abs() < 1e-6, "below threshold should pass: got {out}");
    }

    #[test]
    fn reduces_loud_signals() {
        let mut comp = Compressor::new(44100.0, settings(-12.0, 4.0, 0.001, 0.1), 0.0);
        let out = run(&mut comp, 1.0, 5000);
        // 12 dB over at 4:1 → 9 dB reduction ≈ 0.355
        assert!((out - 0.355).abs() < 0.02, "expected ~0.355, got {out}");
        assert!((comp.gain_reduction() - 9.0).abs() < 0.2);
    }

    #[test]
    fn attack_time_shapes_onset() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 10.0, 0.01, 0.5), 0.0);
        let first = run(&mut comp, 1.0, 1);
        let later = run(&mut comp, 1.0, 500);
        assert!(first > later, "first={first}, later={later}");
    }

    #[test]
    fn release_recovers_gain() {
        let mut comp = Compressor::new(44100.0, settings(-20.0, 10.0, 0.001, 0.05), 0.0);
        run(&mut comp, 1.0, 1000);
        let compressed = run(&mut comp, 0.1, 1);
        let released = run(&mut comp, 0.1, 5000);
        assert!(released > compressed, "compressed={compressed}, released={released}");
    }

    #[test]
    fn zero_attack_is_instant() {
        let mut comp = Compressor::new(44100.0, settings(-12.0, 4.0, 0.0, 0.1), 0.0);
        let out = run(&mut comp, 1.0, 1);
        assert!((out - 0.355).abs() < 0.01, "instant attack should compress first sample: {out}");
    }

    #[test]
    fn linked_detection_applies_same_gain() {
        let mut comp = Compressor::new(44100.0, settings(-12.0, 8.0, 0.0, 0.1), 0.0);
        let mut l = vec![1.0_f32; 64];
        let mut r = vec![0.1_f32; 64];
        comp.process_channels(&mut [&mut l[..], &mut r[..]]);
        assert!((l[63] / 1.0 - r[63] / 0.1).abs() < 1e-5);
    }
}
