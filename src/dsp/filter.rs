//! Biquad filter: matches WebAudio BiquadFilterNode coefficients for the
//! peaking and shelf shapes used by the EQ bands.

use std::f64::consts::PI;

use crate::params::{BandShape, EqBand};

/// A biquad IIR filter (2nd order), one channel.
///
/// Direct Form II Transposed. Coefficient formulas from the Audio EQ
/// Cookbook (Robert Bristow-Johnson) with the shelf slope fixed at 1.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    shape: BandShape,
    frequency: f64,
    q: f64,
    gain_db: f64,

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
}

impl BiquadFilter {
    pub fn new(shape: BandShape, frequency: f64, q: f64, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            shape,
            frequency,
            q,
            gain_db: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        };
        f.update_coefficients();
        f
    }

    /// Filter configured from an EQ band's fixed layout and current gain.
    pub fn for_band(band: &EqBand, sample_rate: f64) -> Self {
        let mut f = Self::new(band.shape(), band.frequency_hz(), band.q(), sample_rate);
        f.set_gain_db(band.gain_db());
        f
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn shape(&self) -> BandShape {
        self.shape
    }

    /// Set gain and recompute coefficients immediately (no ramp).
    pub fn set_gain_db(&mut self, gain_db: f64) {
        if self.gain_db != gain_db {
            self.gain_db = gain_db;
            self.update_coefficients();
        }
    }

    /// Recompute filter coefficients from current parameters.
    fn update_coefficients(&mut self) {
        // Keep w0 below Nyquist so high bands stay defined at low sample rates.
        let frequency = self.frequency.clamp(1.0, self.sample_rate * 0.499);
        let w0 = 2.0 * PI * frequency / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let a_lin = 10.0_f64.powf(self.gain_db / 40.0);

        let (b0, b1, b2, a0, a1, a2) = match self.shape {
            BandShape::Peaking => {
                let alpha = sin_w0 / (2.0 * self.q);
                let b0 = 1.0 + alpha * a_lin;
                let b1 = -2.0 * cos_w0;
                let b2 = 1.0 - alpha * a_lin;
                let a0 = 1.0 + alpha / a_lin;
                let a1 = -2.0 * cos_w0;
                let a2 = 1.0 - alpha / a_lin;
                (b0, b1, b2, a0, a1, a2)
            }
            BandShape::LowShelf => {
                let alpha = sin_w0 / 2.0 * 2.0_f64.sqrt();
                let k = 2.0 * a_lin.sqrt() * alpha;
                let b0 = a_lin * ((a_lin + 1.0) - (a_lin - 1.0) * cos_w0 + k);
                let b1 = 2.0 * a_lin * ((a_lin - 1.0) - (a_lin + 1.0) * cos_w0);
                let b2 = a_lin * ((a_lin + 1.0) - (a_lin - 1.0) * cos_w0 - k);
                let a0 = (a_lin + 1.0) + (a_lin - 1.0) * cos_w0 + k;
                let a1 = -2.0 * ((a_lin - 1.0) + (a_lin + 1.0) * cos_w0);
                let a2 = (a_lin + 1.0) + (a_lin - 1.0) * cos_w0 - k;
                (b0, b1, b2, a0, a1, a2)
            }
            BandShape::HighShelf => {
                let alpha = sin_w0 / 2.0 * 2.0_f64.sqrt();
                let k = 2.0 * a_lin.sqrt() * alpha;
                let b0 = a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cos_w0 + k);
                let b1 = -2.0 * a_lin * ((a_lin - 1.0) + (a_lin + 1.0) * cos_w0);
                let b2 = a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cos_w0 - k);
                let a0 = (a_lin + 1.0) - (a_lin - 1.0) * cos_w0 + k;
                let a1 = 2.0 * ((a_lin - 1.0) - (a_lin + 1.0) * cos_w0);
                let a2 = (a_lin + 1.0) - (a_lin - 1.0) * cos_w0 - k;
                (b0, b1, b2, a0, a1, a2)
            }
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Process a block in place.
    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s as f64) as f32;
        }
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_amplitude(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f64 {
        let mut max_out = 0.0_f64;
        for i in 0..(sample_rate as usize / 2) {
            let t = i as f64 / sample_rate;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > sample_rate as usize / 4 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn flat_filters_are_exact_identity() {
        for shape in [BandShape::LowShelf, BandShape::Peaking, BandShape::HighShelf] {
            let mut f = BiquadFilter::new(shape, 1000.0, 1.0, 44100.0);
            for i in 0..2000 {
                let input = ((i * 7919) % 2001) as f64 / 1000.0 - 1.0;
                assert_eq!(f.process(input), input, "{shape:?} at 0 dB altered sample {i}");
            }
        }
    }

    #[test]
    fn peaking_boosts_center_frequency() {
        let mut f = BiquadFilter::new(BandShape::Peaking, 1000.0, 1.2, 44100.0);
        f.set_gain_db(6.0);
        let amp = sine_amplitude(&mut f, 1000.0, 44100.0);
        // +6 dB ≈ ×1.995
        assert!((amp - 1.995).abs() < 0.05, "expected ~1.995, got {amp}");
    }

    #[test]
    fn peaking_leaves_distant_frequencies() {
        let mut f = BiquadFilter::new(BandShape::Peaking, 1000.0, 1.2, 44100.0);
        f.set_gain_db(12.0);
        let amp = sine_amplitude(&mut f, 15000.0, 44100.0);
        assert!((amp - 1.0).abs() < 0.1, "15kHz should be ~unchanged, got {amp}");
    }

    #[test]
    fn low_shelf_cuts_bass_not_treble() {
        let mut f = BiquadFilter::new(BandShape::LowShelf, 250.0, 0.7, 44100.0);
        f.set_gain_db(-12.0);
        let low = sine_amplitude(&mut f, 40.0, 44100.0);
        f.reset();
        let high = sine_amplitude(&mut f, 8000.0, 44100.0);
        assert!(low < 0.35, "40Hz should be cut by ~12dB, got {low}");
        assert!((high - 1.0).abs() < 0.05, "8kHz should pass, got {high}");
    }

    #[test]
    fn high_shelf_boosts_treble() {
        let mut f = BiquadFilter::new(BandShape::HighShelf, 6000.0, 0.7, 44100.0);
        f.set_gain_db(12.0);
        let high = sine_amplitude(&mut f, 16000.0, 44100.0);
        assert!(high > 3.0, "16kHz should be boosted ~12dB, got {high}");
    }

    #[test]
    fn band_above_nyquist_stays_finite() {
        let mut f = BiquadFilter::new(BandShape::HighShelf, 12000.0, 0.7, 16000.0);
        f.set_gain_db(12.0);
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            let out = f.process(input);
            assert!(out.is_finite(), "Filter output not finite at sample {i}");
        }
    }
}
