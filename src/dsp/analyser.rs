//! Analysis tap: a passive spectrum analyser at the end of the chain.
//!
//! Mirrors the WebAudio AnalyserNode byte-frequency readout: the most recent
//! `fft_size` mono samples are Blackman-windowed, transformed, smoothed over
//! time and mapped from dB into `0..=255`. The tap only copies samples; it
//! never alters or delays the audio passing through the chain.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Analyser settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserConfig {
    /// Transform size; the readout has `fft_size / 2` bins.
    pub fft_size: usize,
    /// Weight of the previous frame in `[0, 1)`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

pub struct AnalysisTap {
    config: AnalyserConfig,
    fft: Arc<dyn Fft<f32>>,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl std::fmt::Debug for AnalysisTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisTap")
            .field("config", &self.config)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

impl AnalysisTap {
    pub fn new(config: AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(32).next_power_of_two();
        let config = AnalyserConfig {
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 0.99),
            ..config
        };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        // Blackman window, as the WebAudio analyser uses.
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            config,
            fft,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
            smoothed: vec![0.0; fft_size / 2],
        }
    }

    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// Number of bins in a readout.
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Copy a planar block into the ring buffer, downmixed to mono.
    pub fn push(&mut self, channels: &[&[f32]]) {
        let Some(frames) = channels.iter().map(|c| c.len()).min() else {
            return;
        };
        let scale = 1.0 / channels.len() as f32;
        let size = self.ring.len();
        for i in 0..frames {
            let sum: f32 = channels.iter().map(|c| c[i]).sum();
            let sample = sum * scale;
            self.ring[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    /// Current byte magnitude spectrum, one value per bin.
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let size = self.config.fft_size;

        // Oldest sample sits at write_pos.
        for i in 0..size {
            let sample = self.ring[(self.write_pos + i) % size];
            self.fft_buffer[i] = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        let tau = self.config.smoothing;
        let norm = 1.0 / size as f32;
        let range = self.config.max_decibels - self.config.min_decibels;
        let scale = 255.0 / range;

        self.smoothed
            .iter_mut()
            .zip(&self.fft_buffer)
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * norm;
                *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
                let db = if *smoothed > 0.0 {
                    20.0 * smoothed.log10()
                } else {
                    f32::NEG_INFINITY
                };
                (scale * (db - self.config.min_decibels)).clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Clear history (graph teardown/rebuild).
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
    }
}
