//! Real-time meter: derives a display level from byte spectrum frames.
//!
//! Each frame is reduced to a kick (sub-bass), snare (presence) and overall
//! level. Drum transients are deliberately exaggerated relative to sustained
//! content. Peak and true-peak channels hold, then decay linearly per frame.
//! All constants live in [`MeterConfig`]; the defaults are the tuned values.

#[cfg(feature = "live")]
pub mod frame_loop;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Meter tuning constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeterConfig {
    /// Bins `0..kick_bins` form the kick range.
    pub kick_bins: usize,
    /// Bins `snare_start..snare_end` form the snare range.
    pub snare_start: usize,
    pub snare_end: usize,
    /// Raw byte magnitude a kick bin must exceed to trigger.
    pub kick_threshold: u8,
    pub kick_retrigger_ms: u64,
    pub kick_decay_per_frame: f64,
    pub kick_boost: f64,
    /// Extra level added per unit of kick transient.
    pub kick_transient_weight: f64,
    pub snare_boost: f64,
    pub peak_hold_ms: u64,
    pub peak_decay_per_frame: f64,
    pub true_peak_hold_ms: u64,
    pub true_peak_decay_per_frame: f64,
    /// Overall level multiplier feeding the true-peak channel.
    pub true_peak_scale: f64,
    pub clip_threshold: f64,
    /// Cap for `level` and `peak_hold`.
    pub display_max: f64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            kick_bins: 8,
            snare_start: 150,
            snare_end: 400,
            kick_threshold: 200,
            kick_retrigger_ms: 100,
            kick_decay_per_frame: 8.0,
            kick_boost: 1.3,
            kick_transient_weight: 0.3,
            snare_boost: 1.15,
            peak_hold_ms: 500,
            peak_decay_per_frame: 2.0,
            true_peak_hold_ms: 2000,
            true_peak_decay_per_frame: 1.0,
            true_peak_scale: 1.2,
            clip_threshold: 95.0,
            display_max: 200.0,
        }
    }
}

/// What the level meter displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterState {
    pub level: f64,
    pub peak_hold: f64,
    pub true_peak_hold: f64,
    pub clipping: bool,
    /// 0..=100; snaps to 100 on a kick, then decays.
    pub kick_transient: f64,
}

/// Frame-to-frame meter memory.
#[derive(Debug, Clone)]
pub struct Meter {
    config: MeterConfig,
    state: MeterState,
    last_kick: Option<Duration>,
    peak_hold_until: Duration,
    true_peak_hold_until: Duration,
}

fn percent(byte: u8) -> f64 {
    byte as f64 / 255.0 * 100.0
}

fn max_in(frame: &[u8], start: usize, end: usize) -> u8 {
    let end = end.min(frame.len());
    let start = start.min(end);
    frame[start..end].iter().copied().max().unwrap_or(0)
}

impl Meter {
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            state: MeterState::default(),
            last_kick: None,
            peak_hold_until: Duration::ZERO,
            true_peak_hold_until: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn state(&self) -> MeterState {
        self.state
    }

    /// Fold one spectrum frame into the meter. `now` is a monotonic timestamp.
    pub fn process(&mut self, frame: &[u8], now: Duration) -> MeterState {
        let cfg = self.config;

        let kick_level = max_in(frame, 0, cfg.kick_bins);
        let snare_level = max_in(frame, cfg.snare_start, cfg.snare_end);
        let overall = percent(max_in(frame, 0, frame.len()));

        // Kick transient
        let retrigger = Duration::from_millis(cfg.kick_retrigger_ms);
        let ready = self
            .last_kick
            .is_none_or(|last| now.saturating_sub(last) >= retrigger);
        if kick_level > cfg.kick_threshold && ready {
            self.state.kick_transient = 100.0;
            self.last_kick = Some(now);
        } else {
            self.state.kick_transient =
                (self.state.kick_transient - cfg.kick_decay_per_frame).max(0.0);
        }

        // Peak hold tracks the raw overall level.
        if overall > self.state.peak_hold {
            self.state.peak_hold = overall.min(cfg.display_max);
            self.peak_hold_until = now + Duration::from_millis(cfg.peak_hold_ms);
        } else if now >= self.peak_hold_until {
            self.state.peak_hold = (self.state.peak_hold - cfg.peak_decay_per_frame).max(0.0);
        }

        // Composite level with drum emphasis.
        let kick_boosted = percent(kick_level) * cfg.kick_boost
            + self.state.kick_transient * cfg.kick_transient_weight;
        let snare_boosted = percent(snare_level) * cfg.snare_boost;
        let level = overall
            .max(kick_boosted)
            .max(snare_boosted)
            .clamp(0.0, cfg.display_max);
        self.state.level = level;

        // True peak may read past 100%.
        let true_peak = level.max(overall * cfg.true_peak_scale);
        if true_peak > self.state.true_peak_hold {
            self.state.true_peak_hold = true_peak;
            self.true_peak_hold_until = now + Duration::from_millis(cfg.true_peak_hold_ms);
        } else if now >= self.true_peak_hold_until {
            self.state.true_peak_hold =
                (self.state.true_peak_hold - cfg.true_peak_decay_per_frame).max(0.0);
        }

        self.state.clipping = level > cfg.clip_threshold;
        self.state
    }

    /// Back to silence (graph torn down).
    pub fn reset(&mut self) {
        self.state = MeterState::default();
        self.last_kick = None;
        self.peak_hold_until = Duration::ZERO;
        self.true_peak_hold_until = Duration::ZERO;
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new(MeterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn kick_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 2048];
        frame[..8].fill(230);
        frame
    }

    fn flat_frame(value: u8) -> Vec<u8> {
        vec![value; 2048]
    }

    #[test]
    fn silence_stays_at_zero() {
        let mut meter = Meter::default();
        let state = meter.process(&flat_frame(0), ms(0));
        assert_eq!(state, MeterState::default());
    }

    #[test]
    fn kick_retrigger_within_100ms_is_ignored() {
        let mut meter = Meter::default();
        let first = meter.process(&kick_frame(), ms(0));
        assert_eq!(first.kick_transient, 100.0);

        let second = meter.process(&kick_frame(), ms(50));
        assert_eq!(second.kick_transient, 92.0, "second hit must decay, not retrigger");

        let third = meter.process(&kick_frame(), ms(120));
        assert_eq!(third.kick_transient, 100.0);
    }

    #[test]
    fn kick_transient_decays_to_floor() {
        let mut meter = Meter::default();
        meter.process(&kick_frame(), ms(0));
        let mut state = MeterState::default();
        for i in 1..=20 {
            state = meter.process(&flat_frame(0), ms(i * 16));
        }
        assert_eq!(state.kick_transient, 0.0);
    }

    #[test]
    fn peak_holds_for_500ms_then_decays() {
        let mut meter = Meter::default();
        meter.process(&flat_frame(255), ms(0));
        let held = meter.process(&flat_frame(0), ms(400));
        assert_eq!(held.peak_hold, 100.0);
        let decayed = meter.process(&flat_frame(0), ms(520));
        assert_eq!(decayed.peak_hold, 98.0);
    }

    #[test]
    fn true_peak_exceeds_100_and_holds_longer() {
        let mut meter = Meter::default();
        let loud = meter.process(&flat_frame(255), ms(0));
        assert!(loud.true_peak_hold > 100.0, "true peak {}", loud.true_peak_hold);
        assert!(loud.clipping);

        let held = meter.process(&flat_frame(0), ms(1500));
        assert_eq!(held.true_peak_hold, loud.true_peak_hold);
        assert!(!held.clipping);
        let decayed = meter.process(&flat_frame(0), ms(2100));
        assert_eq!(decayed.true_peak_hold, loud.true_peak_hold - 1.0);
    }

    #[test]
    fn level_and_peak_never_negative_or_over_display_max() {
        let mut meter = Meter::default();
        for i in 0..300u64 {
            let frame = if i % 7 == 0 { kick_frame() } else { flat_frame((i * 37 % 256) as u8) };
            let s = meter.process(&frame, ms(i * 16));
            assert!(s.level >= 0.0 && s.level <= 200.0);
            assert!(s.peak_hold >= 0.0 && s.peak_hold <= 200.0);
            assert!(s.kick_transient >= 0.0 && s.kick_transient <= 100.0);
        }
    }

    #[test]
    fn kick_is_exaggerated_over_sustained_content() {
        let mut meter = Meter::default();
        let state = meter.process(&kick_frame(), ms(0));
        let overall = 230.0 / 255.0 * 100.0;
        assert!(state.level > overall, "level {} vs overall {overall}", state.level);
    }

    #[test]
    fn short_frames_do_not_panic() {
        let mut meter = Meter::default();
        let state = meter.process(&[255, 255, 255], ms(0));
        assert_eq!(state.kick_transient, 100.0);
    }

    #[test]
    fn reset_clears_memory() {
        let mut meter = Meter::default();
        meter.process(&kick_frame(), ms(0));
        meter.reset();
        assert_eq!(meter.state(), MeterState::default());
        assert_eq!(meter.process(&kick_frame(), ms(10)).kick_transient, 100.0);
    }
}
