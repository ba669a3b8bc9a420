//! Signal chain: compressor followed by the seven EQ bands.
//!
//! This is the one place the processing order lives. The live graph and the
//! offline renderer both run audio through a `SignalChain`, so the two paths
//! share filter math and topology by construction.

use crate::params::{BAND_COUNT, CompressorSettings, EqBands, ParamChange};

use super::compressor::Compressor;
use super::filter::BiquadFilter;

/// A processing stage, in signal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Compressor,
    Band(usize),
    AnalysisTap,
    Output,
}

/// Stage order from source to output. The analysis tap is a passive branch
/// off the last band; output is fed by the last band directly.
pub fn topology() -> Vec<Stage> {
    let mut stages = vec![Stage::Source, Stage::Compressor];
    stages.extend((0..BAND_COUNT).map(Stage::Band));
    stages.push(Stage::AnalysisTap);
    stages.push(Stage::Output);
    stages
}

#[derive(Debug, Clone)]
pub struct SignalChain {
    sample_rate: f64,
    compressor: Compressor,
    /// `filters[band][channel]`
    filters: Vec<Vec<BiquadFilter>>,
}

impl SignalChain {
    pub fn new(
        sample_rate: f64,
        channel_count: usize,
        bands: &EqBands,
        compressor: &CompressorSettings,
        knee_db: f64,
    ) -> Self {
        let channel_count = channel_count.max(1);
        let filters = bands
            .iter()
            .map(|band| {
                (0..channel_count)
                    .map(|_| BiquadFilter::for_band(band, sample_rate))
                    .collect()
            })
            .collect();
        Self {
            sample_rate,
            compressor: Compressor::new(sample_rate, *compressor, knee_db),
            filters,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.filters.first().map_or(0, |f| f.len())
    }

    /// Gain currently set on a band's filter node.
    pub fn band_gain(&self, index: usize) -> Option<f64> {
        self.filters
            .get(index)
            .and_then(|f| f.first())
            .map(|f| f.gain_db())
    }

    pub fn compressor_settings(&self) -> &CompressorSettings {
        self.compressor.settings()
    }

    pub fn set_band_gain(&mut self, index: usize, gain_db: f64) {
        if let Some(band) = self.filters.get_mut(index) {
            for f in band.iter_mut() {
                f.set_gain_db(gain_db);
            }
        }
    }

    pub fn set_compressor(&mut self, settings: CompressorSettings) {
        self.compressor.set_settings(settings);
    }

    /// Push a store mutation into the nodes. Applied directly, not ramped.
    pub fn apply(&mut self, change: &ParamChange) {
        match *change {
            ParamChange::BandGain { index, gain_db } => self.set_band_gain(index, gain_db),
            ParamChange::Compressor(settings) => self.set_compressor(settings),
        }
    }

    /// Run a planar block through compressor then bands 0..6, in place.
    /// Channels beyond the chain's channel count pass through untouched.
    pub fn process(&mut self, channels: &mut [&mut [f32]]) {
        self.compressor.process_channels(channels);
        for band in self.filters.iter_mut() {
            for (filter, channel) in band.iter_mut().zip(channels.iter_mut()) {
                filter.process_block(channel);
            }
        }
    }

    pub fn reset(&mut self) {
        self.compressor.reset();
        for f in self.filters.iter_mut().flatten() {
            f.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::compressor::DEFAULT_KNEE_DB;

    #[test]
    fn topology_is_compressor_then_ascending_bands() {
        let stages = topology();
        assert_eq!(stages.len(), 11);
        assert_eq!(stages[0], Stage::Source);
        assert_eq!(stages[1], Stage::Compressor);
        for i in 0..BAND_COUNT {
            assert_eq!(stages[2 + i], Stage::Band(i));
        }
        assert_eq!(stages[9], Stage::AnalysisTap);
        assert_eq!(stages[10], Stage::Output);
    }

    #[test]
    fn flat_transparent_chain_is_identity() {
        let mut chain = SignalChain::new(
            44100.0,
            2,
            &EqBands::flat(),
            &CompressorSettings::transparent(),
            DEFAULT_KNEE_DB,
        );
        let mut l: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.01).sin() * 0.9).collect();
        let mut r: Vec<f32> = (0..2048).map(|i| (i as f32 * 0.03).cos() * 0.4).collect();
        let (el, er) = (l.clone(), r.clone());
        chain.process(&mut [&mut l[..], &mut r[..]]);
        assert_eq!(l, el);
        assert_eq!(r, er);
    }

    #[test]
    fn gains_read_back_from_nodes() {
        let mut chain = SignalChain::new(
            44100.0,
            1,
            &EqBands::from_gains([1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -3.0]),
            &CompressorSettings::default(),
            DEFAULT_KNEE_DB,
        );
        assert_eq!(chain.band_gain(0), Some(1.0));
        assert_eq!(chain.band_gain(6), Some(-3.0));
        chain.apply(&ParamChange::BandGain { index: 3, gain_db: 6.0 });
        assert_eq!(chain.band_gain(3), Some(6.0));
        assert_eq!(chain.band_gain(7), None);
    }
}
