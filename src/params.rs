//! Parameter store: the single source of truth for EQ band and compressor values.
//!
//! The live graph and the offline renderer both read from here; nothing ever
//! reads node state back into the store. Mutations clamp to the documented
//! ranges and return a [`ParamChange`] describing what must be pushed to a
//! live graph, if one exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Number of EQ bands. Fixed.
pub const BAND_COUNT: usize = 7;

/// Center/corner frequency of each band, ascending.
pub const BAND_FREQUENCIES: [f64; BAND_COUNT] =
    [20.0, 60.0, 250.0, 1000.0, 3000.0, 6000.0, 12000.0];

/// Q of each band, tuned per frequency.
pub const BAND_Q: [f64; BAND_COUNT] = [0.7, 0.8, 1.0, 1.2, 1.2, 1.0, 0.7];

pub const MIN_GAIN_DB: f64 = -12.0;
pub const MAX_GAIN_DB: f64 = 12.0;

/// Filter shape of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandShape {
    LowShelf,
    Peaking,
    HighShelf,
}

impl BandShape {
    /// Shape for a band index: outer bands are shelves, the rest peaking.
    pub fn for_index(index: usize) -> Self {
        match index {
            0 => BandShape::LowShelf,
            i if i == BAND_COUNT - 1 => BandShape::HighShelf,
            _ => BandShape::Peaking,
        }
    }
}

// ── EQ bands ────────────────────────────────────────────────

/// One EQ band. Frequency, Q and shape are fixed by the band index;
/// only the gain is mutable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqBand {
    frequency_hz: f64,
    gain_db: f64,
    q: f64,
    #[serde(default = "default_shape")]
    shape: BandShape,
}

fn default_shape() -> BandShape {
    BandShape::Peaking
}

impl EqBand {
    /// Band at `index` with 0 dB gain. Panics if `index >= BAND_COUNT`.
    pub fn at(index: usize) -> Self {
        Self {
            frequency_hz: BAND_FREQUENCIES[index],
            gain_db: 0.0,
            q: BAND_Q[index],
            shape: BandShape::for_index(index),
        }
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn shape(&self) -> BandShape {
        self.shape
    }

    /// Set the gain, clamped to ±12 dB. Returns the applied value.
    pub fn set_gain(&mut self, gain_db: f64) -> f64 {
        self.gain_db = clamp_gain(gain_db);
        self.gain_db
    }
}

/// Clamp a gain to the band range. NaN maps to 0 dB.
pub fn clamp_gain(gain_db: f64) -> f64 {
    if gain_db.is_nan() {
        0.0
    } else {
        gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
    }
}

/// Exactly seven bands in ascending frequency order.
///
/// Serialized as a plain array; deserialization only keeps the gains and
/// rebuilds frequency/Q from the fixed layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<EqBand>", try_from = "Vec<EqBand>")]
pub struct EqBands([EqBand; BAND_COUNT]);

impl EqBands {
    /// All bands flat.
    pub fn flat() -> Self {
        Self(std::array::from_fn(EqBand::at))
    }

    pub fn from_gains(gains: [f64; BAND_COUNT]) -> Self {
        let mut bands = Self::flat();
        for (band, gain) in bands.0.iter_mut().zip(gains) {
            band.set_gain(gain);
        }
        bands
    }

    pub fn gains(&self) -> [f64; BAND_COUNT] {
        std::array::from_fn(|i| self.0[i].gain_db)
    }

    pub fn get(&self, index: usize) -> Option<&EqBand> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EqBand> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        BAND_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut EqBand> {
        self.0.get_mut(index)
    }
}

impl Default for EqBands {
    fn default() -> Self {
        Self::flat()
    }
}

impl From<EqBands> for Vec<EqBand> {
    fn from(bands: EqBands) -> Self {
        bands.0.to_vec()
    }
}

impl TryFrom<Vec<EqBand>> for EqBands {
    type Error = String;

    fn try_from(bands: Vec<EqBand>) -> Result<Self, Self::Error> {
        if bands.len() != BAND_COUNT {
            return Err(format!("expected {BAND_COUNT} bands, got {}", bands.len()));
        }
        Ok(Self::from_gains(std::array::from_fn(|i| bands[i].gain_db)))
    }
}

// ── Compressor ──────────────────────────────────────────────

/// User-adjustable compressor settings. Fields are independent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressorSettings {
    /// Threshold in dB, [-60, 0].
    pub threshold_db: f64,
    /// Ratio, [1, 20].
    pub ratio: f64,
    /// Attack in seconds, [0, 1].
    pub attack_sec: f64,
    /// Release in seconds, [0, 1].
    pub release_sec: f64,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            ratio: 4.0,
            attack_sec: 0.003,
            release_sec: 0.25,
        }
    }
}

impl CompressorSettings {
    /// Settings that leave the signal untouched.
    pub fn transparent() -> Self {
        Self {
            threshold_db: 0.0,
            ratio: 1.0,
            ..Self::default()
        }
    }

    /// Copy with every field clamped into range.
    pub fn clamped(self) -> Self {
        let mut out = self;
        for param in CompressorParam::ALL {
            let value = param.read(&self);
            param.write(&mut out, value);
        }
        out
    }
}

/// Named compressor parameter, parsed from the UI control names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressorParam {
    Threshold,
    Ratio,
    Attack,
    Release,
}

impl CompressorParam {
    pub const ALL: [CompressorParam; 4] = [
        CompressorParam::Threshold,
        CompressorParam::Ratio,
        CompressorParam::Attack,
        CompressorParam::Release,
    ];

    pub fn range(self) -> (f64, f64) {
        match self {
            CompressorParam::Threshold => (-60.0, 0.0),
            CompressorParam::Ratio => (1.0, 20.0),
            CompressorParam::Attack | CompressorParam::Release => (0.0, 1.0),
        }
    }

    pub fn clamp(self, value: f64) -> f64 {
        let (lo, hi) = self.range();
        if value.is_nan() { lo } else { value.clamp(lo, hi) }
    }

    pub fn read(self, settings: &CompressorSettings) -> f64 {
        match self {
            CompressorParam::Threshold => settings.threshold_db,
            CompressorParam::Ratio => settings.ratio,
            CompressorParam::Attack => settings.attack_sec,
            CompressorParam::Release => settings.release_sec,
        }
    }

    /// Write a clamped value. Returns the applied value.
    pub fn write(self, settings: &mut CompressorSettings, value: f64) -> f64 {
        let value = self.clamp(value);
        match self {
            CompressorParam::Threshold => settings.threshold_db = value,
            CompressorParam::Ratio => settings.ratio = value,
            CompressorParam::Attack => settings.attack_sec = value,
            CompressorParam::Release => settings.release_sec = value,
        }
        value
    }
}

impl FromStr for CompressorParam {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "threshold" | "thresholdDb" => Ok(CompressorParam::Threshold),
            "ratio" => Ok(CompressorParam::Ratio),
            "attack" | "attackSec" => Ok(CompressorParam::Attack),
            "release" | "releaseSec" => Ok(CompressorParam::Release),
            other => Err(EngineError::UnknownParameter(other.to_string())),
        }
    }
}

impl fmt::Display for CompressorParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressorParam::Threshold => "threshold",
            CompressorParam::Ratio => "ratio",
            CompressorParam::Attack => "attack",
            CompressorParam::Release => "release",
        };
        f.write_str(name)
    }
}

// ── Store ───────────────────────────────────────────────────

/// A value that must be pushed into a live graph after a store mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    BandGain { index: usize, gain_db: f64 },
    Compressor(CompressorSettings),
}

/// Mutable EQ + compressor settings shared by the live and offline paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    bands: EqBands,
    compressor: CompressorSettings,
}

impl ParameterStore {
    pub fn new(bands: EqBands, compressor: CompressorSettings) -> Self {
        Self {
            bands,
            compressor: compressor.clamped(),
        }
    }

    pub fn bands(&self) -> &EqBands {
        &self.bands
    }

    pub fn compressor(&self) -> &CompressorSettings {
        &self.compressor
    }

    /// Set one band's gain. An index outside 0..7 is ignored.
    pub fn set_band_gain(&mut self, index: usize, gain_db: f64) -> Option<ParamChange> {
        let Some(band) = self.bands.get_mut(index) else {
            log::warn!("set_band_gain: band index {index} out of range");
            return None;
        };
        let gain_db = band.set_gain(gain_db);
        Some(ParamChange::BandGain { index, gain_db })
    }

    pub fn set_compressor_param(&mut self, param: CompressorParam, value: f64) -> ParamChange {
        param.write(&mut self.compressor, value);
        ParamChange::Compressor(self.compressor)
    }

    pub fn set_compressor(&mut self, settings: CompressorSettings) -> ParamChange {
        self.compressor = settings.clamped();
        ParamChange::Compressor(self.compressor)
    }

    /// Overwrite all seven gains, in band order.
    pub fn apply_preset(&mut self, gains: [f64; BAND_COUNT]) -> Vec<ParamChange> {
        gains
            .iter()
            .enumerate()
            .filter_map(|(i, &g)| self.set_band_gain(i, g))
            .collect()
    }

    /// Replace the whole store (project load).
    pub fn replace(&mut self, bands: EqBands, compressor: CompressorSettings) {
        self.bands = bands;
        self.compressor = compressor.clamped();
    }
}
