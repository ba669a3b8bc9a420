//! Preset types. Presets are read-only data; the engine never mutates them.

use serde::Serialize;

use crate::params::{BAND_COUNT, CompressorSettings};

/// Preset categories, for grouping in pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    Utility,
    Genre,
    Voice,
    Tone,
}

/// A named EQ curve with an optional compressor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EqPreset {
    /// Display name, also the lookup key (e.g., "Bass Boost").
    pub name: &'static str,
    pub category: PresetCategory,
    /// Gain per band in dB, band order.
    pub gains: [f64; BAND_COUNT],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressor: Option<CompressorSettings>,
}
