//! Engine configuration, loadable from JSON. Every field has a default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dsp::analyser::AnalyserConfig;
use crate::dsp::compressor::DEFAULT_KNEE_DB;
use crate::error::EngineResult;
use crate::meter::MeterConfig;
use crate::playback::GraphOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Analysis transform size (bins = half).
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Meter frame period (~60 fps).
    pub frame_interval_ms: u64,
    /// Quiet period before a settings save is sent.
    pub persist_debounce_ms: u64,
    pub compressor_knee_db: f64,
    pub meter: MeterConfig,
    /// Export file stem when the project has no name.
    pub export_fallback_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            frame_interval_ms: 16,
            persist_debounce_ms: 500,
            compressor_knee_db: DEFAULT_KNEE_DB,
            meter: MeterConfig::default(),
            export_fallback_name: "processed-track".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn analyser(&self) -> AnalyserConfig {
        AnalyserConfig {
            fft_size: self.fft_size,
            smoothing: self.smoothing_time_constant,
            min_decibels: self.min_decibels,
            max_decibels: self.max_decibels,
        }
    }

    pub fn graph_options(&self) -> GraphOptions {
        GraphOptions {
            knee_db: self.compressor_knee_db,
            analyser: self.analyser(),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}
