pub mod config;
pub mod dsp;
pub mod error;
pub mod meter;
pub mod params;
pub mod playback;
pub mod preset;
pub mod project;
#[cfg(feature = "live")]
pub mod session;

use serde::Deserialize;
use wasm_bindgen::prelude::*;

use crate::error::EngineResult;
use crate::params::{CompressorSettings, EqBands};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parameters for a one-shot export, as sent from JS.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportSettings {
    pub bands: EqBands,
    pub compressor: CompressorSettings,
    /// Defaults to the engine's knee.
    pub knee_db: Option<f64>,
}

impl ExportSettings {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Decode `source`, run it through the chain described by `settings`, and
/// return WAV bytes.
pub fn export_wav(source: &[u8], settings: &ExportSettings) -> EngineResult<Vec<u8>> {
    let knee = settings
        .knee_db
        .unwrap_or(dsp::compressor::DEFAULT_KNEE_DB);
    Ok(dsp::renderer::render_source_wav(
        source,
        &settings.bands,
        &settings.compressor,
        knee,
    )?)
}

/// WASM-exposed: return the eqchain-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: render encoded source audio through the EQ chain to WAV.
/// `settings_json` is an [`ExportSettings`] object; missing fields are flat.
#[wasm_bindgen]
pub fn render_export_wav(source: &[u8], settings_json: &str) -> Result<Vec<u8>, JsValue> {
    let settings =
        ExportSettings::from_json(settings_json).map_err(|e| JsValue::from_str(&format!("{e}")))?;
    export_wav(source, &settings).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: names of the built-in presets, in picker order.
#[wasm_bindgen]
pub fn preset_names() -> Result<JsValue, JsValue> {
    let names: Vec<&str> = preset::PRESETS.iter().map(|p| p.name).collect();
    serde_wasm_bindgen::to_value(&names).map_err(|e| JsValue::from_str(&format!("{e}")))
}
