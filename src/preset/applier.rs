//! Preset applier: turns a preset name into a full parameter-store write.

use crate::params::{ParamChange, ParameterStore};

use super::table::PRESETS;
use super::types::EqPreset;

/// Looks presets up by name in a read-only table.
#[derive(Debug, Clone, Copy)]
pub struct PresetApplier {
    table: &'static [EqPreset],
}

impl Default for PresetApplier {
    fn default() -> Self {
        Self { table: PRESETS }
    }
}

impl PresetApplier {
    pub fn new(table: &'static [EqPreset]) -> Self {
        Self { table }
    }

    pub fn presets(&self) -> &'static [EqPreset] {
        self.table
    }

    /// Find a preset by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<&'static EqPreset> {
        self.table.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Write a preset into the store: each band in order, then the
    /// compressor snapshot if the preset carries one. Unknown names are a
    /// no-op and return `None`.
    pub fn apply(
        &self,
        store: &mut ParameterStore,
        name: &str,
    ) -> Option<(&'static EqPreset, Vec<ParamChange>)> {
        let Some(preset) = self.find(name) else {
            log::debug!("preset '{name}' not found, ignoring");
            return None;
        };
        let mut changes = store.apply_preset(preset.gains);
        if let Some(compressor) = preset.compressor {
            changes.push(store.set_compressor(compressor));
        }
        Some((preset, changes))
    }
}
