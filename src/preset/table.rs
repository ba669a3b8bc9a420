//! Built-in preset table.

use crate::params::CompressorSettings;

use super::types::{EqPreset, PresetCategory};

/// Name of the neutral preset.
pub const FLAT: &str = "Flat";

// ── Bands: 20 Hz, 60 Hz, 250 Hz, 1 kHz, 3 kHz, 6 kHz, 12 kHz ──

pub static PRESETS: &[EqPreset] = &[
    EqPreset {
        name: FLAT,
        category: PresetCategory::Utility,
        gains: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        compressor: None,
    },
    EqPreset {
        name: "Bass Boost",
        category: PresetCategory::Tone,
        gains: [6.0, 5.0, 2.0, 0.0, 0.0, 0.0, 0.0],
        compressor: None,
    },
    EqPreset {
        name: "Treble Boost",
        category: PresetCategory::Tone,
        gains: [0.0, 0.0, 0.0, 0.0, 2.0, 4.0, 6.0],
        compressor: None,
    },
    EqPreset {
        name: "Loudness",
        category: PresetCategory::Tone,
        gains: [5.0, 4.0, 0.0, -1.0, 0.0, 3.0, 5.0],
        compressor: None,
    },
    EqPreset {
        name: "Vocal Presence",
        category: PresetCategory::Voice,
        gains: [-2.0, -1.0, 0.0, 2.0, 4.0, 3.0, 1.0],
        compressor: None,
    },
    EqPreset {
        name: "Podcast",
        category: PresetCategory::Voice,
        gains: [-6.0, -3.0, 0.0, 2.0, 3.0, 1.0, -1.0],
        compressor: Some(CompressorSettings {
            threshold_db: -24.0,
            ratio: 3.0,
            attack_sec: 0.005,
            release_sec: 0.25,
        }),
    },
    EqPreset {
        name: "Hip-Hop",
        category: PresetCategory::Genre,
        gains: [6.0, 5.0, 1.0, -1.0, 1.0, 2.0, 3.0],
        compressor: Some(CompressorSettings {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_sec: 0.01,
            release_sec: 0.15,
        }),
    },
    EqPreset {
        name: "Rock",
        category: PresetCategory::Genre,
        gains: [4.0, 3.0, -1.0, -2.0, 1.0, 3.0, 4.0],
        compressor: None,
    },
    EqPreset {
        name: "Electronic",
        category: PresetCategory::Genre,
        gains: [5.0, 4.0, 0.0, -2.0, 1.0, 3.0, 5.0],
        compressor: Some(CompressorSettings {
            threshold_db: -20.0,
            ratio: 5.0,
            attack_sec: 0.003,
            release_sec: 0.1,
        }),
    },
    EqPreset {
        name: "Acoustic",
        category: PresetCategory::Genre,
        gains: [2.0, 1.0, 1.0, 0.0, 1.0, 2.0, 2.0],
        compressor: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MAX_GAIN_DB, MIN_GAIN_DB};
    use std::collections::HashSet;

    #[test]
    fn flat_is_first_and_zero() {
        assert_eq!(PRESETS[0].name, FLAT);
        assert!(PRESETS[0].gains.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn names_unique_and_gains_in_range() {
        let mut names = HashSet::new();
        for p in PRESETS {
            assert!(names.insert(p.name.to_ascii_lowercase()), "duplicate preset {}", p.name);
            assert!(p.gains.iter().all(|g| (MIN_GAIN_DB..=MAX_GAIN_DB).contains(g)));
            if let Some(c) = p.compressor {
                assert_eq!(c, c.clamped(), "{} compressor out of range", p.name);
            }
        }
    }

    #[test]
    fn table_serializes_for_pickers() {
        let json = serde_json::to_value(PRESETS).unwrap();
        assert_eq!(json[0]["name"], "Flat");
        assert_eq!(json[0]["category"], "utility");
        assert!(json[0].get("compressor").is_none());
        assert_eq!(json[5]["compressor"]["ratio"], 3.0);
    }
}
