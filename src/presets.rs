use crate::config::{Configuration, Dimensions, VideoSystem};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static BAKED_IN: Lazy<PresetManager> = Lazy::new(PresetManager::new);

// =============================================================================
// DECODER PRESETS
// =============================================================================

/// Named starting points for common capture types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    #[serde(rename = "NTSC 1D")]
    NtscComb1D,
    #[serde(rename = "NTSC 2D")]
    NtscComb2D,
    #[serde(rename = "NTSC 3D")]
    NtscComb3D,
    #[serde(rename = "PAL Transform")]
    PalTransform,
}

impl Preset {
    pub fn all_presets() -> [Preset; 4] {
        [
            Preset::NtscComb1D,
            Preset::NtscComb2D,
            Preset::NtscComb3D,
            Preset::PalTransform,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::NtscComb1D => "NTSC 1D",
            Preset::NtscComb2D => "NTSC 2D",
            Preset::NtscComb3D => "NTSC 3D",
            Preset::PalTransform => "PAL Transform",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::NtscComb1D => "Single-line bandpass; fastest, heavy cross-colour",
            Preset::NtscComb2D => "Adaptive line comb; good default for moving material",
            Preset::NtscComb3D => "Motion-adaptive frame comb; best on still or slow scenes",
            Preset::PalTransform => "Tiled frequency-domain separator for PAL",
        }
    }

    /// Case-insensitive lookup by display name.
    pub fn from_name(name: &str) -> Option<Preset> {
        Self::all_presets()
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Values used when the baked-in table has no entry for this preset.
    fn builtin_values(&self) -> PresetValues {
        match self {
            Preset::NtscComb1D => PresetValues {
                system: VideoSystem::Ntsc,
                dimensions: Dimensions::One,
                adaptive: false,
                luma_nr: 0.0,
                chroma_nr: 0.0,
                colour_lpf: true,
                colour_lpf_hq: false,
                transform_threshold: None,
            },
            Preset::NtscComb2D => PresetValues {
                system: VideoSystem::Ntsc,
                dimensions: Dimensions::Two,
                adaptive: true,
                luma_nr: 1.0,
                chroma_nr: 0.0,
                colour_lpf: true,
                colour_lpf_hq: false,
                transform_threshold: None,
            },
            Preset::NtscComb3D => PresetValues {
                system: VideoSystem::Ntsc,
                dimensions: Dimensions::Three,
                adaptive: true,
                luma_nr: 1.0,
                chroma_nr: 0.0,
                colour_lpf: true,
                colour_lpf_hq: true,
                transform_threshold: None,
            },
            Preset::PalTransform => PresetValues {
                system: VideoSystem::Pal,
                dimensions: Dimensions::Two,
                adaptive: false,
                luma_nr: 0.0,
                chroma_nr: 0.0,
                colour_lpf: false,
                colour_lpf_hq: false,
                transform_threshold: Some(0.4),
            },
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Preset::NtscComb2D
    }
}

/// The per-preset overrides applied on top of the system defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetValues {
    pub system: VideoSystem,
    pub dimensions: Dimensions,
    pub adaptive: bool,
    pub luma_nr: f32,
    pub chroma_nr: f32,
    pub colour_lpf: bool,
    pub colour_lpf_hq: bool,
    #[serde(default)]
    pub transform_threshold: Option<f32>,
}

impl PresetValues {
    pub fn to_configuration(&self) -> Configuration {
        let mut config = match self.system {
            VideoSystem::Ntsc => Configuration::ntsc(),
            VideoSystem::Pal => Configuration::pal(),
        };
        config.dimensions = self.dimensions;
        config.adaptive = self.adaptive;
        config.luma_nr = self.luma_nr;
        config.chroma_nr = self.chroma_nr;
        config.colour_lpf = self.colour_lpf;
        config.colour_lpf_hq = self.colour_lpf_hq;
        if let Some(threshold) = self.transform_threshold {
            config.transform_threshold = threshold;
        }
        config
    }
}

#[derive(Debug)]
pub struct PresetManager {
    presets: HashMap<String, PresetValues>,
}

impl PresetManager {
    /// Load presets from baked-in JSON. This is fallible but non-fatal.
    /// Returns the built-in table if parsing fails.
    pub fn new() -> Self {
        Self::from_json(include_str!("../presets.json"))
    }

    /// Process-wide table parsed from the baked-in JSON on first use.
    pub fn shared() -> &'static PresetManager {
        &BAKED_IN
    }

    pub fn from_json(text: &str) -> Self {
        match serde_json::from_str::<HashMap<String, PresetValues>>(text) {
            Ok(presets) => Self { presets },
            Err(e) => {
                log::warn!("preset table unreadable ({e}), using built-in presets");
                Self::default()
            }
        }
    }

    pub fn get_preset_values(&self, preset_name: &str) -> Option<&PresetValues> {
        self.presets.get(preset_name)
    }

    pub fn configuration(&self, preset: Preset) -> Configuration {
        self.get_preset_values(preset.name())
            .copied()
            .unwrap_or_else(|| preset.builtin_values())
            .to_configuration()
    }
}

impl Default for PresetManager {
    fn default() -> Self {
        let presets = Preset::all_presets()
            .into_iter()
            .map(|p| (p.name().to_string(), p.builtin_values()))
            .collect();
        Self { presets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baked_in_presets_parse() {
        let manager = PresetManager::new();
        for preset in Preset::all_presets() {
            let values = manager.get_preset_values(preset.name());
            assert!(values.is_some(), "missing preset {}", preset.name());
            assert_eq!(*values.unwrap(), preset.builtin_values());
            assert!(manager.configuration(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_malformed_table_falls_back() {
        let manager = PresetManager::from_json("{ not json");
        let config = manager.configuration(Preset::NtscComb3D);
        assert_eq!(config.dimensions, Dimensions::Three);
        assert_eq!(config.system, VideoSystem::Ntsc);
    }

    #[test]
    fn test_pal_preset_uses_pal_raster() {
        let config = PresetManager::new().configuration(Preset::PalTransform);
        assert_eq!(config.field_width, 1135);
        assert_eq!(config.frame_height(), 625);
    }

    #[test]
    fn test_shared_table_is_parsed_once() {
        let a = PresetManager::shared() as *const PresetManager;
        let b = PresetManager::shared() as *const PresetManager;
        assert_eq!(a, b);
        assert!(PresetManager::shared().get_preset_values("NTSC 3D").is_some());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Preset::from_name("ntsc 3d"), Some(Preset::NtscComb3D));
        assert_eq!(Preset::from_name("SECAM"), None);
    }
}
