use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::noise_field::NoiseSettings;

const BUILTIN_PRESETS: &str = include_str!("../../../data/presets/noise.ron");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePreset {
    pub name: String,
    pub settings: NoiseSettings,
}

/// Parse a RON list of named noise presets.
pub fn load_presets_from_str(ron_str: &str) -> Result<Vec<NoisePreset>, ConfigError> {
    let options = ron::Options::default();
    options
        .from_str(ron_str)
        .map_err(|e| ConfigError::PresetParseError(e.to_string()))
}

/// Presets shipped with the crate.
pub fn builtin_presets() -> Result<Vec<NoisePreset>, ConfigError> {
    load_presets_from_str(BUILTIN_PRESETS)
}

pub fn find_preset<'a>(presets: &'a [NoisePreset], name: &str) -> Option<&'a NoisePreset> {
    presets.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise_field::{CellularDistance, CellularReturn, FractalType, NoiseType};

    #[test]
    fn test_builtin_presets_parse() {
        let presets = builtin_presets().expect("builtin presets parse");
        let names: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Test Settings 1",
                "Cellular Hills",
                "Flat Hills",
                "Lots O Circles (Domain Warp)",
                "Funny Ridges",
                "Big Circle (Domain Warp)",
            ]
        );
    }

    #[test]
    fn test_preset_values() {
        let presets = builtin_presets().expect("builtin presets parse");

        let hills = find_preset(&presets, "cellular hills").expect("present");
        assert_eq!(hills.settings.noise_type, NoiseType::Cellular);
        assert_eq!(hills.settings.cellular_distance, CellularDistance::Manhattan);
        assert_eq!(hills.settings.cellular_return, CellularReturn::CellValue);
        assert_eq!(hills.settings.fractal_type, FractalType::None);

        let circle = find_preset(&presets, "Big Circle (Domain Warp)").expect("present");
        assert_eq!(circle.settings.seed, 1348);
        assert!(circle.settings.use_domain_warp);
        assert_eq!(circle.settings.domain_warp_amp, 2000.0);
    }

    #[test]
    fn test_bad_preset_ron() {
        let err = load_presets_from_str("[ (name: 3) ]").unwrap_err();
        assert!(matches!(err, ConfigError::PresetParseError(_)));
    }

    #[test]
    fn test_missing_preset() {
        let presets = builtin_presets().expect("builtin presets parse");
        assert!(find_preset(&presets, "Volcano").is_none());
    }
}
