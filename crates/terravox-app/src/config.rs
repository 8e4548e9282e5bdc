use std::path::Path;

use serde::{Deserialize, Serialize};
use terravox_render::{LightingSettings, VoxelParams};
use terravox_terrain::presets::find_preset;
use terravox_terrain::{builtin_presets, ConfigError, ErosionSettings, NoiseSettings, TerrainSettings};

const DEFAULT_CONFIG: &str = include_str!("../../../data/config/default.ron");

/// Start-up configuration of the application context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    /// Named noise preset applied over `noise` when set.
    pub noise_preset: Option<String>,
    pub noise: NoiseSettings,
    pub terrain: TerrainSettings,
    pub erosion: ErosionSettings,
    pub voxels: VoxelParams,
    pub lighting: LightingSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            noise_preset: None,
            noise: NoiseSettings::default(),
            terrain: TerrainSettings::default(),
            erosion: ErosionSettings::default(),
            voxels: VoxelParams::default(),
            lighting: LightingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Noise settings after applying `noise_preset`. An unknown preset name
    /// is logged and ignored.
    pub fn resolved_noise(&self) -> Result<NoiseSettings, ConfigError> {
        let Some(name) = &self.noise_preset else {
            return Ok(self.noise);
        };
        let presets = builtin_presets()?;
        match find_preset(&presets, name) {
            Some(preset) => Ok(preset.settings),
            None => {
                log::warn!("Unknown noise preset '{name}', using configured noise settings");
                Ok(self.noise)
            }
        }
    }
}

/// Parse an `AppConfig` from RON.
pub fn load_config_from_str(ron_str: &str) -> Result<AppConfig, ConfigError> {
    ron::Options::default()
        .from_str(ron_str)
        .map_err(|e| ConfigError::ConfigParseError(e.to_string()))
}

/// Read and parse an `AppConfig` from a RON file.
pub fn load_config_from_path(path: &Path) -> Result<AppConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigReadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_config_from_str(&text)
}

/// The configuration shipped in `data/config/default.ron`.
pub fn default_config() -> Result<AppConfig, ConfigError> {
    load_config_from_str(DEFAULT_CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = default_config().expect("default.ron parses");
        assert_eq!(config.erosion, ErosionSettings::default());
        assert_eq!(config.terrain, TerrainSettings::default());
        assert_eq!(config.voxels, VoxelParams::default());
        assert_eq!(config.lighting, LightingSettings::default());
        assert_eq!(config.noise_preset.as_deref(), Some("Test Settings 1"));
    }

    #[test]
    fn test_partial_config() {
        let config = load_config_from_str("(voxels: (resolution: 128, center: (0.0, 2.0, 0.0)))")
            .expect("parse");
        assert_eq!(config.voxels.resolution, 128);
        assert_eq!(config.voxels.center, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(config.voxels.world_size, VoxelParams::default().world_size);
        assert_eq!(config.width, 1280);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = load_config_from_str("(width: \"wide\")").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config_from_path(Path::new("no/such/terravox.ron")).unwrap_err();
        match err {
            ConfigError::ConfigReadError { path, .. } => assert!(path.ends_with("terravox.ron")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_loads_shipped_file_from_path() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/config/default.ron");
        let config = load_config_from_path(&path).expect("load");
        assert_eq!(config, default_config().expect("default"));
    }

    #[test]
    fn test_preset_overrides_noise() {
        let config = AppConfig {
            noise_preset: Some("cellular hills".to_string()),
            ..Default::default()
        };
        let presets = builtin_presets().expect("presets");
        let expected = find_preset(&presets, "Cellular Hills").expect("preset").settings;
        assert_eq!(config.resolved_noise().expect("resolve"), expected);
    }

    #[test]
    fn test_unknown_preset_falls_back() {
        let config = AppConfig {
            noise_preset: Some("No Such Preset".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolved_noise().expect("resolve"), NoiseSettings::default());
    }
}
