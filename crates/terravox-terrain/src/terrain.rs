use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use terravox_core::constants::{
    DEFAULT_HEIGHTFIELD_SIZE, DEFAULT_TERRAIN_SCALE, DEFAULT_TERRAIN_SUBDIVISIONS,
};

use crate::erosion::{ErosionSettings, HydraulicErosion, SessionState};
use crate::error::TerrainError;
use crate::heightfield::Heightfield;
use crate::noise_field::{NoiseField, NoiseSettings};

/// Seed of the real-time erosion session.
const REALTIME_EROSION_SEED: u64 = 1337;

/// Shape and shading parameters of the terrain plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    /// Heightfield edge length in cells.
    pub size: usize,
    /// Plane subdivisions of the terrain mesh.
    pub subdivisions: u32,
    pub max_height: f32,
    pub min_height: f32,
    pub amplitude: f32,
    pub sea_level: f32,
    /// Scale of the unit plane; the plane is centered on the origin in XZ.
    pub model_scale: Vec3,
    /// Slope (0-1) above which the surface is shaded as rock.
    pub min_rock_slope: f32,
    /// Slope (0-1) below which the surface is shaded as grass.
    pub max_grass_slope: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_HEIGHTFIELD_SIZE,
            subdivisions: DEFAULT_TERRAIN_SUBDIVISIONS,
            max_height: 1.0,
            min_height: 0.0,
            amplitude: 1.0,
            sea_level: 0.0,
            model_scale: Vec3::new(
                DEFAULT_TERRAIN_SCALE,
                DEFAULT_TERRAIN_SCALE / 2.0,
                DEFAULT_TERRAIN_SCALE,
            ),
            min_rock_slope: 0.95,
            max_grass_slope: 1.0,
        }
    }
}

/// Terrain heights plus the batch and real-time erosion controls around them.
///
/// The `NoiseField` holds the displayed heights. Real-time erosion runs on a
/// separate session and copies its partial result back after every step, so
/// the displayed heights are always a consistent snapshot.
pub struct Terrain {
    settings: TerrainSettings,
    noise: NoiseField,
    erosion: HydraulicErosion,
    running: bool,
}

impl Terrain {
    pub fn new(
        settings: TerrainSettings,
        noise_settings: NoiseSettings,
        erosion_settings: ErosionSettings,
    ) -> Result<Self, TerrainError> {
        let mut noise = NoiseField::new(settings.size, settings.size, noise_settings)?;
        noise.erosion_mut().set_settings(erosion_settings);
        let erosion = HydraulicErosion::new(settings.size, settings.size, REALTIME_EROSION_SEED)?
            .with_settings(erosion_settings);
        Ok(Self {
            settings,
            noise,
            erosion,
            running: false,
        })
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn noise_mut(&mut self) -> &mut NoiseField {
        &mut self.noise
    }

    pub fn erosion(&self) -> &HydraulicErosion {
        &self.erosion
    }

    /// Applies to both batch and real-time erosion.
    pub fn set_erosion_settings(&mut self, settings: ErosionSettings) {
        self.erosion.set_settings(settings);
        self.noise.erosion_mut().set_settings(settings);
    }

    pub fn heightfield(&self) -> &Heightfield {
        self.noise.heightfield()
    }

    pub fn is_eroding(&self) -> bool {
        self.running
    }

    /// Resize the heightfield. Any running erosion is aborted.
    pub fn resize(&mut self, size: usize) -> Result<(), TerrainError> {
        self.abort_erosion();
        self.noise.resize(size, size)?;
        self.erosion.set_simulation_dims(size, size)?;
        self.settings.size = size;
        Ok(())
    }

    /// Batch-erode the current heights on a fresh session and keep the result.
    /// Stacks: each call erodes the previous output further.
    pub fn apply_erosion(&mut self) -> Result<(), TerrainError> {
        self.abort_erosion();
        let field = self.noise.heightfield();
        self.erosion
            .new_simulation(field.values(), field.width(), field.height())?;
        self.erosion.simulate(None);
        self.erosion.reset_session();
        self.noise.set_heights(self.erosion.get_heightmap())
    }

    /// Fresh noise followed by one batch erosion.
    pub fn regenerate_and_erode(&mut self) -> Result<(), TerrainError> {
        self.abort_erosion();
        self.noise.regenerate(true)
    }

    /// Begin eroding the current heights a frame at a time.
    pub fn start_realtime_erosion(&mut self) -> Result<(), TerrainError> {
        let field = self.noise.heightfield();
        self.erosion
            .new_simulation(field.values(), field.width(), field.height())?;
        self.running = true;
        log::info!(
            "Real-time erosion started: {} droplets, {} per frame",
            self.erosion.target_iterations(),
            self.erosion.settings().particles_per_frame
        );
        Ok(())
    }

    /// Stop real-time erosion. Heights keep the last completed step.
    pub fn abort_erosion(&mut self) {
        if self.running {
            log::info!(
                "Real-time erosion aborted at {}",
                self.progress_text().unwrap_or_default()
            );
        }
        self.running = false;
        self.erosion.reset_session();
    }

    /// Per-frame tick. Returns whether the heights changed.
    pub fn update(&mut self) -> Result<bool, TerrainError> {
        if !self.running {
            return Ok(false);
        }

        let state = self.erosion.step_simulation();
        self.noise.set_heights(self.erosion.get_heightmap())?;

        if state != SessionState::Active {
            self.running = false;
            log::info!(
                "Real-time erosion complete after {} droplets",
                self.erosion.iterations_ran()
            );
        }
        Ok(true)
    }

    /// Progress line for display while real-time erosion runs.
    pub fn progress_text(&self) -> Option<String> {
        self.running.then(|| {
            format!(
                "iteration {} / {}",
                self.erosion.iterations_ran(),
                self.erosion.target_iterations()
            )
        })
    }

    /// Model matrix of the unit terrain plane: scaled, then centered in XZ.
    pub fn model_transform(&self) -> Mat4 {
        let scale = self.settings.model_scale;
        Mat4::from_translation(Vec3::new(-scale.x * 0.5, 0.0, -scale.z * 0.5))
            * Mat4::from_scale(scale)
    }
}
