//! Particle-based hydraulic erosion.
//!
//! Droplets spawn at random positions, follow the terrain gradient and carve
//! or deposit sediment as they go. A run is either a blocking batch
//! (`simulate`) or an incremental session advanced once per frame
//! (`new_simulation` then `step_simulation`). Both drive the same
//! single-droplet routine.

mod droplet;
mod settings;

pub use droplet::{deposit_bilinear, erode_disc, Droplet};
pub use settings::ErosionSettings;

use glam::Vec2;
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

use crate::error::TerrainError;
use crate::heightfield::Heightfield;

/// Lifecycle of the incremental session. Batch runs never change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Complete,
}

/// Erosion engine owning its working heightfield and RNG stream.
pub struct HydraulicErosion {
    field: Heightfield,
    settings: ErosionSettings,
    rng: ChaCha8Rng,
    unit: Uniform<f32>,
    angle: Uniform<f32>,
    droplet: Droplet,
    iterations_ran: u32,
    state: SessionState,
    seed: u64,
}

impl HydraulicErosion {
    pub fn new(width: usize, height: usize, seed: u64) -> Result<Self, TerrainError> {
        let settings = ErosionSettings::default();
        let field = Heightfield::new(width, height)?;
        Ok(Self {
            field,
            droplet: Droplet::spawn(Vec2::ZERO, &settings),
            settings,
            rng: ChaCha8Rng::seed_from_u64(seed),
            unit: Uniform::new(0.0, 1.0),
            angle: Uniform::new(0.0, TAU),
            iterations_ran: 0,
            state: SessionState::Uninitialized,
            seed,
        })
    }

    pub fn with_settings(mut self, settings: ErosionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ErosionSettings {
        &self.settings
    }

    /// Takes effect from the next spawned droplet.
    pub fn set_settings(&mut self, settings: ErosionSettings) {
        self.settings = settings;
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the RNG stream. Two engines with the same seed, settings and
    /// input heights produce identical output.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Replace the working heightfield with a zero grid of the new size.
    pub fn set_simulation_dims(&mut self, width: usize, height: usize) -> Result<(), TerrainError> {
        self.field = Heightfield::new(width, height)?;
        Ok(())
    }

    /// Overwrite the working heights. Nothing is written on a size mismatch.
    pub fn set_heightmap(&mut self, values: &[f32]) -> Result<(), TerrainError> {
        self.field.copy_from(values).inspect_err(|e| {
            log::warn!("Erosion heightmap rejected: {e}");
        })
    }

    pub fn get_heightmap(&self) -> &[f32] {
        self.field.values()
    }

    pub fn heightfield(&self) -> &Heightfield {
        &self.field
    }

    pub fn heightmap_u16(&self) -> Vec<u16> {
        self.field.to_u16_pixels()
    }

    pub fn iterations_ran(&self) -> u32 {
        self.iterations_ran
    }

    pub fn target_iterations(&self) -> u32 {
        self.settings.iterations
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fraction of the incremental target completed, in [0, 1].
    pub fn progress(&self) -> f32 {
        if self.settings.iterations == 0 {
            return 1.0;
        }
        (self.iterations_ran as f32 / self.settings.iterations as f32).min(1.0)
    }

    /// Run `iterations` droplets to completion, or `settings.iterations` when
    /// `None`. Blocks until done. The incremental session is left untouched.
    pub fn simulate(&mut self, iterations: Option<u32>) {
        let count = iterations.unwrap_or(self.settings.iterations);
        log::debug!(
            "Batch erosion: {count} droplets on {}x{}",
            self.field.width(),
            self.field.height()
        );
        let session_droplet = self.droplet;
        for _ in 0..count {
            self.run_droplet();
        }
        self.droplet = session_droplet;
    }

    /// Start an incremental session on a copy of `init_heights`.
    pub fn new_simulation(
        &mut self,
        init_heights: &[f32],
        width: usize,
        height: usize,
    ) -> Result<(), TerrainError> {
        let field = Heightfield::from_values(width, height, init_heights).inspect_err(|e| {
            log::warn!("Erosion session rejected: {e}");
        })?;
        self.field = field;
        self.iterations_ran = 0;
        self.droplet = self.spawn_droplet();
        self.state = SessionState::Active;
        Ok(())
    }

    /// Complete `particles_per_frame` more droplets of the active session.
    /// Returns the state after the step; no-op unless `Active`.
    pub fn step_simulation(&mut self) -> SessionState {
        if self.state != SessionState::Active {
            return self.state;
        }

        let target = self.settings.iterations;
        let budget = self.settings.particles_per_frame.max(1);
        let mut done = 0;
        while done < budget && self.iterations_ran < target {
            self.run_to_completion(self.droplet);
            self.iterations_ran += 1;
            done += 1;
            self.droplet = self.spawn_droplet();
        }

        if self.iterations_ran >= target {
            self.state = SessionState::Complete;
        }
        self.state
    }

    /// Drop the incremental session; heights stay as they are.
    pub fn reset_session(&mut self) {
        self.state = SessionState::Uninitialized;
        self.iterations_ran = 0;
    }

    fn spawn_droplet(&mut self) -> Droplet {
        let x = self.unit.sample(&mut self.rng) * (self.field.width() - 1) as f32;
        let y = self.unit.sample(&mut self.rng) * (self.field.height() - 1) as f32;
        Droplet::spawn(Vec2::new(x, y), &self.settings)
    }

    fn run_droplet(&mut self) {
        let droplet = self.spawn_droplet();
        self.run_to_completion(droplet);
    }

    fn run_to_completion(&mut self, mut droplet: Droplet) {
        while droplet.alive {
            droplet.step(&mut self.field, &self.settings, &mut self.rng, &self.angle);
        }
    }
}
