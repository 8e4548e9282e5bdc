use serde::{Deserialize, Serialize};

/// Tunables of the particle erosion model.
///
/// Read once per droplet, so changing them mid-session affects only droplets
/// spawned afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionSettings {
    /// Droplets per full run (batch default and incremental target).
    pub iterations: u32,
    /// Maximum micro-steps of a single droplet.
    pub max_lifetime: u32,
    /// Share of the previous direction kept each step, in [0, 1].
    pub inertia: f32,
    /// Sediment capacity coefficient.
    pub capacity: f32,
    /// Slope floor used by the capacity term so flat ground still carries.
    pub min_slope: f32,
    pub evaporate_speed: f32,
    pub deposit_speed: f32,
    pub erode_speed: f32,
    pub gravity: f32,
    pub start_velocity: f32,
    pub start_water: f32,
    /// Radius of the disc erosion brush, in cells.
    pub erosion_radius: u32,
    /// Droplets completed per incremental step.
    pub particles_per_frame: u32,
}

impl Default for ErosionSettings {
    fn default() -> Self {
        Self {
            iterations: 300_000,
            max_lifetime: 50,
            inertia: 0.3,
            capacity: 4.0,
            min_slope: 0.01,
            evaporate_speed: 0.01,
            deposit_speed: 0.3,
            erode_speed: 0.3,
            gravity: 9.81,
            start_velocity: 1.0,
            start_water: 1.0,
            erosion_radius: 3,
            particles_per_frame: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings: ErosionSettings =
            ron::Options::default().from_str("(iterations: 1000, erosion_radius: 2)").expect("parse");
        assert_eq!(settings.iterations, 1000);
        assert_eq!(settings.erosion_radius, 2);
        assert_eq!(settings.max_lifetime, 50);
        assert_eq!(settings.particles_per_frame, 5000);
    }
}
