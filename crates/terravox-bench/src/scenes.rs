use terravox_terrain::{ErosionSettings, NoiseSettings};

/// What a scenario times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    /// One blocking `simulate` call per sample.
    ErosionBatch,
    /// A full incremental session stepped to completion per sample.
    ErosionIncremental,
    /// One re-voxelizing frame of the terrain scene per sample. Needs a GPU.
    Voxelize,
}

/// Configuration for a single benchmark scenario.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    pub name: String,
    pub kind: ScenarioKind,
    /// Heightfield edge length.
    pub grid_size: usize,
    /// Droplets per erosion run, or the voxel resolution for `Voxelize`.
    pub work_units: u32,
    pub erosion: ErosionSettings,
    pub noise: NoiseSettings,
}

/// The standard suite: erosion at the requested size, both modes, then
/// voxelization at two resolutions.
pub fn standard_scenarios(grid_size: usize, droplets: u32) -> Vec<ScenarioConfig> {
    let erosion = ErosionSettings {
        iterations: droplets,
        ..Default::default()
    };
    let noise = NoiseSettings::default();
    let scenario = |name: String, kind, work_units| ScenarioConfig {
        name,
        kind,
        grid_size,
        work_units,
        erosion,
        noise,
    };

    vec![
        scenario(
            format!("erosion-batch-{grid_size}"),
            ScenarioKind::ErosionBatch,
            droplets,
        ),
        scenario(
            format!("erosion-incremental-{grid_size}"),
            ScenarioKind::ErosionIncremental,
            droplets,
        ),
        scenario("voxelize-128".to_string(), ScenarioKind::Voxelize, 128),
        scenario("voxelize-256".to_string(), ScenarioKind::Voxelize, 256),
    ]
}
