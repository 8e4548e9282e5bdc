//! CPU-side terrain: heightfield storage, particle erosion and noise
//! generation. Nothing here touches the GPU.

pub mod erosion;
pub mod error;
pub mod heightfield;
pub mod noise_field;
pub mod presets;
pub mod terrain;

pub use erosion::{ErosionSettings, HydraulicErosion, SessionState};
pub use error::{ConfigError, TerrainError};
pub use heightfield::Heightfield;
pub use noise_field::{NoiseField, NoiseSettings};
pub use presets::{builtin_presets, NoisePreset};
pub use terrain::{Terrain, TerrainSettings};
