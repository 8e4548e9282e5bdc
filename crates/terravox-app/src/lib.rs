//! Application context tying the terrain, voxelizer and deferred lighting
//! together, plus RON configuration and headless GPU start-up.

pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod gpu;
pub mod terrain_mesh;

pub use camera::Camera;
pub use config::{default_config, load_config_from_path, load_config_from_str, AppConfig};
pub use context::{AppContext, FrameReport, OUTPUT_FORMAT};
pub use error::AppError;
pub use gpu::{create_validated, init_headless, GpuContext};
pub use terrain_mesh::TerrainDrawable;
