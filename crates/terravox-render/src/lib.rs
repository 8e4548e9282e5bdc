//! Voxelization, the GPU backend seam and the deferred lighting stage.

pub mod backend;
pub mod draw_list;
pub mod error;
pub mod gbuffer;
pub mod height_texture;
pub mod lighting;
pub mod uniforms;
pub mod voxelizer;
pub mod wgpu_backend;

#[cfg(test)]
mod test_harness;

pub use backend::{GpuBackend, RasterState, SliceParams, UniformValue, Viewport, VoxelChannel};
pub use draw_list::{DrawItem, DrawList};
pub use error::RenderError;
pub use gbuffer::GBuffer;
pub use height_texture::HeightTexture;
pub use lighting::{LightingSettings, LightingStage, LightingUniforms};
pub use uniforms::ProgramUniforms;
pub use voxelizer::{VoxelParams, VoxelVolumes, VoxelizeReport, Voxelizer};
pub use wgpu_backend::WgpuBackend;
