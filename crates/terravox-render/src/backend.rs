//! The GPU command/resource layer the voxelizer drives.
//!
//! `GpuBackend` is the seam between the voxelization algorithm and the
//! graphics API. `WgpuBackend` is the production implementation; tests use a
//! recording backend.

use glam::{Mat4, Vec3};
use terravox_core::{ProgramHandle, TextureHandle};

use crate::error::RenderError;

/// Request for one cubic attribute volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDescriptor {
    pub label: &'static str,
    /// Edge length of mip level 0.
    pub resolution: u32,
    pub mip_levels: u32,
}

/// Pixel rectangle targeted by rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn square(size: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }
}

/// Fixed-function toggles saved and restored around voxelization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    pub color_writes: bool,
    pub depth_test: bool,
    pub face_culling: bool,
}

impl RasterState {
    pub const DEFAULT: Self = Self {
        color_writes: true,
        depth_test: true,
        face_culling: true,
    };

    /// Geometry only feeds image stores: nothing is written to or tested
    /// against a framebuffer and back faces are kept.
    pub const VOXELIZE: Self = Self {
        color_writes: false,
        depth_test: false,
        face_culling: false,
    };
}

impl Default for RasterState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// A value for a named program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Mat4(Mat4),
    Vec3(Vec3),
    Float(f32),
    Int(i32),
}

/// Which prior writes must be visible to later commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBarrier {
    /// Image stores before texture fetches and image loads.
    ShaderImageAccess,
    All,
}

/// Attribute shown by the debug slice view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelChannel {
    Normal,
    Smoothness,
    Albedo,
    EmissiveFactor,
    EmissiveColor,
    Metallic,
}

impl VoxelChannel {
    pub const ALL: [VoxelChannel; 6] = [
        VoxelChannel::Normal,
        VoxelChannel::Smoothness,
        VoxelChannel::Albedo,
        VoxelChannel::EmissiveFactor,
        VoxelChannel::EmissiveColor,
        VoxelChannel::Metallic,
    ];

    /// Index of the packed volume holding this attribute.
    pub fn volume_index(self) -> usize {
        match self {
            VoxelChannel::Normal | VoxelChannel::Smoothness => 0,
            VoxelChannel::Albedo | VoxelChannel::EmissiveFactor => 1,
            VoxelChannel::EmissiveColor | VoxelChannel::Metallic => 2,
        }
    }

    /// Selector passed to the slice shader. Must match `debug_mode` in
    /// debug_slice.wgsl.
    pub fn debug_mode(self) -> u32 {
        match self {
            VoxelChannel::Normal => 0,
            VoxelChannel::Smoothness => 1,
            VoxelChannel::Albedo => 2,
            VoxelChannel::EmissiveFactor => 3,
            VoxelChannel::EmissiveColor => 4,
            VoxelChannel::Metallic => 5,
        }
    }
}

/// One flat slice of a volume for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceParams {
    /// Z index into mip level 0.
    pub slice: u32,
    pub channel: VoxelChannel,
    pub resolution: u32,
}

/// GPU command and resource primitives needed by the voxelizer.
///
/// Commands are issued in call order; a backend may batch them but must not
/// reorder them.
pub trait GpuBackend {
    /// Allocate a zeroed RGBA16F 3D texture with a full mip chain.
    fn allocate_volume(&mut self, desc: &VolumeDescriptor) -> Result<TextureHandle, RenderError>;

    /// Release a volume. Unknown handles are ignored.
    fn release_volume(&mut self, handle: TextureHandle);

    /// Zero mip level 0 of a volume.
    fn clear_volume(&mut self, handle: TextureHandle);

    fn viewport(&self) -> Viewport;
    fn set_viewport(&mut self, viewport: Viewport);

    fn raster_state(&self) -> RasterState;
    fn set_raster_state(&mut self, state: RasterState);

    /// Bind mip level 0 of a volume to an image unit for shader access.
    fn bind_image(&mut self, unit: u32, handle: TextureHandle, access: ImageAccess);

    /// Set a named uniform on a program. Unknown names are logged and dropped.
    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue);

    /// Open a geometry pass covering the current viewport.
    fn begin_pass(&mut self, label: &str);
    fn end_pass(&mut self);

    fn memory_barrier(&mut self, barrier: MemoryBarrier);

    /// Rebuild every mip level above 0 from level 0.
    fn generate_mipmaps(&mut self, handle: TextureHandle);

    fn draw_volume_slice(&mut self, handle: TextureHandle, params: &SliceParams);

    /// Start capturing GPU errors raised by the following commands.
    fn push_error_scope(&mut self);

    /// Stop capturing; returns the first captured error, if any.
    fn pop_error_scope(&mut self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_map_to_packed_volumes() {
        let per_volume: Vec<usize> = VoxelChannel::ALL
            .iter()
            .map(|c| c.volume_index())
            .collect();
        assert_eq!(per_volume, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn test_debug_modes_are_distinct() {
        let modes: Vec<u32> = VoxelChannel::ALL.iter().map(|c| c.debug_mode()).collect();
        assert_eq!(modes, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_voxelize_state_disables_everything() {
        let s = RasterState::VOXELIZE;
        assert!(!s.color_writes && !s.depth_test && !s.face_culling);
        assert_eq!(RasterState::default(), RasterState::DEFAULT);
    }
}
