//! Single source of truth for shared constants.
//! Values consumed by WGSL are injected into shader preambles by the
//! render crate, so shaders never hardcode them.

/// Droplets with less water than this are retired.
pub const DROPLET_MIN_WATER: f32 = 0.01;

/// Default edge length of the voxel cube, in voxels.
pub const DEFAULT_VOXEL_RESOLUTION: u32 = 512;

/// Default metric extent of the voxel cube.
pub const DEFAULT_VOXEL_WORLD_SIZE: f32 = 30.0;

/// Number of jittered sub-texel samples per voxelization.
pub const VOXEL_JITTER_SAMPLES: u32 = 4;

/// Jitter magnitude in texels, applied as +/- in X and Y.
pub const VOXEL_JITTER_TEXELS: f32 = 0.25;

/// Orthographic axes rasterized per jitter sample (-X, -Y, -Z).
pub const VOXEL_AXES: u32 = 3;

/// Geometry passes issued by one full voxelization (4 samples x 3 axes).
pub const VOXEL_GEOMETRY_PASSES: u32 = VOXEL_JITTER_SAMPLES * VOXEL_AXES;

/// Fraction of the world size added on each side of the orthographic frustum.
pub const VOXEL_FRUSTUM_MARGIN: f32 = 0.01;

/// Number of packed attribute volumes (normal+smoothness, albedo+emissive
/// factor, emissive colour+metallic).
pub const VOXEL_VOLUME_COUNT: usize = 3;

/// Workgroup edge for 3D compute dispatches (4x4x4 = 64 invocations).
pub const VOXEL_WORKGROUP_SIZE: u32 = 4;

/// Number of colour attachments in the deferred attribute buffer.
pub const GBUFFER_ATTACHMENT_COUNT: usize = 4;

/// Default heightfield edge length produced by the noise generator.
pub const DEFAULT_HEIGHTFIELD_SIZE: usize = 512;

/// Default plane subdivisions of the terrain mesh.
pub const DEFAULT_TERRAIN_SUBDIVISIONS: u32 = 512;

/// Default scale applied to the unit terrain plane (x, y, z).
pub const DEFAULT_TERRAIN_SCALE: f32 = 10.0;
