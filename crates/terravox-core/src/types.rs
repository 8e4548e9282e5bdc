/// Opaque identifier of a texture owned by a GPU backend.
///
/// Handles are never reused by a backend within its lifetime, so a stale
/// handle can be detected instead of aliasing a newer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Opaque identifier of a shader program registered with a GPU backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProgramHandle(pub u32);

/// Which output a drawable's shader writes in the current pass.
/// Passed to programs as the `render_mode` uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum RenderMode {
    /// Store surface attributes into the voxel volumes.
    Voxelize = 0,
    /// Write the deferred attribute buffer.
    GBuffer = 1,
}

impl RenderMode {
    pub fn as_uniform(self) -> i32 {
        self as i32
    }
}
