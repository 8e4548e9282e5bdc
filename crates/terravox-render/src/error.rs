use thiserror::Error;

/// Errors reported by the voxelizer, the GPU backend and the deferred buffers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("voxelizer used before its volumes were allocated")]
    NotInitialized,

    #[error("voxel resolution {0} is not a non-zero power of two")]
    InvalidResolution(u32),

    #[error("failed to allocate {label}: {reason}")]
    AllocationFailed { label: String, reason: String },

    #[error("draw list mismatch: {transforms} transforms for {programs} programs")]
    DrawListMismatch { transforms: usize, programs: usize },

    #[error("G-buffer attachment index {0} out of range")]
    AttachmentIndex(usize),

    #[error("height data size mismatch: expected {expected} values, got {actual}")]
    HeightDataMismatch { expected: usize, actual: usize },
}
