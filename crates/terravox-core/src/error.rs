use thiserror::Error;

/// Errors that can occur while bringing up the GPU for Terravox.
#[derive(Debug, Error)]
pub enum TerravoxError {
    #[error("GPU adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Failed to request GPU device: {0}")]
    DeviceRequestFailed(String),

    #[error("Shader compilation failed: {0}")]
    ShaderCompilationFailed(String),
}
