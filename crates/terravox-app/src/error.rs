use terravox_core::TerravoxError;
use terravox_render::RenderError;
use terravox_terrain::{ConfigError, TerrainError};
use thiserror::Error;

/// Everything the application context can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Init(#[from] TerravoxError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
