/// Errors raised by the heightfield store and the erosion engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TerrainError {
    #[error("heightfield size mismatch: expected {expected} values, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("height access at ({x}, {y}) outside {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    #[error("invalid heightfield dimensions {width}x{height} (minimum 2x2)")]
    InvalidDimensions { width: usize, height: usize },
}

/// Errors raised while parsing RON configuration and presets.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse noise presets RON: {0}")]
    PresetParseError(String),
    #[error("Failed to parse configuration RON: {0}")]
    ConfigParseError(String),
    #[error("Failed to read configuration file {path}: {reason}")]
    ConfigReadError { path: String, reason: String },
}
