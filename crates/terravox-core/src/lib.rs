pub mod constants;
pub mod error;
pub mod math;
pub mod types;

pub use error::TerravoxError;
pub use types::{ProgramHandle, TextureHandle};
