use glam::Mat4;
use terravox_core::types::RenderMode;

use crate::backend::UniformValue;

/// Per-program uniform block shared by the voxelize and G-buffer passes.
/// Must match ProgramUniforms in voxelize_common.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProgramUniforms {
    pub model_matrix: [[f32; 4]; 4],
    pub view_matrix: [[f32; 4]; 4],
    pub projection_matrix: [[f32; 4]; 4],
    pub model_view_matrix: [[f32; 4]; 4],
    pub voxel_center: [f32; 3],
    pub voxel_world_size: f32,
    pub voxel_resolution: i32,
    pub render_mode: i32,
    pub _padding: [u32; 2],
}

impl Default for ProgramUniforms {
    fn default() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        Self {
            model_matrix: identity,
            view_matrix: identity,
            projection_matrix: identity,
            model_view_matrix: identity,
            voxel_center: [0.0; 3],
            voxel_world_size: 1.0,
            voxel_resolution: 1,
            render_mode: RenderMode::GBuffer.as_uniform(),
            _padding: [0; 2],
        }
    }
}

impl ProgramUniforms {
    /// Store a named value. Returns false for an unknown name or a value of
    /// the wrong type; the block is left unchanged in that case.
    pub fn apply(&mut self, name: &str, value: UniformValue) -> bool {
        match (name, value) {
            ("model_matrix", UniformValue::Mat4(m)) => self.model_matrix = m.to_cols_array_2d(),
            ("view_matrix", UniformValue::Mat4(m)) => self.view_matrix = m.to_cols_array_2d(),
            ("projection_matrix", UniformValue::Mat4(m)) => {
                self.projection_matrix = m.to_cols_array_2d()
            }
            ("model_view_matrix", UniformValue::Mat4(m)) => {
                self.model_view_matrix = m.to_cols_array_2d()
            }
            ("voxel_center", UniformValue::Vec3(v)) => self.voxel_center = v.to_array(),
            ("voxel_world_size", UniformValue::Float(f)) => self.voxel_world_size = f,
            ("voxel_resolution", UniformValue::Int(i)) => self.voxel_resolution = i,
            ("render_mode", UniformValue::Int(i)) => self.render_mode = i,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_program_uniforms_size() {
        // 4 mat4 + vec3/f32 + 2 i32 + padding
        assert_eq!(std::mem::size_of::<ProgramUniforms>(), 288);
        assert_eq!(std::mem::size_of::<ProgramUniforms>() % 16, 0);
    }

    #[test]
    fn test_apply_known_names() {
        let mut block = ProgramUniforms::default();
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(block.apply("model_matrix", UniformValue::Mat4(m)));
        assert!(block.apply("voxel_center", UniformValue::Vec3(Vec3::new(4.0, 5.0, 6.0))));
        assert!(block.apply("voxel_world_size", UniformValue::Float(30.0)));
        assert!(block.apply("voxel_resolution", UniformValue::Int(512)));
        assert!(block.apply("render_mode", UniformValue::Int(0)));

        assert_eq!(block.model_matrix, m.to_cols_array_2d());
        assert_eq!(block.voxel_center, [4.0, 5.0, 6.0]);
        assert_eq!(block.voxel_world_size, 30.0);
        assert_eq!(block.voxel_resolution, 512);
        assert_eq!(block.render_mode, RenderMode::Voxelize.as_uniform());
    }

    #[test]
    fn test_apply_rejects_unknown_or_mistyped() {
        let mut block = ProgramUniforms::default();
        let before = block;
        assert!(!block.apply("uModelMatrix", UniformValue::Mat4(Mat4::ZERO)));
        assert!(!block.apply("voxel_resolution", UniformValue::Float(2.0)));
        assert_eq!(block, before);
    }
}
