use terravox_core::ProgramHandle;
use terravox_render::gbuffer::{gbuffer_targets, GBUFFER_DEPTH_FORMAT};
use terravox_render::wgpu_backend::{
    primitive_state, raster_color_target, DRAWABLE_GROUP, PROGRAM_GROUP,
};
use terravox_render::{HeightTexture, RasterState, WgpuBackend};
use terravox_terrain::TerrainSettings;
use wgpu::util::DeviceExt;

/// One vertex of the unit terrain plane. Heights come from the height
/// texture in the vertex shader, so positions stay flat.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl TerrainVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Terrain shape and shading inputs (32 bytes).
/// Must match TerrainUniforms in terrain.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainUniforms {
    pub max_height: f32,
    pub min_height: f32,
    pub amplitude: f32,
    pub subdivisions: u32,
    pub min_rock_slope: f32,
    pub max_grass_slope: f32,
    pub _padding: [f32; 2],
}

impl From<&TerrainSettings> for TerrainUniforms {
    fn from(settings: &TerrainSettings) -> Self {
        Self {
            max_height: settings.max_height,
            min_height: settings.min_height,
            amplitude: settings.amplitude,
            subdivisions: settings.subdivisions,
            min_rock_slope: settings.min_rock_slope,
            max_grass_slope: settings.max_grass_slope,
            _padding: [0.0; 2],
        }
    }
}

/// Flat `[0,1]²` grid in XZ with `subdivisions` quads per side, wound
/// counter-clockwise seen from +Y.
pub fn plane_mesh(subdivisions: u32) -> (Vec<TerrainVertex>, Vec<u32>) {
    let n = subdivisions.max(1);
    let row = n + 1;
    let mut vertices = Vec::with_capacity((row * row) as usize);
    for j in 0..row {
        for i in 0..row {
            let u = i as f32 / n as f32;
            let v = j as f32 / n as f32;
            vertices.push(TerrainVertex {
                position: [u, 0.0, v],
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((n * n * 6) as usize);
    for j in 0..n {
        for i in 0..n {
            let v00 = j * row + i;
            let v01 = v00 + 1;
            let v10 = v00 + row;
            let v11 = v10 + 1;
            indices.extend_from_slice(&[v00, v10, v01, v01, v10, v11]);
        }
    }
    (vertices, indices)
}

/// The heightmapped terrain plane, drawn both into the voxel volumes and into
/// the G-buffer with the same program.
pub struct TerrainDrawable {
    program: ProgramHandle,
    subdivisions: u32,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    uniforms: TerrainUniforms,
    uniform_buffer: wgpu::Buffer,
    drawable_bgl: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    bound_generation: Option<u64>,
    voxelize_pipeline: wgpu::RenderPipeline,
    gbuffer_pipeline: wgpu::RenderPipeline,
}

impl TerrainDrawable {
    pub fn new(backend: &mut WgpuBackend, settings: &TerrainSettings) -> Self {
        let program = backend.register_program("terrain-program");
        let device = backend.device();

        let common_wgsl = include_str!("../../../shaders/voxel/voxelize_common.wgsl");
        let terrain_wgsl = include_str!("../../../shaders/terrain/terrain.wgsl");
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain-shader"),
            source: wgpu::ShaderSource::Wgsl(format!("{common_wgsl}\n{terrain_wgsl}").into()),
        });

        let drawable_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain-drawable-bgl"),
            entries: &[
                HeightTexture::layout_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let voxelize_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-voxelize-layout"),
            bind_group_layouts: &[
                backend.program_layout(),
                &drawable_bgl,
                backend.voxel_image_layout(),
            ],
            push_constant_ranges: &[],
        });
        let voxelize_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain-voxelize-pipeline"),
            layout: Some(&voxelize_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[TerrainVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: primitive_state(RasterState::VOXELIZE),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_voxelize"),
                targets: &[Some(raster_color_target(RasterState::VOXELIZE))],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        // The G-buffer shader path never touches the voxel images
        let gbuffer_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain-gbuffer-layout"),
            bind_group_layouts: &[backend.program_layout(), &drawable_bgl],
            push_constant_ranges: &[],
        });
        let gbuffer_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("terrain-gbuffer-pipeline"),
            layout: Some(&gbuffer_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[TerrainVertex::layout()],
                compilation_options: Default::default(),
            },
            primitive: primitive_state(RasterState::DEFAULT),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: GBUFFER_DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_gbuffer"),
                targets: &gbuffer_targets(),
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let uniforms = TerrainUniforms::from(settings);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let (vertex_buffer, index_buffer, index_count) =
            Self::create_mesh(device, settings.subdivisions);

        Self {
            program,
            subdivisions: settings.subdivisions,
            vertex_buffer,
            index_buffer,
            index_count,
            uniforms,
            uniform_buffer,
            drawable_bgl,
            bind_group: None,
            bound_generation: None,
            voxelize_pipeline,
            gbuffer_pipeline,
        }
    }

    fn create_mesh(device: &wgpu::Device, subdivisions: u32) -> (wgpu::Buffer, wgpu::Buffer, u32) {
        let (vertices, indices) = plane_mesh(subdivisions);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("terrain-indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::debug!(
            "Terrain mesh: {} vertices, {} triangles",
            vertices.len(),
            indices.len() / 3
        );
        (vertex_buffer, index_buffer, indices.len() as u32)
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn uniforms(&self) -> &TerrainUniforms {
        &self.uniforms
    }

    /// Rebuild the plane when the subdivision count changed.
    pub fn set_subdivisions(&mut self, device: &wgpu::Device, subdivisions: u32) {
        if subdivisions == self.subdivisions {
            return;
        }
        let (vertex_buffer, index_buffer, index_count) = Self::create_mesh(device, subdivisions);
        self.vertex_buffer = vertex_buffer;
        self.index_buffer = index_buffer;
        self.index_count = index_count;
        self.subdivisions = subdivisions;
        self.uniforms.subdivisions = subdivisions;
    }

    pub fn update_uniforms(&mut self, queue: &wgpu::Queue, settings: &TerrainSettings) {
        self.uniforms = TerrainUniforms::from(settings);
        self.uniforms.subdivisions = self.subdivisions;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    /// Rebind the height texture if it was recreated since the last call.
    pub fn refresh_bindings(&mut self, device: &wgpu::Device, heights: &HeightTexture) {
        if self.bound_generation == Some(heights.generation()) {
            return;
        }
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain-drawable-bg"),
            layout: &self.drawable_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(heights.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        }));
        self.bound_generation = Some(heights.generation());
    }

    /// Draw into the backend's open geometry pass.
    pub fn draw_voxelize(&self, backend: &mut WgpuBackend) {
        let Some(bind_group) = &self.bind_group else {
            log::warn!("Terrain drawn before its height texture was bound");
            return;
        };
        let Some(pass) = backend.voxel_pass(self.program) else {
            return;
        };
        pass.set_pipeline(&self.voxelize_pipeline);
        pass.set_bind_group(DRAWABLE_GROUP, bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Draw into the G-buffer prepass.
    pub fn draw_gbuffer(&self, pass: &mut wgpu::RenderPass<'_>, backend: &WgpuBackend) {
        let (Some(bind_group), Some(program)) =
            (&self.bind_group, backend.program_bind_group(self.program))
        else {
            log::warn!("Terrain G-buffer draw skipped: bindings not ready");
            return;
        };
        pass.set_pipeline(&self.gbuffer_pipeline);
        pass.set_bind_group(PROGRAM_GROUP, program, &[]);
        pass.set_bind_group(DRAWABLE_GROUP, bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<TerrainUniforms>(), 32);
        assert_eq!(std::mem::size_of::<TerrainVertex>(), 20);
    }

    #[test]
    fn test_plane_mesh_counts() {
        let (vertices, indices) = plane_mesh(4);
        assert_eq!(vertices.len(), 25);
        assert_eq!(indices.len(), 4 * 4 * 6);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        assert_eq!(vertices[0].uv, [0.0, 0.0]);
        assert_eq!(vertices[24].uv, [1.0, 1.0]);
    }

    #[test]
    fn test_plane_mesh_faces_up() {
        let (vertices, indices) = plane_mesh(3);
        for tri in indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from(vertices[i as usize].position));
            let normal = (b - a).cross(c - a);
            assert!(normal.y > 0.0, "triangle {tri:?} faces down");
        }
    }

    #[test]
    fn test_zero_subdivisions_still_one_quad() {
        let (vertices, indices) = plane_mesh(0);
        assert_eq!(vertices.len(), 4);
        assert_eq!(indices.len(), 6);
    }

    #[test]
    fn test_uniforms_from_settings() {
        let settings = TerrainSettings {
            amplitude: 2.5,
            subdivisions: 64,
            ..Default::default()
        };
        let u = TerrainUniforms::from(&settings);
        assert_eq!(u.amplitude, 2.5);
        assert_eq!(u.subdivisions, 64);
        assert_eq!(u.min_rock_slope, settings.min_rock_slope);
    }
}
