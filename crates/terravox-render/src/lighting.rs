use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use terravox_core::constants::{GBUFFER_ATTACHMENT_COUNT, VOXEL_VOLUME_COUNT};

use crate::error::RenderError;
use crate::gbuffer::GBuffer;
use crate::voxelizer::VoxelParams;

/// Per-frame lighting parameters. Must match LightingUniforms in lighting.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniforms {
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub voxel_world_size: f32,
    pub voxel_center: [f32; 3],
    pub voxel_resolution: u32,
    pub light_direction: [f32; 3],
    pub mip_level_count: u32,
    pub light_color: [f32; 3],
    pub light_intensity: f32,
    pub cone_aperture: f32,
    pub max_cone_distance: f32,
    pub indirect_strength: f32,
    pub debug_mode: u32,
}

/// Tunable lighting inputs, loaded from the app config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSettings {
    /// Direction the light travels; normalized on upload.
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub light_intensity: f32,
    /// tan of the diffuse cone half-angle.
    pub cone_aperture: f32,
    /// Longest cone march, as a fraction of the voxel world size.
    pub max_cone_distance: f32,
    pub indirect_strength: f32,
    /// 0 shades normally; 1-4 show one G-buffer attachment.
    pub debug_mode: u32,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            light_direction: Vec3::new(-0.4, -1.0, -0.3),
            light_color: Vec3::new(1.0, 0.95, 0.85),
            light_intensity: 1.5,
            cone_aperture: 0.577,
            max_cone_distance: 1.0,
            indirect_strength: 1.0,
            debug_mode: 0,
        }
    }
}

impl LightingSettings {
    pub fn uniforms(
        &self,
        view_proj: Mat4,
        camera_position: Vec3,
        voxels: &VoxelParams,
        mip_level_count: u32,
    ) -> LightingUniforms {
        LightingUniforms {
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            voxel_world_size: voxels.world_size,
            voxel_center: voxels.center.to_array(),
            voxel_resolution: voxels.resolution,
            light_direction: self.light_direction.normalize_or(Vec3::NEG_Y).to_array(),
            mip_level_count,
            light_color: self.light_color.to_array(),
            light_intensity: self.light_intensity,
            cone_aperture: self.cone_aperture,
            max_cone_distance: self.max_cone_distance * voxels.world_size,
            indirect_strength: self.indirect_strength,
            debug_mode: self.debug_mode,
        }
    }
}

/// Fullscreen pass resolving direct and cone-traced indirect light from the
/// G-buffer and the voxel volumes.
pub struct LightingStage {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    gbuffer_bgl: wgpu::BindGroupLayout,
    voxel_bgl: wgpu::BindGroupLayout,
    inputs: Option<(wgpu::BindGroup, wgpu::BindGroup)>,
}

impl LightingStage {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Self {
        let source = include_str!("../../../shaders/render/lighting.wgsl");
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lighting-shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lighting-uniforms"),
            size: std::mem::size_of::<LightingUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("voxel-cone-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting-uniform-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let texture_entry = |binding: u32, dimension, filterable| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: dimension,
                multisampled: false,
            },
            count: None,
        };
        let gbuffer_entries: Vec<_> = (0..GBUFFER_ATTACHMENT_COUNT as u32)
            .map(|i| texture_entry(i, wgpu::TextureViewDimension::D2, false))
            .collect();
        let gbuffer_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting-gbuffer-bgl"),
            entries: &gbuffer_entries,
        });
        let voxel_entries: Vec<_> = (0..VOXEL_VOLUME_COUNT as u32)
            .map(|i| texture_entry(i, wgpu::TextureViewDimension::D3, true))
            .collect();
        let voxel_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting-voxel-bgl"),
            entries: &voxel_entries,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting-uniform-bg"),
            layout: &uniform_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lighting-pipeline-layout"),
            bind_group_layouts: &[&uniform_bgl, &gbuffer_bgl, &voxel_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lighting-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            gbuffer_bgl,
            voxel_bgl,
            inputs: None,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, uniforms: &LightingUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Rebuild input bind groups. Call after G-buffer resize or voxel
    /// reallocation.
    pub fn bind(
        &mut self,
        device: &wgpu::Device,
        gbuffer: &GBuffer,
        volumes: [&wgpu::TextureView; VOXEL_VOLUME_COUNT],
    ) -> Result<(), RenderError> {
        let attachments = (0..GBUFFER_ATTACHMENT_COUNT)
            .map(|i| gbuffer.attachment(i))
            .collect::<Result<Vec<_>, _>>()?;
        let gbuffer_entries: Vec<_> = attachments
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let voxel_entries: Vec<_> = volumes
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();

        let gbuffer_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting-gbuffer-bg"),
            layout: &self.gbuffer_bgl,
            entries: &gbuffer_entries,
        });
        let voxel_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting-voxel-bg"),
            layout: &self.voxel_bgl,
            entries: &voxel_entries,
        });
        self.inputs = Some((gbuffer_bg, voxel_bg));
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.inputs.is_some()
    }

    /// Draw the fullscreen lighting pass into `target`.
    pub fn run(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) -> Result<(), RenderError> {
        let Some((gbuffer_bg, voxel_bg)) = &self.inputs else {
            log::error!("Lighting pass run before its inputs were bound");
            return Err(RenderError::NotInitialized);
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("lighting-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, gbuffer_bg, &[]);
        pass.set_bind_group(2, voxel_bg, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
