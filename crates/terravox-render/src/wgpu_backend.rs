use std::collections::HashMap;
use std::sync::Arc;

use terravox_core::constants::{VOXEL_VOLUME_COUNT, VOXEL_WORKGROUP_SIZE};
use terravox_core::{ProgramHandle, TextureHandle};

use crate::backend::{
    GpuBackend, ImageAccess, MemoryBarrier, RasterState, SliceParams, UniformValue,
    VolumeDescriptor, Viewport,
};
use crate::error::RenderError;
use crate::uniforms::ProgramUniforms;

/// Voxel attribute format. Must match the storage texture format in
/// voxelize_common.wgsl.
pub const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Colour target of backend geometry passes. Nothing is written to it while
/// colour writes are disabled; it only gives the rasterizer an extent.
pub const RASTER_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

pub const SLICE_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Bind group slots shared by every program drawn through the backend.
pub const PROGRAM_GROUP: u32 = 0;
/// Owned by the drawable (e.g. the terrain height texture).
pub const DRAWABLE_GROUP: u32 = 1;
pub const VOXEL_IMAGE_GROUP: u32 = 2;

/// Slice debug view uniforms. Must match SliceUniforms in debug_slice.wgsl.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SliceUniforms {
    slice: u32,
    debug_mode: u32,
    resolution: u32,
    _padding: u32,
}

/// Primitive state for a pipeline drawn under `raster`.
pub fn primitive_state(raster: RasterState) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: raster.face_culling.then_some(wgpu::Face::Back),
        ..Default::default()
    }
}

/// Colour target for a pipeline drawn into backend geometry passes.
pub fn raster_color_target(raster: RasterState) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format: RASTER_TARGET_FORMAT,
        blend: None,
        write_mask: if raster.color_writes {
            wgpu::ColorWrites::ALL
        } else {
            wgpu::ColorWrites::empty()
        },
    }
}

/// Workgroups covering `size` texels along one axis.
fn workgroups(size: u32) -> u32 {
    size.div_ceil(VOXEL_WORKGROUP_SIZE).max(1)
}

struct VolumeResource {
    #[allow(dead_code)] // Views keep the texture alive; held for ownership clarity
    texture: wgpu::Texture,
    /// All mip levels, for sampling by the lighting stage.
    sampled_view: wgpu::TextureView,
    /// One single-level view per mip.
    level_views: Vec<wgpu::TextureView>,
    clear_bind_group: wgpu::BindGroup,
    /// Entry `i` builds level `i + 1` from level `i`.
    mip_bind_groups: Vec<wgpu::BindGroup>,
    resolution: u32,
}

struct ProgramResource {
    label: String,
    uniforms: ProgramUniforms,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    dirty: bool,
}

/// `GpuBackend` on wgpu.
///
/// Commands outside geometry passes are encoded into a pending encoder that
/// is submitted at the next pass boundary, barrier or error-scope pop. Each
/// geometry pass is submitted on `end_pass` so per-pass uniform writes land
/// before the pass that reads them.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,

    volumes: HashMap<TextureHandle, VolumeResource>,
    next_texture: u32,
    programs: HashMap<ProgramHandle, ProgramResource>,
    next_program: u32,

    viewport: Viewport,
    raster: RasterState,
    images: [Option<TextureHandle>; VOXEL_VOLUME_COUNT],
    image_bind_group: Option<wgpu::BindGroup>,

    program_bgl: wgpu::BindGroupLayout,
    voxel_image_bgl: wgpu::BindGroupLayout,
    clear_bgl: wgpu::BindGroupLayout,
    mip_bgl: wgpu::BindGroupLayout,
    slice_bgl: wgpu::BindGroupLayout,
    clear_pipeline: wgpu::ComputePipeline,
    mip_pipeline: wgpu::ComputePipeline,
    slice_pipeline: wgpu::RenderPipeline,
    slice_uniform_buffer: wgpu::Buffer,

    raster_target: Option<(wgpu::TextureView, u32, u32)>,
    slice_target: Option<(wgpu::TextureView, u32, u32)>,

    pending: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
    pass_encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Build all layouts and pipelines up front; no per-frame pipeline creation.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, viewport: Viewport) -> Self {
        let preamble = format!("const WORKGROUP_SIZE: u32 = {VOXEL_WORKGROUP_SIZE}u;\n");
        let clear_wgsl = include_str!("../../../shaders/voxel/clear.wgsl");
        let mip_wgsl = include_str!("../../../shaders/voxel/mip_downsample.wgsl");
        let slice_wgsl = include_str!("../../../shaders/render/debug_slice.wgsl");

        let clear_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("voxel-clear-shader"),
            source: wgpu::ShaderSource::Wgsl(format!("{preamble}\n{clear_wgsl}").into()),
        });
        let mip_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("voxel-mip-shader"),
            source: wgpu::ShaderSource::Wgsl(format!("{preamble}\n{mip_wgsl}").into()),
        });
        let slice_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("voxel-slice-shader"),
            source: wgpu::ShaderSource::Wgsl(slice_wgsl.into()),
        });

        let program_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("program-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let storage_entry = |binding: u32, visibility: wgpu::ShaderStages| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: VOLUME_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            }
        };
        let sampled_entry = |binding: u32, visibility: wgpu::ShaderStages| {
            wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D3,
                    multisampled: false,
                },
                count: None,
            }
        };

        let voxel_image_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel-image-bgl"),
            entries: &[
                storage_entry(0, wgpu::ShaderStages::FRAGMENT),
                storage_entry(1, wgpu::ShaderStages::FRAGMENT),
                storage_entry(2, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let clear_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel-clear-bgl"),
            entries: &[storage_entry(0, wgpu::ShaderStages::COMPUTE)],
        });

        let mip_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel-mip-bgl"),
            entries: &[
                sampled_entry(0, wgpu::ShaderStages::COMPUTE),
                storage_entry(1, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let slice_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("voxel-slice-bgl"),
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
                sampled_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let compute_pipeline = |label: &str, layout: &wgpu::BindGroupLayout, module| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let clear_pipeline = compute_pipeline("voxel-clear-pipeline", &clear_bgl, &clear_module);
        let mip_pipeline = compute_pipeline("voxel-mip-pipeline", &mip_bgl, &mip_module);

        let slice_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("voxel-slice-pipeline-layout"),
            bind_group_layouts: &[&slice_bgl],
            push_constant_ranges: &[],
        });
        let slice_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("voxel-slice-pipeline"),
            layout: Some(&slice_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &slice_module,
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
                module: &slice_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: SLICE_TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        let slice_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("voxel-slice-uniforms"),
            size: std::mem::size_of::<SliceUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            device,
            queue,
            volumes: HashMap::new(),
            next_texture: 1,
            programs: HashMap::new(),
            next_program: 1,
            viewport,
            raster: RasterState::DEFAULT,
            images: [None; VOXEL_VOLUME_COUNT],
            image_bind_group: None,
            program_bgl,
            voxel_image_bgl,
            clear_bgl,
            mip_bgl,
            slice_bgl,
            clear_pipeline,
            mip_pipeline,
            slice_pipeline,
            slice_uniform_buffer,
            raster_target: None,
            slice_target: None,
            pending: None,
            pass: None,
            pass_encoder: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Layout of `PROGRAM_GROUP`, for drawable pipeline layouts.
    pub fn program_layout(&self) -> &wgpu::BindGroupLayout {
        &self.program_bgl
    }

    /// Layout of `VOXEL_IMAGE_GROUP`, for drawable pipeline layouts.
    pub fn voxel_image_layout(&self) -> &wgpu::BindGroupLayout {
        &self.voxel_image_bgl
    }

    /// Create a uniform block for one drawable's program.
    pub fn register_program(&mut self, label: &str) -> ProgramHandle {
        let handle = ProgramHandle(self.next_program);
        self.next_program += 1;

        let uniforms = ProgramUniforms::default();
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<ProgramUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.program_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.programs.insert(
            handle,
            ProgramResource {
                label: label.to_string(),
                uniforms,
                buffer,
                bind_group,
                dirty: true,
            },
        );
        log::debug!("Registered program '{label}' as {handle:?}");
        handle
    }

    pub fn program_bind_group(&self, handle: ProgramHandle) -> Option<&wgpu::BindGroup> {
        self.programs.get(&handle).map(|p| &p.bind_group)
    }

    /// Upload every program block changed since the last upload.
    pub fn flush_uniforms(&mut self) {
        for program in self.programs.values_mut().filter(|p| p.dirty) {
            self.queue
                .write_buffer(&program.buffer, 0, bytemuck::bytes_of(&program.uniforms));
            program.dirty = false;
        }
    }

    /// The open geometry pass with `program`'s uniforms and the bound voxel
    /// images already set. `None` outside `begin_pass`/`end_pass`.
    pub fn voxel_pass(&mut self, program: ProgramHandle) -> Option<&mut wgpu::RenderPass<'static>> {
        let pass = self.pass.as_mut()?;
        match self.programs.get(&program) {
            Some(p) => pass.set_bind_group(PROGRAM_GROUP, &p.bind_group, &[]),
            None => {
                log::warn!("voxel_pass: unknown program {program:?}");
                return None;
            }
        }
        if let Some(images) = &self.image_bind_group {
            pass.set_bind_group(VOXEL_IMAGE_GROUP, images, &[]);
        }
        Some(pass)
    }

    /// All-mip view of a volume for sampling.
    pub fn volume_view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.volumes.get(&handle).map(|v| &v.sampled_view)
    }

    /// Output of the last `draw_volume_slice`.
    pub fn slice_target_view(&self) -> Option<&wgpu::TextureView> {
        self.slice_target.as_ref().map(|(view, _, _)| view)
    }

    fn pending_encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.pending.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("voxel-commands"),
            })
        })
    }

    fn submit_pending(&mut self) {
        if let Some(encoder) = self.pending.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn target_texture(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Recreate the raster target when the viewport outgrows it.
    fn ensure_raster_target(&mut self) {
        let width = self.viewport.x + self.viewport.width;
        let height = self.viewport.y + self.viewport.height;
        let fits = matches!(self.raster_target, Some((_, w, h)) if w >= width && h >= height);
        if !fits {
            let view = Self::target_texture(
                &self.device,
                "voxel-raster-target",
                RASTER_TARGET_FORMAT,
                width,
                height,
            );
            self.raster_target = Some((view, width.max(1), height.max(1)));
        }
    }

    fn rebuild_image_bind_group(&mut self) {
        self.image_bind_group = None;
        let views: Option<Vec<&wgpu::TextureView>> = self
            .images
            .iter()
            .map(|slot| slot.and_then(|h| self.volumes.get(&h)).map(|v| &v.level_views[0]))
            .collect();
        let Some(views) = views else {
            return;
        };
        let entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(i, view)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        self.image_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("voxel-image-bg"),
            layout: &self.voxel_image_bgl,
            entries: &entries,
        }));
    }

    fn create_volume(&self, desc: &VolumeDescriptor) -> VolumeResource {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.resolution,
                height: desc.resolution,
                depth_or_array_layers: desc.resolution,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: VOLUME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let sampled_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        let level_views: Vec<wgpu::TextureView> = (0..desc.mip_levels)
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(desc.label),
                    dimension: Some(wgpu::TextureViewDimension::D3),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let clear_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("voxel-clear-bg"),
            layout: &self.clear_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&level_views[0]),
            }],
        });
        let mip_bind_groups = level_views
            .windows(2)
            .map(|pair| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("voxel-mip-bg"),
                    layout: &self.mip_bgl,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&pair[0]),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&pair[1]),
                        },
                    ],
                })
            })
            .collect();

        VolumeResource {
            texture,
            sampled_view,
            level_views,
            clear_bind_group,
            mip_bind_groups,
            resolution: desc.resolution,
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn allocate_volume(&mut self, desc: &VolumeDescriptor) -> Result<TextureHandle, RenderError> {
        let max = self.device.limits().max_texture_dimension_3d;
        if desc.resolution > max {
            return Err(RenderError::AllocationFailed {
                label: desc.label.to_string(),
                reason: format!("resolution {} exceeds device limit {max}", desc.resolution),
            });
        }

        self.push_error_scope();
        let volume = self.create_volume(desc);
        if let Some(reason) = self.pop_error_scope() {
            return Err(RenderError::AllocationFailed {
                label: desc.label.to_string(),
                reason,
            });
        }

        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.volumes.insert(handle, volume);
        // Freshly created textures are zero-initialized by wgpu
        Ok(handle)
    }

    fn release_volume(&mut self, handle: TextureHandle) {
        if self.volumes.remove(&handle).is_none() {
            log::debug!("release_volume: unknown handle {handle:?}");
            return;
        }
        if self.images.iter().any(|slot| *slot == Some(handle)) {
            self.images = self.images.map(|slot| slot.filter(|h| *h != handle));
            self.image_bind_group = None;
        }
    }

    fn clear_volume(&mut self, handle: TextureHandle) {
        let Some(resolution) = self.volumes.get(&handle).map(|v| v.resolution) else {
            log::warn!("clear_volume: unknown handle {handle:?}");
            return;
        };
        let groups = workgroups(resolution);
        // Split borrow: encoder is created before the volume is looked up again
        self.pending_encoder();
        let (Some(encoder), Some(volume)) = (self.pending.as_mut(), self.volumes.get(&handle))
        else {
            return;
        };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("voxel-clear-pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.clear_pipeline);
        pass.set_bind_group(0, &volume.clear_bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, groups);
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn raster_state(&self) -> RasterState {
        self.raster
    }

    /// Raster state is baked into pipelines; drawables build theirs with
    /// `primitive_state` and `raster_color_target`.
    fn set_raster_state(&mut self, state: RasterState) {
        self.raster = state;
    }

    fn bind_image(&mut self, unit: u32, handle: TextureHandle, access: ImageAccess) {
        let Some(slot) = self.images.get_mut(unit as usize) else {
            log::warn!("bind_image: unit {unit} out of range");
            return;
        };
        if access != ImageAccess::WriteOnly {
            log::warn!("bind_image: only write-only access is supported, got {access:?}");
        }
        *slot = Some(handle);
        self.rebuild_image_bind_group();
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        let Some(p) = self.programs.get_mut(&program) else {
            log::warn!("set_uniform: unknown program {program:?}");
            return;
        };
        if p.uniforms.apply(name, value) {
            p.dirty = true;
        } else {
            log::warn!("Program '{}' has no uniform '{name}' of that type", p.label);
        }
    }

    fn begin_pass(&mut self, label: &str) {
        if self.pass.is_some() {
            log::warn!("begin_pass('{label}') while a pass is open; closing it");
            self.end_pass();
        }
        self.flush_uniforms();
        self.ensure_raster_target();
        let Some((target, _, _)) = &self.raster_target else {
            return;
        };

        let mut encoder = self.pending.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
        });
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();
        let vp = self.viewport;
        pass.set_viewport(
            vp.x as f32,
            vp.y as f32,
            vp.width as f32,
            vp.height as f32,
            0.0,
            1.0,
        );
        self.pass = Some(pass);
        self.pass_encoder = Some(encoder);
    }

    fn end_pass(&mut self) {
        // The pass must be dropped before its encoder is finished
        drop(self.pass.take());
        if let Some(encoder) = self.pass_encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    /// wgpu orders passes within and across submissions, so a barrier only
    /// has to submit what is pending.
    fn memory_barrier(&mut self, _barrier: MemoryBarrier) {
        self.submit_pending();
    }

    fn generate_mipmaps(&mut self, handle: TextureHandle) {
        let Some(resolution) = self.volumes.get(&handle).map(|v| v.resolution) else {
            log::warn!("generate_mipmaps: unknown handle {handle:?}");
            return;
        };
        self.pending_encoder();
        let (Some(encoder), Some(volume)) = (self.pending.as_mut(), self.volumes.get(&handle))
        else {
            return;
        };
        for (i, bind_group) in volume.mip_bind_groups.iter().enumerate() {
            let size = (resolution >> (i + 1)).max(1);
            let groups = workgroups(size);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("voxel-mip-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.mip_pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups, groups, groups);
        }
    }

    fn draw_volume_slice(&mut self, handle: TextureHandle, params: &SliceParams) {
        let Some(volume) = self.volumes.get(&handle) else {
            log::warn!("draw_volume_slice: unknown handle {handle:?}");
            return;
        };
        let uniforms = SliceUniforms {
            slice: params.slice,
            debug_mode: params.channel.debug_mode(),
            resolution: params.resolution,
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.slice_uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("voxel-slice-bg"),
            layout: &self.slice_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.slice_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&volume.sampled_view),
                },
            ],
        });

        let (width, height) = (self.viewport.width.max(1), self.viewport.height.max(1));
        if !matches!(self.slice_target, Some((_, w, h)) if w == width && h == height) {
            let view = Self::target_texture(
                &self.device,
                "voxel-slice-target",
                SLICE_TARGET_FORMAT,
                width,
                height,
            );
            self.slice_target = Some((view, width, height));
        }

        self.pending_encoder();
        let (Some(encoder), Some((target, _, _))) = (self.pending.as_mut(), &self.slice_target)
        else {
            return;
        };
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("voxel-slice-pass"),
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
            pass.set_pipeline(&self.slice_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.submit_pending();
    }

    fn push_error_scope(&mut self) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }

    fn pop_error_scope(&mut self) -> Option<String> {
        self.submit_pending();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        validation.or(out_of_memory).map(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_uniforms_size() {
        assert_eq!(std::mem::size_of::<SliceUniforms>(), 16);
    }

    #[test]
    fn test_voxelize_raster_maps_to_pipeline_state() {
        let primitive = primitive_state(RasterState::VOXELIZE);
        assert_eq!(primitive.cull_mode, None);
        let target = raster_color_target(RasterState::VOXELIZE);
        assert_eq!(target.write_mask, wgpu::ColorWrites::empty());

        let primitive = primitive_state(RasterState::DEFAULT);
        assert_eq!(primitive.cull_mode, Some(wgpu::Face::Back));
        assert_eq!(
            raster_color_target(RasterState::DEFAULT).write_mask,
            wgpu::ColorWrites::ALL
        );
    }

    #[test]
    fn test_workgroups_cover_volume() {
        assert_eq!(workgroups(512), 128);
        assert_eq!(workgroups(6), 2);
        assert_eq!(workgroups(1), 1);
        assert_eq!(workgroups(0), 1);
    }

    #[cfg(feature = "gpu_tests")]
    mod gpu {
        use super::super::*;
        use crate::backend::VoxelChannel;
        use crate::voxelizer::{VoxelParams, Voxelizer};

        fn headless() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = pollster::block_on(instance.request_adapter(
                &wgpu::RequestAdapterOptions::default(),
            ))?;
            let (device, queue) = pollster::block_on(
                adapter.request_device(&wgpu::DeviceDescriptor::default(), None),
            )
            .ok()?;
            Some((Arc::new(device), Arc::new(queue)))
        }

        #[test]
        fn test_voxelize_empty_scene_on_gpu() {
            let Some((device, queue)) = headless() else {
                eprintln!("no adapter, skipping");
                return;
            };
            let backend = WgpuBackend::new(device, queue, Viewport::square(64));
            let params = VoxelParams {
                resolution: 32,
                ..Default::default()
            };
            let mut voxelizer = Voxelizer::new(backend, params);
            assert!(voxelizer.is_initialized());

            let report = voxelizer.voxelize(|_| {}, &[], &[]).expect("initialized");
            assert_eq!(report.gpu_error, None);

            voxelizer
                .render_debug_slice(16, VoxelChannel::Albedo)
                .expect("initialized");
            assert!(voxelizer.backend().slice_target_view().is_some());
        }
    }
}
