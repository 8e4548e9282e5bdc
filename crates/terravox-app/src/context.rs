//! The application context: one owner for everything a frame touches.

use glam::{Mat4, Vec3};
use terravox_core::types::RenderMode;
use terravox_render::backend::VoxelChannel;
use terravox_render::error::RenderError;
use terravox_render::{
    DrawList, GBuffer, GpuBackend, HeightTexture, LightingStage, UniformValue, Viewport,
    VoxelizeReport, Voxelizer, WgpuBackend,
};
use terravox_terrain::Terrain;

use crate::camera::Camera;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::gpu::{create_validated, GpuContext};
use crate::terrain_mesh::TerrainDrawable;

/// Format of the lit frame produced by `AppContext::frame`.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// What happened during one `frame` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub heights_changed: bool,
    /// Present only on frames that re-voxelized the scene.
    pub voxelize: Option<VoxelizeReport>,
    pub erosion_progress: Option<String>,
}

fn create_output(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame-output"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Owns terrain, voxelizer, deferred buffers and the per-frame draw list.
///
/// The scene is re-voxelized only on frames where it is dirty: after height
/// changes, voxel reallocation or an explicit `mark_scene_dirty`.
pub struct AppContext {
    gpu: GpuContext,
    config: AppConfig,
    terrain: Terrain,
    voxelizer: Voxelizer<WgpuBackend>,
    height_texture: HeightTexture,
    terrain_mesh: TerrainDrawable,
    gbuffer: GBuffer,
    lighting: LightingStage,
    #[allow(dead_code)] // Owns the view's texture
    output: wgpu::Texture,
    output_view: wgpu::TextureView,
    draw_list: DrawList,
    scene_dirty: bool,
    heights_stale: bool,
    lighting_stale: bool,
    pub camera: Camera,
}

impl AppContext {
    pub fn new(gpu: GpuContext, config: AppConfig) -> Result<Self, AppError> {
        let noise = config.resolved_noise()?;
        let terrain = Terrain::new(config.terrain, noise, config.erosion)?;

        let viewport = Viewport {
            x: 0,
            y: 0,
            width: config.width,
            height: config.height,
        };
        let (backend, terrain_mesh, lighting) =
            create_validated(&gpu.device, "render pipelines", || {
                let mut backend =
                    WgpuBackend::new(gpu.device.clone(), gpu.queue.clone(), viewport);
                let terrain_mesh = TerrainDrawable::new(&mut backend, terrain.settings());
                let lighting = LightingStage::new(&gpu.device, OUTPUT_FORMAT);
                (backend, terrain_mesh, lighting)
            })?;
        let voxelizer = Voxelizer::new(backend, config.voxels);

        let field = terrain.heightfield();
        let height_texture =
            HeightTexture::new(&gpu.device, field.width() as u32, field.height() as u32);
        let gbuffer = GBuffer::new(&gpu.device, config.width, config.height);
        let (output, output_view) = create_output(&gpu.device, config.width, config.height);

        log::info!(
            "App context ready: {}x{}, terrain {}x{}, voxels {}^3",
            config.width,
            config.height,
            field.width(),
            field.height(),
            config.voxels.resolution
        );

        Ok(Self {
            gpu,
            config,
            terrain,
            voxelizer,
            height_texture,
            terrain_mesh,
            gbuffer,
            lighting,
            output,
            output_view,
            draw_list: DrawList::new(),
            scene_dirty: true,
            heights_stale: true,
            lighting_stale: true,
            camera: Camera::default(),
        })
    }

    /// Advance one frame and render it into the output texture.
    pub fn frame(&mut self) -> Result<FrameReport, AppError> {
        let mut report = FrameReport::default();

        if self.terrain.update()? {
            self.heights_stale = true;
        }
        report.erosion_progress = self.terrain.progress_text();

        if self.heights_stale {
            self.upload_heights()?;
            report.heights_changed = true;
        }
        self.terrain_mesh
            .refresh_bindings(&self.gpu.device, &self.height_texture);

        self.draw_list.clear();
        self.draw_list
            .push(self.terrain.model_transform(), self.terrain_mesh.program());

        // An uninitialized voxelizer leaves the scene dirty and skips both
        // voxelization and the lighting pass; the prepass still runs.
        let voxels_ready = self.voxelizer.is_initialized();
        if self.scene_dirty && !voxels_ready {
            log::debug!("Voxelizer uninitialized, skipping voxelization");
        }
        if self.scene_dirty && voxels_ready {
            let (transforms, programs) = self.draw_list.split();
            let mesh = &self.terrain_mesh;
            let voxelized = self.voxelizer.voxelize(
                |backend| mesh.draw_voxelize(backend),
                &transforms,
                &programs,
            )?;
            self.scene_dirty = false;
            report.voxelize = Some(voxelized);
        }

        if self.lighting_stale && voxels_ready {
            self.rebind_lighting()?;
        }

        let (width, height) = self.gbuffer.size();
        let view = self.camera.view();
        let projection = self.camera.projection(width, height);
        self.set_gbuffer_uniforms(view, projection);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame"),
            });
        {
            let mut pass = self.gbuffer.begin_prepass(&mut encoder);
            self.terrain_mesh
                .draw_gbuffer(&mut pass, self.voxelizer.backend());
        }

        if voxels_ready && !self.lighting_stale {
            let uniforms = self.config.lighting.uniforms(
                projection * view,
                self.camera.eye_position(),
                self.voxelizer.params(),
                self.voxelizer.mip_level_count(),
            );
            self.lighting.update(&self.gpu.queue, &uniforms);
            self.lighting.run(&mut encoder, &self.output_view)?;
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(report)
    }

    fn upload_heights(&mut self) -> Result<(), AppError> {
        let field = self.terrain.heightfield();
        self.height_texture.upload(
            &self.gpu.device,
            &self.gpu.queue,
            field.values(),
            field.width() as u32,
            field.height() as u32,
        )?;
        self.heights_stale = false;
        self.scene_dirty = true;
        Ok(())
    }

    fn rebind_lighting(&mut self) -> Result<(), AppError> {
        let volumes = self.voxelizer.volumes().ok_or(RenderError::NotInitialized)?;
        let backend = self.voxelizer.backend();
        let views = volumes
            .handles
            .map(|handle| backend.volume_view(handle));
        let [Some(normal), Some(albedo), Some(emissive)] = views else {
            log::error!("Voxel volume views missing for allocated handles");
            return Err(RenderError::NotInitialized.into());
        };
        self.lighting
            .bind(&self.gpu.device, &self.gbuffer, [normal, albedo, emissive])?;
        self.lighting_stale = false;
        Ok(())
    }

    /// Per-drawable uniforms for the prepass; overwrites the voxelize values.
    fn set_gbuffer_uniforms(&mut self, view: Mat4, projection: Mat4) {
        let backend = self.voxelizer.backend_mut();
        for item in self.draw_list.items() {
            let program = item.program;
            backend.set_uniform(program, "model_matrix", UniformValue::Mat4(item.transform));
            backend.set_uniform(program, "view_matrix", UniformValue::Mat4(view));
            backend.set_uniform(program, "projection_matrix", UniformValue::Mat4(projection));
            backend.set_uniform(
                program,
                "model_view_matrix",
                UniformValue::Mat4(view * item.transform),
            );
            backend.set_uniform(
                program,
                "render_mode",
                UniformValue::Int(RenderMode::GBuffer.as_uniform()),
            );
        }
        backend.flush_uniforms();
    }

    /// Reallocate the voxel volumes. The next frame re-voxelizes.
    /// On failure the voxelizer stays uninitialized and frames skip
    /// voxelization and lighting until a later call succeeds.
    pub fn set_voxel_resolution(&mut self, resolution: u32) -> Result<(), AppError> {
        self.lighting_stale = true;
        self.scene_dirty = true;
        self.voxelizer.set_resolution(resolution)?;
        self.config.voxels.resolution = resolution;
        Ok(())
    }

    pub fn set_voxel_world_size(&mut self, world_size: f32) {
        self.voxelizer.set_world_size(world_size);
        self.config.voxels.world_size = world_size;
        self.scene_dirty = true;
    }

    pub fn set_voxel_center(&mut self, center: Vec3) {
        self.voxelizer.set_center(center);
        self.config.voxels.center = center;
        self.scene_dirty = true;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.gbuffer.size() {
            return;
        }
        self.gbuffer.resize(&self.gpu.device, width, height);
        let (output, output_view) = create_output(&self.gpu.device, width, height);
        self.output = output;
        self.output_view = output_view;
        self.voxelizer.backend_mut().set_viewport(Viewport {
            x: 0,
            y: 0,
            width,
            height,
        });
        self.config.width = width;
        self.config.height = height;
        self.lighting_stale = true;
    }

    /// Fresh noise plus one batch erosion.
    pub fn regenerate(&mut self) -> Result<(), AppError> {
        self.terrain.regenerate_and_erode()?;
        self.heights_stale = true;
        Ok(())
    }

    pub fn apply_erosion(&mut self) -> Result<(), AppError> {
        self.terrain.apply_erosion()?;
        self.heights_stale = true;
        Ok(())
    }

    pub fn start_realtime_erosion(&mut self) -> Result<(), AppError> {
        self.terrain.start_realtime_erosion()?;
        Ok(())
    }

    pub fn abort_erosion(&mut self) {
        self.terrain.abort_erosion();
    }

    /// Resize the heightfield. Aborts any running erosion.
    pub fn set_terrain_size(&mut self, size: usize) -> Result<(), AppError> {
        self.terrain.resize(size)?;
        self.heights_stale = true;
        Ok(())
    }

    pub fn set_terrain_subdivisions(&mut self, subdivisions: u32) {
        self.terrain_mesh
            .set_subdivisions(&self.gpu.device, subdivisions);
        self.terrain_mesh
            .update_uniforms(&self.gpu.queue, self.terrain.settings());
        self.scene_dirty = true;
    }

    /// Render one Z slice of a voxel channel. The result is readable from
    /// `debug_slice_view`.
    pub fn render_debug_slice(&mut self, slice: u32, channel: VoxelChannel) -> Result<(), AppError> {
        self.voxelizer.render_debug_slice(slice, channel)?;
        Ok(())
    }

    pub fn debug_slice_view(&self) -> Option<&wgpu::TextureView> {
        self.voxelizer.backend().slice_target_view()
    }

    pub fn mark_scene_dirty(&mut self) {
        self.scene_dirty = true;
    }

    pub fn is_scene_dirty(&self) -> bool {
        self.scene_dirty
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn voxelizer(&self) -> &Voxelizer<WgpuBackend> {
        &self.voxelizer
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn output_view(&self) -> &wgpu::TextureView {
        &self.output_view
    }
}

#[cfg(all(test, feature = "gpu_tests"))]
mod tests {
    use super::*;
    use terravox_render::VoxelParams;
    use terravox_terrain::{ErosionSettings, TerrainSettings};

    fn small_context() -> Option<AppContext> {
        context_with_resolution(16)
    }

    fn context_with_resolution(resolution: u32) -> Option<AppContext> {
        let gpu = pollster::block_on(crate::gpu::init_headless()).ok()?;
        let config = AppConfig {
            width: 64,
            height: 64,
            noise_preset: None,
            terrain: TerrainSettings {
                size: 32,
                subdivisions: 16,
                ..Default::default()
            },
            erosion: ErosionSettings {
                iterations: 200,
                particles_per_frame: 100,
                ..Default::default()
            },
            voxels: VoxelParams {
                resolution,
                ..Default::default()
            },
            ..Default::default()
        };
        AppContext::new(gpu, config).ok()
    }

    #[test]
    fn test_voxelizes_only_when_dirty() {
        let Some(mut app) = small_context() else {
            eprintln!("no adapter, skipping");
            return;
        };
        let first = app.frame().expect("first frame");
        assert!(first.heights_changed);
        let voxelized = first.voxelize.expect("first frame voxelizes");
        assert_eq!(voxelized.geometry_passes, 12);
        assert_eq!(voxelized.gpu_error, None);

        let second = app.frame().expect("second frame");
        assert!(!second.heights_changed);
        assert!(second.voxelize.is_none());
    }

    #[test]
    fn test_realtime_erosion_redirties_scene() {
        let Some(mut app) = small_context() else {
            eprintln!("no adapter, skipping");
            return;
        };
        app.frame().expect("first frame");
        app.start_realtime_erosion().expect("start");

        let report = app.frame().expect("eroding frame");
        assert!(report.heights_changed);
        assert!(report.voxelize.is_some());
        assert!(report.erosion_progress.is_some());
    }

    #[test]
    fn test_resolution_change_rebinds() {
        let Some(mut app) = small_context() else {
            eprintln!("no adapter, skipping");
            return;
        };
        app.frame().expect("first frame");
        app.set_voxel_resolution(32).expect("realloc");
        assert!(app.is_scene_dirty());
        let report = app.frame().expect("frame after realloc");
        assert!(report.voxelize.is_some());
        assert_eq!(app.voxelizer().resolution(), 32);
        assert!(app.set_voxel_resolution(33).is_err());
    }

    #[test]
    fn test_uninitialized_voxelizer_keeps_frames_running() {
        let Some(mut app) = context_with_resolution(33) else {
            eprintln!("no adapter, skipping");
            return;
        };
        assert!(!app.voxelizer().is_initialized());

        for _ in 0..2 {
            let report = app.frame().expect("frame without voxels");
            assert!(report.voxelize.is_none());
            assert!(app.is_scene_dirty());
        }

        app.set_voxel_resolution(16).expect("recover");
        let report = app.frame().expect("frame after recovery");
        assert!(report.voxelize.is_some());
        assert!(!app.is_scene_dirty());
    }
}
