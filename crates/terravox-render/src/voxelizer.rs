//! Scene voxelization into three packed attribute volumes.
//!
//! Every drawable is rasterized orthographically along the X, Y and Z axes
//! with image stores writing into the volumes, repeated for four sub-texel
//! jitter offsets. The volumes are then mipmapped so cone tracing can sample
//! wider footprints at higher levels.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use terravox_core::constants::{
    DEFAULT_VOXEL_RESOLUTION, DEFAULT_VOXEL_WORLD_SIZE, VOXEL_FRUSTUM_MARGIN,
    VOXEL_GEOMETRY_PASSES, VOXEL_JITTER_TEXELS, VOXEL_VOLUME_COUNT,
};
use terravox_core::math::mip_level_count;
use terravox_core::types::RenderMode;
use terravox_core::{ProgramHandle, TextureHandle};

use crate::backend::{
    GpuBackend, ImageAccess, MemoryBarrier, RasterState, SliceParams, UniformValue,
    VolumeDescriptor, Viewport, VoxelChannel,
};
use crate::error::RenderError;

const VOLUME_LABELS: [&str; VOXEL_VOLUME_COUNT] = [
    "voxel-normal-smoothness",
    "voxel-albedo-emissive-factor",
    "voxel-emissive-metallic",
];

/// Jitter directions in texels, one per sample.
const JITTER_PATTERN: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)];

/// Spatial mapping of the voxel cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelParams {
    /// Cube edge in voxels. Non-zero power of two.
    pub resolution: u32,
    /// Cube edge in world units.
    pub world_size: f32,
    pub center: Vec3,
}

impl Default for VoxelParams {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_VOXEL_RESOLUTION,
            world_size: DEFAULT_VOXEL_WORLD_SIZE,
            center: Vec3::ZERO,
        }
    }
}

/// Handles of the three allocated volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelVolumes {
    /// normal+smoothness, albedo+emissive factor, emissive colour+metallic.
    pub handles: [TextureHandle; VOXEL_VOLUME_COUNT],
    pub resolution: u32,
    pub mip_levels: u32,
}

/// Outcome of one `voxelize` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoxelizeReport {
    pub geometry_passes: u32,
    pub draw_calls: u32,
    /// First GPU error captured during the call; the result may be incomplete.
    pub gpu_error: Option<String>,
}

fn validate_resolution(resolution: u32) -> Result<(), RenderError> {
    if resolution == 0 || !resolution.is_power_of_two() {
        return Err(RenderError::InvalidResolution(resolution));
    }
    Ok(())
}

/// Sub-texel jitter of sample `index`, in NDC units.
pub fn jitter_offset(index: usize, resolution: u32) -> (f32, f32) {
    let (dx, dy) = JITTER_PATTERN[index % JITTER_PATTERN.len()];
    let texel_ndc = 2.0 / resolution as f32;
    (
        dx * VOXEL_JITTER_TEXELS * texel_ndc,
        dy * VOXEL_JITTER_TEXELS * texel_ndc,
    )
}

/// Orthographic projection enclosing the cube plus a small margin.
pub fn voxel_projection(world_size: f32) -> Mat4 {
    let half = world_size * 0.5;
    let extent = half + world_size * VOXEL_FRUSTUM_MARGIN;
    Mat4::orthographic_rh(-extent, extent, -extent, extent, -2.0 * half, 2.0 * half)
}

/// Views looking down -X, -Y and -Z onto the cube center.
pub fn voxel_views(center: Vec3, world_size: f32) -> [Mat4; 3] {
    let half = world_size * 0.5;
    [
        Mat4::look_at_rh(center + Vec3::X * half, center, Vec3::Y),
        Mat4::look_at_rh(center + Vec3::Y * half, center, Vec3::Z),
        Mat4::look_at_rh(center + Vec3::Z * half, center, Vec3::Y),
    ]
}

/// Owns the attribute volumes and drives voxelization through a backend.
pub struct Voxelizer<B: GpuBackend> {
    backend: B,
    params: VoxelParams,
    volumes: Option<VoxelVolumes>,
}

impl<B: GpuBackend> Voxelizer<B> {
    /// Never fails: if allocation fails the voxelizer stays uninitialized and
    /// every GPU operation reports `NotInitialized` until `set_resolution`
    /// succeeds.
    pub fn new(backend: B, params: VoxelParams) -> Self {
        let mut voxelizer = Self {
            backend,
            params,
            volumes: None,
        };
        match voxelizer.allocate(params.resolution) {
            Ok(volumes) => voxelizer.volumes = Some(volumes),
            Err(e) => log::error!("Voxelizer initialization failed: {e}"),
        }
        voxelizer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn params(&self) -> &VoxelParams {
        &self.params
    }

    pub fn is_initialized(&self) -> bool {
        self.volumes.is_some()
    }

    pub fn volumes(&self) -> Option<&VoxelVolumes> {
        self.volumes.as_ref()
    }

    pub fn resolution(&self) -> u32 {
        self.params.resolution
    }

    pub fn mip_level_count(&self) -> u32 {
        mip_level_count(self.params.resolution)
    }

    /// Release the current volumes and allocate new ones at `resolution`.
    /// On failure the voxelizer is left uninitialized.
    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), RenderError> {
        validate_resolution(resolution)?;
        self.release();
        self.params.resolution = resolution;
        let volumes = self.allocate(resolution).inspect_err(|e| {
            log::error!("Voxel volume reallocation failed: {e}");
        })?;
        self.volumes = Some(volumes);
        Ok(())
    }

    pub fn set_world_size(&mut self, world_size: f32) {
        self.params.world_size = world_size;
    }

    pub fn set_center(&mut self, center: Vec3) {
        self.params.center = center;
    }

    /// Re-rasterize the whole scene into the volumes and rebuild their mips.
    ///
    /// `draw` is called once per geometry pass and must draw every drawable;
    /// `transforms[i]` and `programs[i]` describe drawable `i`. Each program
    /// holds one drawable's uniforms.
    pub fn voxelize<F>(
        &mut self,
        mut draw: F,
        transforms: &[Mat4],
        programs: &[ProgramHandle],
    ) -> Result<VoxelizeReport, RenderError>
    where
        F: FnMut(&mut B),
    {
        if transforms.len() != programs.len() {
            return Err(RenderError::DrawListMismatch {
                transforms: transforms.len(),
                programs: programs.len(),
            });
        }
        let Some(volumes) = self.volumes else {
            log::error!("voxelize called before voxel volumes were allocated");
            return Err(RenderError::NotInitialized);
        };

        let resolution = volumes.resolution;
        let VoxelParams {
            world_size, center, ..
        } = self.params;

        self.backend.push_error_scope();

        for &handle in &volumes.handles {
            self.backend.clear_volume(handle);
        }

        let saved_viewport = self.backend.viewport();
        let saved_raster = self.backend.raster_state();
        self.backend.set_viewport(Viewport::square(resolution));
        self.backend.set_raster_state(RasterState::VOXELIZE);
        for (unit, &handle) in volumes.handles.iter().enumerate() {
            self.backend
                .bind_image(unit as u32, handle, ImageAccess::WriteOnly);
        }

        let projection = voxel_projection(world_size);
        let views = voxel_views(center, world_size);
        let mut report = VoxelizeReport::default();

        for sample in 0..JITTER_PATTERN.len() {
            let (jx, jy) = jitter_offset(sample, resolution);
            let jittered = Mat4::from_translation(Vec3::new(jx, jy, 0.0)) * projection;

            for (&model, &program) in transforms.iter().zip(programs) {
                let b = &mut self.backend;
                b.set_uniform(program, "voxel_center", UniformValue::Vec3(center));
                b.set_uniform(program, "model_matrix", UniformValue::Mat4(model));
                b.set_uniform(program, "projection_matrix", UniformValue::Mat4(jittered));
                b.set_uniform(program, "voxel_resolution", UniformValue::Int(resolution as i32));
                b.set_uniform(program, "voxel_world_size", UniformValue::Float(world_size));
                b.set_uniform(
                    program,
                    "render_mode",
                    UniformValue::Int(RenderMode::Voxelize.as_uniform()),
                );
            }

            for view in &views {
                for (&model, &program) in transforms.iter().zip(programs) {
                    self.backend
                        .set_uniform(program, "view_matrix", UniformValue::Mat4(*view));
                    self.backend.set_uniform(
                        program,
                        "model_view_matrix",
                        UniformValue::Mat4(*view * model),
                    );
                }
                self.backend.begin_pass("voxelize");
                draw(&mut self.backend);
                self.backend.end_pass();
                report.geometry_passes += 1;
                report.draw_calls += 1;
            }
        }
        debug_assert_eq!(report.geometry_passes, VOXEL_GEOMETRY_PASSES);

        self.backend.set_viewport(saved_viewport);
        self.backend.set_raster_state(saved_raster);
        self.backend.memory_barrier(MemoryBarrier::ShaderImageAccess);

        for &handle in &volumes.handles {
            self.backend.generate_mipmaps(handle);
        }

        report.gpu_error = self.backend.pop_error_scope();
        if let Some(err) = &report.gpu_error {
            log::warn!("GPU error during voxelization: {err}");
        }
        log::debug!(
            "Voxelized {} drawables in {} passes at {resolution}^3",
            transforms.len(),
            report.geometry_passes
        );
        Ok(report)
    }

    /// Draw one Z slice of a volume for inspection. `slice` is clamped to the
    /// volume depth.
    pub fn render_debug_slice(&mut self, slice: u32, channel: VoxelChannel) -> Result<(), RenderError> {
        let Some(volumes) = self.volumes else {
            log::error!("render_debug_slice called before voxel volumes were allocated");
            return Err(RenderError::NotInitialized);
        };
        let clamped = slice.min(volumes.resolution - 1);
        if clamped != slice {
            log::warn!("Debug slice {slice} clamped to {clamped}");
        }
        let params = SliceParams {
            slice: clamped,
            channel,
            resolution: volumes.resolution,
        };
        self.backend
            .draw_volume_slice(volumes.handles[channel.volume_index()], &params);
        Ok(())
    }

    fn allocate(&mut self, resolution: u32) -> Result<VoxelVolumes, RenderError> {
        validate_resolution(resolution)?;
        let mip_levels = mip_level_count(resolution);
        let mut handles = Vec::with_capacity(VOXEL_VOLUME_COUNT);
        for label in VOLUME_LABELS {
            let desc = VolumeDescriptor {
                label,
                resolution,
                mip_levels,
            };
            match self.backend.allocate_volume(&desc) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    for handle in handles {
                        self.backend.release_volume(handle);
                    }
                    return Err(e);
                }
            }
        }
        log::info!(
            "Allocated {VOXEL_VOLUME_COUNT} voxel volumes at {resolution}^3 ({mip_levels} mips)"
        );
        Ok(VoxelVolumes {
            handles: [handles[0], handles[1], handles[2]],
            resolution,
            mip_levels,
        })
    }

    fn release(&mut self) {
        if let Some(volumes) = self.volumes.take() {
            for handle in volumes.handles {
                self.backend.release_volume(handle);
            }
        }
    }
}

impl<B: GpuBackend> Drop for Voxelizer<B> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::{Command, RecordingBackend};

    fn params(resolution: u32) -> VoxelParams {
        VoxelParams {
            resolution,
            world_size: 30.0,
            center: Vec3::new(1.0, 2.0, 3.0),
        }
    }

    fn count(backend: &RecordingBackend, pred: impl Fn(&Command) -> bool) -> usize {
        backend.commands.iter().filter(|c| pred(c)).count()
    }

    #[test]
    fn test_new_allocates_three_volumes() {
        let voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        assert!(voxelizer.is_initialized());
        assert_eq!(voxelizer.backend().live_volumes(), 3);
        let volumes = voxelizer.volumes().expect("allocated");
        assert_eq!(volumes.mip_levels, 7);
    }

    #[test]
    fn test_resolution_round_trip() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(128));
        voxelizer.set_resolution(256).expect("256");
        voxelizer.set_resolution(512).expect("512");

        assert_eq!(voxelizer.resolution(), 512);
        assert_eq!(voxelizer.mip_level_count(), 10);
        let volumes = voxelizer.volumes().expect("allocated");
        assert_eq!(volumes.resolution, 512);
        assert_eq!(volumes.mip_levels, 10);
        // Old volumes released before each reallocation
        assert_eq!(voxelizer.backend().live_volumes(), 3);
        assert_eq!(
            count(voxelizer.backend(), |c| matches!(c, Command::Release(_))),
            6
        );
    }

    #[test]
    fn test_set_resolution_rejects_non_power_of_two() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        assert_eq!(
            voxelizer.set_resolution(300),
            Err(RenderError::InvalidResolution(300))
        );
        assert_eq!(voxelizer.set_resolution(0), Err(RenderError::InvalidResolution(0)));
        // Rejected before anything was released
        assert!(voxelizer.is_initialized());
        assert_eq!(voxelizer.resolution(), 64);
    }

    #[test]
    fn test_voxelize_without_volumes_draws_nothing() {
        let backend = RecordingBackend {
            fail_allocations: true,
            ..Default::default()
        };
        let mut voxelizer = Voxelizer::new(backend, params(64));
        assert!(!voxelizer.is_initialized());

        let mut draws = 0;
        let result = voxelizer.voxelize(
            |_| draws += 1,
            &[Mat4::IDENTITY],
            &[ProgramHandle(1)],
        );
        assert_eq!(result, Err(RenderError::NotInitialized));
        assert_eq!(draws, 0);
        assert_eq!(
            count(voxelizer.backend(), |c| matches!(c, Command::BeginPass(_))),
            0
        );
        assert_eq!(
            voxelizer.render_debug_slice(0, VoxelChannel::Albedo),
            Err(RenderError::NotInitialized)
        );
    }

    #[test]
    fn test_partial_allocation_is_released() {
        let backend = RecordingBackend {
            fail_after: Some(2),
            ..Default::default()
        };
        let voxelizer = Voxelizer::new(backend, params(64));
        assert!(!voxelizer.is_initialized());
        assert_eq!(voxelizer.backend().live_volumes(), 0);
    }

    #[test]
    fn test_set_resolution_recovers_after_failure() {
        let backend = RecordingBackend {
            fail_allocations: true,
            ..Default::default()
        };
        let mut voxelizer = Voxelizer::new(backend, params(64));
        voxelizer.backend_mut().fail_allocations = false;
        voxelizer.set_resolution(32).expect("retry succeeds");
        assert!(voxelizer.is_initialized());
        assert_eq!(voxelizer.mip_level_count(), 6);
    }

    #[test]
    fn test_voxelize_issues_twelve_passes() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let mut draws = 0;
        let report = voxelizer
            .voxelize(
                |b| {
                    b.record_draw();
                    draws += 1;
                },
                &[Mat4::IDENTITY, Mat4::from_scale(Vec3::splat(2.0))],
                &[ProgramHandle(1), ProgramHandle(2)],
            )
            .expect("initialized");

        assert_eq!(draws, 12);
        assert_eq!(report.geometry_passes, VOXEL_GEOMETRY_PASSES);
        assert_eq!(report.gpu_error, None);

        let b = voxelizer.backend();
        assert_eq!(count(b, |c| matches!(c, Command::BeginPass(_))), 12);
        assert_eq!(count(b, |c| matches!(c, Command::Draw)), 12);
        assert_eq!(count(b, |c| matches!(c, Command::Clear(_))), 3);
        assert_eq!(count(b, |c| matches!(c, Command::GenerateMipmaps(_))), 3);
    }

    #[test]
    fn test_voxelize_command_order() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        voxelizer.backend_mut().commands.clear();
        voxelizer
            .voxelize(|b| b.record_draw(), &[Mat4::IDENTITY], &[ProgramHandle(1)])
            .expect("initialized");

        let cmds = &voxelizer.backend().commands;
        let pos = |pred: &dyn Fn(&Command) -> bool| cmds.iter().position(pred).expect("present");
        let last = |pred: &dyn Fn(&Command) -> bool| cmds.iter().rposition(pred).expect("present");

        let first_clear = pos(&|c| matches!(c, Command::Clear(_)));
        let first_pass = pos(&|c| matches!(c, Command::BeginPass(_)));
        let last_pass = last(&|c| matches!(c, Command::EndPass));
        let barrier = pos(&|c| matches!(c, Command::Barrier(_)));
        let first_mip = pos(&|c| matches!(c, Command::GenerateMipmaps(_)));

        assert!(matches!(cmds[0], Command::PushErrorScope));
        assert!(first_clear < first_pass);
        assert!(last_pass < barrier);
        assert!(barrier < first_mip);
        assert!(matches!(cmds[cmds.len() - 1], Command::PopErrorScope));

        let binds = count(voxelizer.backend(), |c| {
            matches!(
                c,
                Command::BindImage {
                    access: ImageAccess::WriteOnly,
                    ..
                }
            )
        });
        assert_eq!(binds, 3);
    }

    #[test]
    fn test_voxelize_restores_viewport_and_raster() {
        let mut backend = RecordingBackend::default();
        let viewport = Viewport {
            x: 0,
            y: 0,
            width: 1280,
            height: 720,
        };
        backend.set_viewport(viewport);
        let mut voxelizer = Voxelizer::new(backend, params(64));

        let mut seen = Vec::new();
        voxelizer
            .voxelize(
                |b| seen.push((b.viewport(), b.raster_state())),
                &[Mat4::IDENTITY],
                &[ProgramHandle(1)],
            )
            .expect("initialized");

        assert!(seen
            .iter()
            .all(|&(v, r)| v == Viewport::square(64) && r == RasterState::VOXELIZE));
        assert_eq!(voxelizer.backend().viewport(), viewport);
        assert_eq!(voxelizer.backend().raster_state(), RasterState::DEFAULT);
    }

    #[test]
    fn test_voxelize_uniform_contract() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let model = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        voxelizer
            .voxelize(|_| {}, &[model], &[ProgramHandle(7)])
            .expect("initialized");

        let b = voxelizer.backend();
        for name in [
            "voxel_center",
            "model_matrix",
            "projection_matrix",
            "voxel_resolution",
            "voxel_world_size",
            "render_mode",
        ] {
            // Once per jitter sample
            assert_eq!(b.uniform_writes(ProgramHandle(7), name), 4, "{name}");
        }
        for name in ["view_matrix", "model_view_matrix"] {
            // Once per pass
            assert_eq!(b.uniform_writes(ProgramHandle(7), name), 12, "{name}");
        }
        assert_eq!(
            b.last_uniform(ProgramHandle(7), "render_mode"),
            Some(UniformValue::Int(0))
        );
        assert_eq!(
            b.last_uniform(ProgramHandle(7), "voxel_center"),
            Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
        let views = voxel_views(Vec3::new(1.0, 2.0, 3.0), 30.0);
        assert_eq!(
            b.last_uniform(ProgramHandle(7), "model_view_matrix"),
            Some(UniformValue::Mat4(views[2] * model))
        );
    }

    #[test]
    fn test_voxelize_rejects_mismatched_lists() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let before = voxelizer.backend().commands.len();
        let mut draws = 0;
        let result = voxelizer.voxelize(
            |_| draws += 1,
            &[Mat4::IDENTITY, Mat4::IDENTITY],
            &[ProgramHandle(1)],
        );
        assert_eq!(
            result,
            Err(RenderError::DrawListMismatch {
                transforms: 2,
                programs: 1
            })
        );
        assert_eq!(draws, 0);
        assert_eq!(voxelizer.backend().commands.len(), before);
    }

    #[test]
    fn test_gpu_error_is_reported_not_fatal() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        voxelizer.backend_mut().pending_error = Some("out of memory".to_string());
        let report = voxelizer
            .voxelize(|_| {}, &[], &[])
            .expect("errors are reported in the report");
        assert_eq!(report.gpu_error.as_deref(), Some("out of memory"));
        assert_eq!(report.geometry_passes, 12);
    }

    #[test]
    fn test_jitter_offsets() {
        let res = 512;
        let quarter_texel = 0.25 * 2.0 / res as f32;
        let offsets: Vec<(f32, f32)> = (0..4).map(|i| jitter_offset(i, res)).collect();
        assert_eq!(
            offsets,
            vec![
                (-quarter_texel, -quarter_texel),
                (quarter_texel, -quarter_texel),
                (-quarter_texel, quarter_texel),
                (quarter_texel, quarter_texel),
            ]
        );
    }

    #[test]
    fn test_projection_covers_cube() {
        let proj = voxel_projection(30.0);
        let views = voxel_views(Vec3::ZERO, 30.0);
        for view in views {
            for corner in [Vec3::splat(-15.0), Vec3::splat(15.0), Vec3::new(15.0, -15.0, 15.0)] {
                let ndc = proj.project_point3(view.transform_point3(corner));
                assert!(ndc.x.abs() < 1.0 && ndc.y.abs() < 1.0, "{ndc:?}");
                assert!(ndc.z > -1e-5 && ndc.z < 1.0 + 1e-5, "{ndc:?}");
            }
        }
    }

    #[test]
    fn test_projection_margin_is_fraction_of_world_size() {
        let proj = voxel_projection(30.0);
        let extent = 15.0 + 30.0 * VOXEL_FRUSTUM_MARGIN;
        let edge = proj.project_point3(Vec3::new(extent, -extent, 0.0));
        assert!((edge.x - 1.0).abs() < 1e-5 && (edge.y + 1.0).abs() < 1e-5, "{edge:?}");

        // Just past the cube face, inside the margin
        let views = voxel_views(Vec3::ZERO, 30.0);
        let ndc = proj.project_point3(views[2].transform_point3(Vec3::new(15.0 * 1.01, 0.0, 0.0)));
        assert!(ndc.x.abs() < 1.0, "{ndc:?}");
    }

    #[test]
    fn test_views_look_down_negative_axes() {
        let views = voxel_views(Vec3::ZERO, 30.0);
        let forward = |m: &Mat4| -m.row(2).truncate();
        assert!((forward(&views[0]) - Vec3::NEG_X).length() < 1e-5);
        assert!((forward(&views[1]) - Vec3::NEG_Y).length() < 1e-5);
        assert!((forward(&views[2]) - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_debug_slice_selects_volume_and_clamps() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let handles = voxelizer.volumes().expect("allocated").handles;
        voxelizer
            .render_debug_slice(100, VoxelChannel::EmissiveColor)
            .expect("initialized");

        let last = voxelizer.backend().commands.last().cloned();
        assert_eq!(
            last,
            Some(Command::DrawSlice {
                handle: handles[2],
                params: SliceParams {
                    slice: 63,
                    channel: VoxelChannel::EmissiveColor,
                    resolution: 64,
                },
            })
        );
    }

    #[test]
    fn test_world_size_and_center_apply_without_realloc() {
        let mut voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let allocations = voxelizer.backend().allocations();
        voxelizer.set_world_size(50.0);
        voxelizer.set_center(Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(voxelizer.params().world_size, 50.0);
        assert_eq!(voxelizer.params().center, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(voxelizer.backend().allocations(), allocations);
    }

    #[test]
    fn test_drop_releases_volumes() {
        let voxelizer = Voxelizer::new(RecordingBackend::default(), params(64));
        let releases = voxelizer.backend().release_counter();
        assert_eq!(releases.get(), 0);
        drop(voxelizer);
        assert_eq!(releases.get(), 3);
    }

    #[test]
    fn test_params_from_partial_ron() {
        let p: VoxelParams = ron::Options::default()
            .from_str("(resolution: 256)")
            .expect("parse");
        assert_eq!(p.resolution, 256);
        assert_eq!(p.world_size, DEFAULT_VOXEL_WORLD_SIZE);
    }
}
