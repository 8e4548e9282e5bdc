use std::sync::Arc;

use terravox_core::TerravoxError;
use wgpu::{
    Adapter, DeviceDescriptor, Features, Instance, InstanceDescriptor, InstanceFlags,
    PowerPreference, RequestAdapterOptions,
};

/// Device and queue shared by the voxelizer backend and the frame passes.
pub struct GpuContext {
    #[allow(dead_code)] // Kept for limit queries
    pub adapter: Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    pub backend: String,
}

/// Initialize a device without a surface.
///
/// Requests `TEXTURE_FORMAT_16BIT_NORM` when the adapter has it so the
/// height texture can use R16Unorm, and the adapter's own limits so large
/// voxel volumes fit.
pub async fn init_headless() -> Result<GpuContext, TerravoxError> {
    let instance = Instance::new(&InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: InstanceFlags::default(),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .ok_or_else(|| TerravoxError::AdapterNotFound("No GPU adapter found".into()))?;

    let adapter_info = adapter.get_info();
    let adapter_name = adapter_info.name.clone();
    let backend = format!("{:?}", adapter_info.backend);
    log::info!("Adapter: {} ({})", adapter_name, backend);

    let limits = adapter.limits();
    log::info!(
        "Max 3D texture dimension: {}",
        limits.max_texture_dimension_3d
    );

    let required_features = adapter.features() & Features::TEXTURE_FORMAT_16BIT_NORM;
    if required_features.is_empty() {
        log::warn!("R16Unorm unavailable, height texture falls back to R32Float");
    }

    let (device, queue) = adapter
        .request_device(
            &DeviceDescriptor {
                label: Some("terravox-device"),
                required_features,
                required_limits: limits,
                ..Default::default()
            },
            None,
        )
        .await
        .map_err(|e| TerravoxError::DeviceRequestFailed(format!("{e}")))?;

    Ok(GpuContext {
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
        adapter_name,
        backend,
    })
}

/// Run `build` inside a validation error scope. Any shader or pipeline
/// error it raises is returned as `ShaderCompilationFailed` instead of
/// reaching the uncaptured-error handler.
pub fn create_validated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, TerravoxError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => {
            log::error!("{label}: {err}");
            Err(TerravoxError::ShaderCompilationFailed(format!("{label}: {err}")))
        }
        None => Ok(value),
    }
}
