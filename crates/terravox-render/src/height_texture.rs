use terravox_core::math::quantize_unorm16;

use crate::error::RenderError;

/// GPU mirror of the terrain heightfield, sampled by the terrain vertex
/// shader with `textureLoad`.
pub struct HeightTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    /// Bumped whenever the texture is recreated, so dependent bind groups
    /// know to rebuild.
    generation: u64,
}

/// 16-bit normalized when the device supports it, 32-bit float otherwise.
pub fn height_format(features: wgpu::Features) -> wgpu::TextureFormat {
    if features.contains(wgpu::Features::TEXTURE_FORMAT_16BIT_NORM) {
        wgpu::TextureFormat::R16Unorm
    } else {
        wgpu::TextureFormat::R32Float
    }
}

/// Texel bytes for `heights` in `format`. Heights are clamped to [0, 1].
pub fn encode_heights(heights: &[f32], format: wgpu::TextureFormat) -> Vec<u8> {
    match format {
        wgpu::TextureFormat::R16Unorm => {
            let texels: Vec<u16> = heights.iter().map(|&h| quantize_unorm16(h)).collect();
            bytemuck::cast_slice(&texels).to_vec()
        }
        _ => {
            let texels: Vec<f32> = heights.iter().map(|h| h.clamp(0.0, 1.0)).collect();
            bytemuck::cast_slice(&texels).to_vec()
        }
    }
}

fn bytes_per_texel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::R16Unorm => 2,
        _ => 4,
    }
}

impl HeightTexture {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let format = height_format(device.features());
        let (texture, view) = Self::create(device, format, width, height);
        Self {
            texture,
            view,
            format,
            width,
            height,
            generation: 0,
        }
    }

    /// Layout entry for binding the height view with `textureLoad`.
    pub fn layout_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }
    }

    fn create(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("height-texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Replace the texture contents, recreating it when the size changed.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        heights: &[f32],
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        let expected = width as usize * height as usize;
        if heights.len() != expected {
            log::warn!(
                "Height texture upload rejected: {} values for {width}x{height}",
                heights.len()
            );
            return Err(RenderError::HeightDataMismatch {
                expected,
                actual: heights.len(),
            });
        }
        if (width, height) != (self.width, self.height) {
            let (texture, view) = Self::create(device, self.format, width, height);
            self.texture = texture;
            self.view = view;
            self.width = width;
            self.height = height;
            self.generation += 1;
        }

        let data = encode_heights(heights, self.format);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_texel(self.format)),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
