use terravox_core::constants::GBUFFER_ATTACHMENT_COUNT;

use crate::error::RenderError;

/// Attachment formats in binding order: position+metallic,
/// normal+smoothness, albedo+emissive factor, emissive colour+spare.
/// Must match the fragment outputs of `fs_gbuffer` in terrain.wgsl.
pub const GBUFFER_FORMATS: [wgpu::TextureFormat; GBUFFER_ATTACHMENT_COUNT] = [
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba16Float,
    wgpu::TextureFormat::Rgba8Unorm,
    wgpu::TextureFormat::Rgba8Unorm,
];

pub const GBUFFER_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

fn check_index(index: usize) -> Result<usize, RenderError> {
    if index < GBUFFER_ATTACHMENT_COUNT {
        Ok(index)
    } else {
        Err(RenderError::AttachmentIndex(index))
    }
}

/// Colour targets for a pipeline writing the G-buffer.
pub fn gbuffer_targets() -> [Option<wgpu::ColorTargetState>; GBUFFER_ATTACHMENT_COUNT] {
    GBUFFER_FORMATS.map(|format| {
        Some(wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })
    })
}

/// Deferred attribute buffer written by the prepass and read by lighting.
/// Recreated on resize.
pub struct GBuffer {
    views: Vec<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl GBuffer {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let (views, depth_view) = Self::create_targets(device, width, height);
        Self {
            views,
            depth_view,
            width,
            height,
        }
    }

    fn create_targets(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (Vec<wgpu::TextureView>, wgpu::TextureView) {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };
        let target = |label: &str, format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let labels = [
            "gbuffer-position-metallic",
            "gbuffer-normal-smoothness",
            "gbuffer-albedo-emissive-factor",
            "gbuffer-emissive",
        ];
        let views = labels
            .iter()
            .zip(GBUFFER_FORMATS)
            .map(|(label, format)| target(*label, format))
            .collect();
        let depth_view = target("gbuffer-depth", GBUFFER_DEPTH_FORMAT);
        (views, depth_view)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        let (views, depth_view) = Self::create_targets(device, width, height);
        self.views = views;
        self.depth_view = depth_view;
        self.width = width;
        self.height = height;
    }

    pub fn attachment(&self, index: usize) -> Result<&wgpu::TextureView, RenderError> {
        check_index(index).map(|i| &self.views[i])
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Open the prepass with every attachment cleared.
    pub fn begin_prepass<'e>(&self, encoder: &'e mut wgpu::CommandEncoder) -> wgpu::RenderPass<'e> {
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = self
            .views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gbuffer-prepass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}
