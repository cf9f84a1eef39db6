//! Private render target for canvases the swapchain cannot satisfy.

use std::any::Any;
use std::sync::Arc;

use shoji_core::geometry::{Color, PixelExtent, PixelRect};
use shoji_core::surface::{ClearPolicy, SurfaceBinding, SurfaceError, SurfaceSpec};

use crate::{copy_target, to_wgpu_color, GpuContext};

struct Attachments {
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    /// Single-sample resolve target when the color texture is multisampled;
    /// also the texture blits copy from.
    resolve: Option<(wgpu::Texture, wgpu::TextureView)>,
    depth_view: Option<wgpu::TextureView>,
}

pub struct OffscreenSurface {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    format: wgpu::TextureFormat,
    samples: u32,
    depth_format: Option<wgpu::TextureFormat>,
    has_stencil: bool,
    clear_policy: ClearPolicy,
    clear_color: wgpu::Color,
    extent: PixelExtent,
    viewport: Option<PixelRect>,
    attachments: Attachments,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
}

impl OffscreenSurface {
    pub fn new(context: &GpuContext, spec: &SurfaceSpec) -> Self {
        let samples = spec.samples.max(1);
        let depth_format = crate::depth_format(spec.depth, spec.stencil);
        let extent = PixelExtent::new(spec.extent.width.max(1), spec.extent.height.max(1));
        let attachments = Self::allocate(
            &context.device,
            context.format,
            samples,
            depth_format,
            extent,
        );
        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            format: context.format,
            samples,
            depth_format,
            has_stencil: spec.stencil,
            clear_policy: spec.clear,
            clear_color: wgpu::Color::BLACK,
            extent,
            viewport: None,
            attachments,
            encoder: None,
            pass: None,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        samples: u32,
        depth_format: Option<wgpu::TextureFormat>,
        extent: PixelExtent,
    ) -> Attachments {
        let size = wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        };
        let mut color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if samples == 1 {
            color_usage |= wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST;
        }
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Canvas Color"),
            size,
            mip_level_count: 1,
            sample_count: samples,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: color_usage,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let resolve = (samples > 1).then(|| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Canvas Resolve"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::COPY_SRC
                    | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        });

        let depth_view = depth_format.map(|format| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("Canvas Depth"),
                    size,
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });

        Attachments {
            color,
            color_view,
            resolve,
            depth_view,
        }
    }

    /// The single-sample texture blits copy out of.
    pub(crate) fn copy_src_texture(&self) -> &wgpu::Texture {
        match &self.attachments.resolve {
            Some((texture, _)) => texture,
            None => &self.attachments.color,
        }
    }

    /// The texture other surfaces may copy into.
    pub(crate) fn copy_dst_texture(&self) -> &wgpu::Texture {
        self.copy_src_texture()
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// The open render pass, available between `begin_pass` and `end_pass`.
    pub fn pass_mut(&mut self) -> Option<&mut wgpu::RenderPass<'static>> {
        self.pass.as_mut()
    }

    fn depth_stencil_attachment(&self) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        self.attachments.depth_view.as_ref().map(|view| {
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: self.has_stencil.then_some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }
        })
    }
}

impl SurfaceBinding for OffscreenSurface {
    fn extent(&self) -> PixelExtent {
        self.extent
    }

    fn resize(&mut self, extent: PixelExtent) {
        if extent == self.extent || extent.is_empty() {
            return;
        }
        self.extent = extent;
        self.attachments = Self::allocate(
            &self.device,
            self.format,
            self.samples,
            self.depth_format,
            extent,
        );
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = to_wgpu_color(color);
    }

    fn set_viewport(&mut self, viewport: Option<PixelRect>) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Canvas Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.attachments.color_view,
                depth_slice: None,
                resolve_target: self.attachments.resolve.as_ref().map(|(_, view)| view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(to_wgpu_color(color)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: self.depth_stencil_attachment(),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn begin_pass(&mut self) -> Result<(), SurfaceError> {
        if self.pass.is_some() {
            return Err(SurfaceError::Pass {
                reason: String::from("a pass is already open"),
            });
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Encoder"),
            });
        let load = match self.clear_policy {
            ClearPolicy::Clear => wgpu::LoadOp::Clear(self.clear_color),
            ClearPolicy::Load => wgpu::LoadOp::Load,
        };
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.attachments.color_view,
                    depth_slice: None,
                    resolve_target: self.attachments.resolve.as_ref().map(|(_, view)| view),
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth_stencil_attachment(),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();
        if let Some(viewport) = self.viewport {
            pass.set_viewport(
                viewport.x as f32,
                viewport.y as f32,
                viewport.width as f32,
                viewport.height as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(
                viewport.x.max(0) as u32,
                viewport.y.max(0) as u32,
                viewport.width,
                viewport.height,
            );
        }
        self.pass = Some(pass);
        self.encoder = Some(encoder);
        Ok(())
    }

    fn end_pass(&mut self) {
        self.pass = None;
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn blit_to(
        &mut self,
        src: PixelRect,
        dst: &mut dyn SurfaceBinding,
        dst_origin: (i32, i32),
    ) -> Result<(), SurfaceError> {
        if src.width == 0 || src.height == 0 {
            return Ok(());
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Blit Encoder"),
            });
        {
            let target = copy_target(dst).ok_or(SurfaceError::IncompatibleBlitTarget)?;
            encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: self.copy_src_texture(),
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: src.x.max(0) as u32,
                        y: src.y.max(0) as u32,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: target,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: dst_origin.0.max(0) as u32,
                        y: dst_origin.1.max(0) as u32,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: src.width,
                    height: src.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
