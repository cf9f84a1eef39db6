//! The screen's framebuffer: a swapchain plus optional depth/stencil.
//!
//! One frame is acquired lazily on the first clear or pass of a draw cycle
//! and handed back by `present`. Canvas passes borrowing this target always
//! load the existing contents; clearing happens once per frame through
//! `clear`.

use std::any::Any;
use std::sync::Arc;

use shoji_core::geometry::{Color, PixelExtent, PixelRect};
use shoji_core::surface::{FramebufferCaps, SurfaceBinding, SurfaceError};

use crate::{to_wgpu_color, GpuContext};

pub struct ScreenTarget {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    depth_format: Option<wgpu::TextureFormat>,
    has_stencil: bool,
    depth_view: Option<wgpu::TextureView>,
    viewport: Option<PixelRect>,
    frame: Option<wgpu::SurfaceTexture>,
    frame_view: Option<wgpu::TextureView>,
    encoder: Option<wgpu::CommandEncoder>,
    pass: Option<wgpu::RenderPass<'static>>,
}

impl ScreenTarget {
    /// Wraps an already-created window surface. The configuration gains
    /// `COPY_DST` usage so offscreen canvases can blit into the frame.
    pub fn new(
        context: &GpuContext,
        surface: wgpu::Surface<'static>,
        mut config: wgpu::SurfaceConfiguration,
        caps: FramebufferCaps,
    ) -> Self {
        config.usage |= wgpu::TextureUsages::COPY_DST;
        surface.configure(&context.device, &config);
        let depth_format = crate::depth_format(caps.depth, caps.stencil);
        let depth_view = depth_format.map(|format| {
            Self::create_depth(&context.device, format, config.width, config.height)
        });
        Self {
            device: context.device.clone(),
            queue: context.queue.clone(),
            surface,
            config,
            depth_format,
            has_stencil: caps.stencil,
            depth_view,
            viewport: None,
            frame: None,
            frame_view: None,
            encoder: None,
            pass: None,
        }
    }

    fn create_depth(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Screen Depth"),
                size: wgpu::Extent3d {
                    width: width.max(1),
                    height: height.max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Acquires the frame for this draw cycle, reconfiguring once on a lost
    /// or outdated swapchain.
    fn acquire(&mut self) -> Result<(), SurfaceError> {
        if self.frame.is_some() {
            return Ok(());
        }
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface
                    .get_current_texture()
                    .map_err(|err| SurfaceError::Pass {
                        reason: format!("swapchain acquisition failed: {err}"),
                    })?
            }
            Err(err) => {
                return Err(SurfaceError::Pass {
                    reason: format!("swapchain acquisition failed: {err}"),
                });
            }
        };
        self.frame_view = Some(
            frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        self.frame = Some(frame);
        Ok(())
    }

    pub(crate) fn copy_dst_texture(&mut self) -> Option<&wgpu::Texture> {
        if let Err(err) = self.acquire() {
            log::error!("blit destination unavailable: {err}");
            return None;
        }
        self.frame.as_ref().map(|frame| &frame.texture)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// The open render pass, available between `begin_pass` and `end_pass`.
    pub fn pass_mut(&mut self) -> Option<&mut wgpu::RenderPass<'static>> {
        self.pass.as_mut()
    }

    /// The acquired frame's view, for renderers that draw outside the
    /// surface pass protocol.
    pub fn frame_view(&mut self) -> Result<&wgpu::TextureView, SurfaceError> {
        self.acquire()?;
        self.frame_view.as_ref().ok_or(SurfaceError::Pass {
            reason: String::from("no frame acquired"),
        })
    }

    fn depth_stencil_attachment(
        &self,
        clear: bool,
    ) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        self.depth_view
            .as_ref()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: self.has_stencil.then_some(wgpu::Operations {
                    load: if clear {
                        wgpu::LoadOp::Clear(0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
            })
    }
}

impl SurfaceBinding for ScreenTarget {
    fn extent(&self) -> PixelExtent {
        PixelExtent::new(self.config.width, self.config.height)
    }

    fn resize(&mut self, extent: PixelExtent) {
        if extent.is_empty()
            || (extent.width == self.config.width && extent.height == self.config.height)
        {
            return;
        }
        self.config.width = extent.width;
        self.config.height = extent.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = self
            .depth_format
            .map(|format| Self::create_depth(&self.device, format, extent.width, extent.height));
        // Any frame acquired against the old configuration is stale.
        self.frame = None;
        self.frame_view = None;
    }

    // Whole-frame clears take their color explicitly through `clear`; canvas
    // passes on this target never clear.
    fn set_clear_color(&mut self, _color: Color) {}

    fn set_viewport(&mut self, viewport: Option<PixelRect>) {
        self.viewport = viewport;
    }

    fn clear(&mut self, color: Color) {
        if let Err(err) = self.acquire() {
            log::error!("screen clear skipped: {err}");
            return;
        }
        let Some(view) = self.frame_view.as_ref() else {
            return;
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Screen Clear Encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Screen Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(to_wgpu_color(color)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: self.depth_stencil_attachment(true),
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
        self.acquire()?;
        let Some(view) = self.frame_view.as_ref() else {
            return Err(SurfaceError::Pass {
                reason: String::from("no frame acquired"),
            });
        };
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Screen Pass Encoder"),
            });
        // Borrowed canvas passes must never wipe the frame under the rest
        // of the UI, so the color attachment always loads.
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Screen Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: self.depth_stencil_attachment(false),
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
        _src: PixelRect,
        _dst: &mut dyn SurfaceBinding,
        _dst_origin: (i32, i32),
    ) -> Result<(), SurfaceError> {
        // The swapchain is a copy destination, never a source.
        Err(SurfaceError::IncompatibleBlitTarget)
    }

    fn present(&mut self) {
        self.frame_view = None;
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
