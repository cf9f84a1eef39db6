//! WGPU implementations of the shoji surface contracts.
//!
//! [`ScreenTarget`] binds a window's swapchain; [`OffscreenSurface`] backs
//! canvases that need multisampling or attachments the swapchain lacks.
//! Canvas draw hooks recover the concrete type through
//! `SurfaceBinding::as_any_mut` to record real GPU work into the open pass.

mod offscreen;
mod screen_target;

use std::sync::Arc;

use shoji_core::surface::{SurfaceBinding, SurfaceError, SurfaceFactory, SurfaceSpec};

pub use offscreen::OffscreenSurface;
pub use screen_target::ScreenTarget;

/// Shared device handles every surface hangs off.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Color format all targets share, so blits are plain texture copies.
    pub format: wgpu::TextureFormat,
}

impl GpuContext {
    /// Requests an adapter and device compatible with `surface`, preferring
    /// an sRGB swapchain format.
    pub fn initialize(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<Self, SurfaceError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| SurfaceError::Creation {
            reason: format!("no suitable adapter: {err}"),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Shoji Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| SurfaceError::Creation {
            reason: format!("device request failed: {err}"),
        })?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(caps.formats[0]);

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            format,
        })
    }
}

/// Creates offscreen surfaces for canvases.
pub struct WgpuSurfaceFactory {
    context: GpuContext,
}

impl WgpuSurfaceFactory {
    pub fn new(context: GpuContext) -> Self {
        Self { context }
    }
}

impl SurfaceFactory for WgpuSurfaceFactory {
    fn create_surface(
        &mut self,
        spec: &SurfaceSpec,
    ) -> Result<Box<dyn SurfaceBinding>, SurfaceError> {
        Ok(Box::new(OffscreenSurface::new(&self.context, spec)))
    }
}

pub(crate) fn depth_format(depth: bool, stencil: bool) -> Option<wgpu::TextureFormat> {
    match (depth, stencil) {
        (false, _) => None,
        (true, false) => Some(wgpu::TextureFormat::Depth24Plus),
        (true, true) => Some(wgpu::TextureFormat::Depth24PlusStencil8),
    }
}

pub(crate) fn to_wgpu_color(color: shoji_core::Color) -> wgpu::Color {
    wgpu::Color {
        r: color.r as f64,
        g: color.g as f64,
        b: color.b as f64,
        a: color.a as f64,
    }
}

/// Resolves a dynamic blit destination to its copyable texture.
pub(crate) fn copy_target(dst: &mut dyn SurfaceBinding) -> Option<&wgpu::Texture> {
    let any = dst.as_any_mut();
    if any.is::<OffscreenSurface>() {
        return any
            .downcast_mut::<OffscreenSurface>()
            .map(|surface| surface.copy_dst_texture());
    }
    if let Some(target) = any.downcast_mut::<ScreenTarget>() {
        return target.copy_dst_texture();
    }
    None
}
