//! Render-target abstraction for the render-to-texture path.
//!
//! A [`SurfaceBinding`] is a color target with optional depth/stencil
//! attachments. The screen's framebuffer and canvas-owned offscreen textures
//! implement the same trait, which is exactly the surface the compositing
//! protocol needs: resize (idempotent), clear policy, begin/end pass, blit.

use std::any::Any;

use crate::geometry::{Color, PixelExtent, PixelRect};

/// What happens to the attachments when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearPolicy {
    /// Clear color (and depth/stencil, when present) at pass start.
    #[default]
    Clear,
    /// Keep existing contents.
    Load,
}

/// Construction parameters for an offscreen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSpec {
    pub extent: PixelExtent,
    pub samples: u32,
    pub depth: bool,
    pub stencil: bool,
    pub clear: ClearPolicy,
}

/// Attachments the screen framebuffer itself provides, consulted when a
/// canvas decides between borrowing it and allocating a private surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramebufferCaps {
    pub depth: bool,
    pub stencil: bool,
}

#[derive(Debug)]
pub enum SurfaceError {
    Creation { reason: String },
    Pass { reason: String },
    /// `blit_to` was handed a destination of an incompatible concrete type.
    IncompatibleBlitTarget,
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::Creation { reason } => write!(f, "surface creation failed: {reason}"),
            SurfaceError::Pass { reason } => write!(f, "render pass failed: {reason}"),
            SurfaceError::IncompatibleBlitTarget => {
                write!(f, "blit destination is not a compatible surface")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}

/// A GPU render target (color + optional depth/stencil).
pub trait SurfaceBinding {
    fn extent(&self) -> PixelExtent;

    /// Resizes the attachments. Must be a no-op when the extent is
    /// unchanged; attachments are reallocated, never the binding itself.
    fn resize(&mut self, extent: PixelExtent);

    fn set_clear_color(&mut self, color: Color);

    /// Restricts the next pass to a sub-rectangle of the target. Used by
    /// canvases borrowing the screen framebuffer.
    fn set_viewport(&mut self, viewport: Option<PixelRect>);

    /// Immediately clears the whole color target (and depth/stencil, when
    /// present) to the given color.
    fn clear(&mut self, color: Color);

    fn begin_pass(&mut self) -> Result<(), SurfaceError>;

    fn end_pass(&mut self);

    /// Copies `src` from this surface's color target into `dst` at
    /// `dst_origin` (both in pixels).
    fn blit_to(
        &mut self,
        src: PixelRect,
        dst: &mut dyn SurfaceBinding,
        dst_origin: (i32, i32),
    ) -> Result<(), SurfaceError>;

    /// Presents the target, for bindings that wrap a swapchain. Offscreen
    /// targets ignore this.
    fn present(&mut self) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Creates offscreen surfaces on behalf of canvases. Implemented by the GPU
/// backend; the screen owns one so widgets never see GPU types.
pub trait SurfaceFactory {
    fn create_surface(&mut self, spec: &SurfaceSpec) -> Result<Box<dyn SurfaceBinding>, SurfaceError>;
}
