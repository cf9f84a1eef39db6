//! GPU canvas widget.
//!
//! A canvas hands its owner a raw render pass in the middle of the 2D frame.
//! Two compositing paths exist: either the canvas borrows the screen's own
//! framebuffer (cheap, viewport-restricted), or it owns a private offscreen
//! surface that is blitted into place afterwards. The private path is taken
//! only when the screen framebuffer cannot satisfy the canvas: multisampling
//! requested, or a depth/stencil attachment the screen lacks.

use crate::geometry::{Color, PixelExtent, PixelRect, Point, Rect, Size};
use crate::render::VectorRenderer;
use crate::surface::{
    ClearPolicy, FramebufferCaps, SurfaceBinding, SurfaceError, SurfaceFactory, SurfaceSpec,
};
use crate::widget::{DrawCx, DrawResult, Widget};

const BORDER_RADIUS: f32 = 2.0;

/// Errors raised while setting up a canvas, before any GPU resource exists.
#[derive(Debug)]
pub enum CanvasError {
    /// A stencil attachment was requested without a depth attachment; the
    /// backends only provide packed depth-stencil formats.
    StencilRequiresDepth,
    Surface(SurfaceError),
}

impl std::fmt::Display for CanvasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanvasError::StencilRequiresDepth => {
                write!(f, "a canvas stencil buffer requires a depth buffer")
            }
            CanvasError::Surface(err) => write!(f, "canvas surface: {err}"),
        }
    }
}

impl std::error::Error for CanvasError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CanvasError::Surface(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SurfaceError> for CanvasError {
    fn from(err: SurfaceError) -> Self {
        CanvasError::Surface(err)
    }
}

/// Attachment requirements for a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasOptions {
    pub samples: u32,
    pub depth: bool,
    pub stencil: bool,
    /// Clear the target at the start of every canvas pass.
    pub clear: bool,
    /// Widget size the canvas (and a private surface, when one is needed)
    /// starts out with.
    pub initial_size: Size,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            samples: 1,
            depth: true,
            stencil: false,
            clear: true,
            initial_size: Size::new(250.0, 250.0),
        }
    }
}

/// Hook invoked each frame with the bound render target; the pass is already
/// open and the viewport set.
pub type CanvasDrawHook = Box<dyn FnMut(&mut dyn SurfaceBinding)>;

pub struct Canvas {
    surface: Option<Box<dyn SurfaceBinding>>,
    initial_size: Size,
    clear: bool,
    background: Color,
    border_color: Color,
    draw_border: bool,
    on_draw: Option<CanvasDrawHook>,
}

impl Canvas {
    /// Decides the compositing path and, for the private path, allocates the
    /// offscreen surface up front. Resource failures surface here, before
    /// the canvas ever enters a tree.
    pub fn new(
        screen_caps: FramebufferCaps,
        factory: &mut dyn SurfaceFactory,
        options: CanvasOptions,
    ) -> Result<Self, CanvasError> {
        if options.stencil && !options.depth {
            return Err(CanvasError::StencilRequiresDepth);
        }
        let needs_private = options.samples != 1
            || (options.depth && !screen_caps.depth)
            || (options.stencil && !screen_caps.stencil);
        let surface = if needs_private {
            let spec = SurfaceSpec {
                extent: PixelExtent::new(
                    options.initial_size.width.max(1.0) as u32,
                    options.initial_size.height.max(1.0) as u32,
                ),
                samples: options.samples,
                depth: options.depth,
                stencil: options.stencil,
                clear: if options.clear {
                    ClearPolicy::Clear
                } else {
                    ClearPolicy::Load
                },
            };
            Some(factory.create_surface(&spec)?)
        } else {
            None
        };
        Ok(Self {
            surface,
            initial_size: options.initial_size,
            clear: options.clear,
            background: Color::BLACK,
            border_color: Color::rgba(0.2, 0.2, 0.2, 1.0),
            draw_border: true,
            on_draw: None,
        })
    }

    /// Whether this canvas composites through a private offscreen surface.
    pub fn renders_to_texture(&self) -> bool {
        self.surface.is_some()
    }

    /// Widget size this canvas expects to start out with.
    pub fn initial_size(&self) -> Size {
        self.initial_size
    }

    pub fn background_color(&self) -> Color {
        self.background
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background = color;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_clear_color(color);
        }
    }

    pub fn set_draw_border(&mut self, draw_border: bool) {
        self.draw_border = draw_border;
    }

    pub fn set_border_color(&mut self, color: Color) {
        self.border_color = color;
    }

    pub fn set_on_draw(&mut self, hook: CanvasDrawHook) {
        self.on_draw = Some(hook);
    }
}

impl Widget for Canvas {
    fn draw(&mut self, cx: &mut DrawCx<'_>, vg: &mut dyn VectorRenderer) -> DrawResult {
        if self.surface.is_none() && self.clear {
            // The screen pass always loads the frame, so the canvas clear is
            // emulated with a 2D fill under the canvas region.
            let inset = if self.draw_border { 1.0 } else { 0.0 };
            vg.fill_rounded_rect(
                Rect::new(
                    cx.origin + Point::new(inset, inset),
                    Size::new(
                        cx.size.width - 2.0 * inset,
                        cx.size.height - 2.0 * inset,
                    ),
                ),
                0.0,
                self.background,
            );
        }
        // Submit everything batched so far; the canvas pass lands above it.
        vg.flush(cx.screen_size.width, cx.screen_size.height, cx.pixel_ratio);

        let mut offset = cx.origin;
        let mut size = cx.size;
        if self.draw_border {
            size.width -= 2.0;
            size.height -= 2.0;
        }
        if self.surface.is_none() {
            // Borrowing the screen framebuffer, whose origin is bottom-left.
            offset.y = cx.screen_size.height - cx.origin.y - cx.size.height;
        }
        if self.draw_border {
            offset += Point::new(1.0, 1.0);
        }

        let ratio = cx.pixel_ratio;
        let extent = PixelExtent::new(
            (size.width * ratio).max(0.0) as u32,
            (size.height * ratio).max(0.0) as u32,
        );
        let px = (offset.x * ratio) as i32;
        let py = (offset.y * ratio) as i32;

        if let Some(surface) = self.surface.as_mut() {
            surface.resize(extent);
            surface.begin_pass()?;
            if let Some(hook) = self.on_draw.as_mut() {
                hook(surface.as_mut());
            }
            surface.end_pass();
        } else {
            let screen = &mut *cx.screen_surface;
            screen.resize(cx.framebuffer_extent);
            screen.set_viewport(Some(PixelRect::new(px, py, extent.width, extent.height)));
            screen.begin_pass()?;
            if let Some(hook) = self.on_draw.as_mut() {
                hook(screen);
            }
            screen.end_pass();
            screen.set_viewport(None);
        }

        if self.draw_border {
            vg.stroke_rounded_rect(
                Rect::new(
                    cx.origin + Point::new(0.5, 0.5),
                    Size::new(cx.size.width - 1.0, cx.size.height - 1.0),
                ),
                BORDER_RADIUS,
                1.0,
                self.border_color,
            );
        }

        if let Some(surface) = self.surface.as_mut() {
            surface.blit_to(
                PixelRect::new(0, 0, extent.width, extent.height),
                cx.screen_surface,
                (px, py),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct SurfaceLog {
        created: Vec<SurfaceSpec>,
        resizes: Vec<PixelExtent>,
        passes: usize,
    }

    struct FakeSurface {
        extent: PixelExtent,
        log: Rc<RefCell<SurfaceLog>>,
    }

    impl SurfaceBinding for FakeSurface {
        fn extent(&self) -> PixelExtent {
            self.extent
        }

        fn resize(&mut self, extent: PixelExtent) {
            if extent != self.extent {
                self.extent = extent;
                self.log.borrow_mut().resizes.push(extent);
            }
        }

        fn set_clear_color(&mut self, _color: Color) {}

        fn set_viewport(&mut self, _viewport: Option<PixelRect>) {}

        fn clear(&mut self, _color: Color) {}

        fn begin_pass(&mut self) -> Result<(), SurfaceError> {
            self.log.borrow_mut().passes += 1;
            Ok(())
        }

        fn end_pass(&mut self) {}

        fn blit_to(
            &mut self,
            _src: PixelRect,
            _dst: &mut dyn SurfaceBinding,
            _dst_origin: (i32, i32),
        ) -> Result<(), SurfaceError> {
            Ok(())
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct FakeFactory {
        log: Rc<RefCell<SurfaceLog>>,
    }

    impl SurfaceFactory for FakeFactory {
        fn create_surface(
            &mut self,
            spec: &SurfaceSpec,
        ) -> Result<Box<dyn SurfaceBinding>, SurfaceError> {
            self.log.borrow_mut().created.push(*spec);
            Ok(Box::new(FakeSurface {
                extent: spec.extent,
                log: self.log.clone(),
            }))
        }
    }

    fn factory() -> (FakeFactory, Rc<RefCell<SurfaceLog>>) {
        let log = Rc::new(RefCell::new(SurfaceLog::default()));
        (FakeFactory { log: log.clone() }, log)
    }

    #[test]
    fn stencil_without_depth_fails_before_any_allocation() {
        let (mut factory, log) = factory();
        let result = Canvas::new(
            FramebufferCaps::default(),
            &mut factory,
            CanvasOptions {
                depth: false,
                stencil: true,
                ..CanvasOptions::default()
            },
        );
        assert!(matches!(result, Err(CanvasError::StencilRequiresDepth)));
        assert!(log.borrow().created.is_empty());
    }

    #[test]
    fn borrows_screen_when_caps_suffice() {
        let (mut factory, log) = factory();
        let caps = FramebufferCaps {
            depth: true,
            stencil: true,
        };
        let canvas = Canvas::new(caps, &mut factory, CanvasOptions::default()).unwrap();
        assert!(!canvas.renders_to_texture());
        assert!(log.borrow().created.is_empty());
    }

    #[test]
    fn multisampling_forces_private_surface() {
        let (mut factory, log) = factory();
        let caps = FramebufferCaps {
            depth: true,
            stencil: true,
        };
        let canvas = Canvas::new(
            caps,
            &mut factory,
            CanvasOptions {
                samples: 4,
                ..CanvasOptions::default()
            },
        )
        .unwrap();
        assert!(canvas.renders_to_texture());
        let log = log.borrow();
        assert_eq!(log.created.len(), 1);
        assert_eq!(log.created[0].samples, 4);
    }

    #[test]
    fn missing_screen_depth_forces_private_surface() {
        let (mut factory, _log) = factory();
        let caps = FramebufferCaps {
            depth: false,
            stencil: false,
        };
        let canvas = Canvas::new(caps, &mut factory, CanvasOptions::default()).unwrap();
        assert!(canvas.renders_to_texture());
    }
}
