//! Retained widget tree.
//!
//! Widgets live in an arena keyed by [`WidgetId`]: each node owns its child
//! list (a subtree dies with its parent) and keeps a non-owning parent id,
//! so no reference cycles exist. Child order is paint order; hit-testing
//! walks children in reverse so the widget drawn last is hit first.
//!
//! Behavior is a boxed [`Widget`] trait object per node. During dispatch the
//! behavior is taken out of the arena, handed an [`EventCx`] over the rest of
//! the tree, and put back afterwards — handlers get full tree access without
//! aliasing their own node. A handler returning `Err` is logged and treated
//! as unhandled; a single widget's failure never escapes the input loop.

use crate::event::{Cursor, KeyboardEvent, Modifiers, MouseButton, MouseButtons};
use crate::geometry::{PixelExtent, Point, Rect, Size};
use crate::render::VectorRenderer;
use crate::surface::SurfaceBinding;

pub type WidgetId = usize;

/// The root node of every tree (the screen itself).
pub const ROOT: WidgetId = 0;

/// Outcome of an event hook: `Ok(true)` when the widget consumed the event.
pub type EventResult = Result<bool, Box<dyn std::error::Error>>;

/// Outcome of a draw hook.
pub type DrawResult = Result<(), Box<dyn std::error::Error>>;

/// Errors raised by widget-tree structural operations.
#[derive(Debug)]
pub enum WidgetError {
    Missing { id: WidgetId },
    NotAWindow { id: WidgetId },
    RootRemoval,
}

impl std::fmt::Display for WidgetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetError::Missing { id } => write!(f, "widget {id} missing"),
            WidgetError::NotAWindow { id } => write!(f, "widget {id} is not a window"),
            WidgetError::RootRemoval => write!(f, "the root widget cannot be removed"),
        }
    }
}

impl std::error::Error for WidgetError {}

/// Structural role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Plain,
    /// Top-level window; while modal and on the focus path it confines
    /// pointer input to its own bounds.
    Window { modal: bool },
    /// Transient popup, z-order coupled to the window that spawned it.
    Popup { parent_window: WidgetId },
}

/// Actions a handler may ask the screen to perform once dispatch finishes.
///
/// Requests are queued rather than applied inline so handlers never reenter
/// the dispatcher mid-event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenRequest {
    Focus(Option<WidgetId>),
    Redraw,
    MoveToFront(WidgetId),
    DisposeWindow(WidgetId),
}

/// Per-widget behavior contract.
///
/// Every hook has a default no-op implementation; widgets override only what
/// they handle. Pointer positions are given in the widget's *parent*
/// coordinate space (subtract the widget's own position for local
/// coordinates), matching how hit-testing recurses.
#[allow(unused_variables)]
pub trait Widget {
    fn mouse_button_event(
        &mut self,
        cx: &mut EventCx<'_>,
        pos: Point,
        button: MouseButton,
        pressed: bool,
        modifiers: Modifiers,
    ) -> EventResult {
        Ok(false)
    }

    fn mouse_motion_event(
        &mut self,
        cx: &mut EventCx<'_>,
        pos: Point,
        rel: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
    ) -> EventResult {
        Ok(false)
    }

    /// Delivered exclusively to the drag target while a drag is active.
    fn mouse_drag_event(
        &mut self,
        cx: &mut EventCx<'_>,
        pos: Point,
        rel: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
    ) -> EventResult {
        Ok(false)
    }

    fn scroll_event(&mut self, cx: &mut EventCx<'_>, pos: Point, delta: Point) -> EventResult {
        Ok(false)
    }

    fn keyboard_event(&mut self, cx: &mut EventCx<'_>, event: &KeyboardEvent) -> EventResult {
        Ok(false)
    }

    fn character_event(&mut self, cx: &mut EventCx<'_>, codepoint: char) -> EventResult {
        Ok(false)
    }

    fn focus_event(&mut self, cx: &mut EventCx<'_>, focused: bool) -> EventResult {
        Ok(false)
    }

    fn resize_event(&mut self, cx: &mut EventCx<'_>, size: Size) -> EventResult {
        Ok(false)
    }

    fn draw(&mut self, cx: &mut DrawCx<'_>, vg: &mut dyn VectorRenderer) -> DrawResult {
        Ok(())
    }
}

/// Default behavior for nodes that only exist structurally (the root,
/// windows without custom logic).
pub struct EmptyWidget;

impl Widget for EmptyWidget {}

/// Tree access handed to a behavior while one of its hooks runs.
pub struct EventCx<'a> {
    pub tree: &'a mut WidgetTree,
    /// Id of the widget whose hook is running.
    pub widget: WidgetId,
    requests: &'a mut Vec<ScreenRequest>,
}

impl EventCx<'_> {
    pub fn request_focus(&mut self) {
        self.requests.push(ScreenRequest::Focus(Some(self.widget)));
    }

    pub fn clear_focus(&mut self) {
        self.requests.push(ScreenRequest::Focus(None));
    }

    pub fn request_redraw(&mut self) {
        self.requests.push(ScreenRequest::Redraw);
    }

    pub fn move_window_to_front(&mut self, window: WidgetId) {
        self.requests.push(ScreenRequest::MoveToFront(window));
    }

    pub fn dispose_window(&mut self, window: WidgetId) {
        self.requests.push(ScreenRequest::DisposeWindow(window));
    }
}

/// Screen-side context handed to `Widget::draw`.
pub struct DrawCx<'a> {
    /// Absolute (screen-space) origin of the widget being drawn.
    pub origin: Point,
    /// Size of the widget being drawn.
    pub size: Size,
    pub pixel_ratio: f32,
    /// Logical size of the owning screen.
    pub screen_size: Size,
    /// Physical size of the screen framebuffer.
    pub framebuffer_extent: PixelExtent,
    /// The screen's own framebuffer binding, for widgets that composite GPU
    /// content (canvas).
    pub screen_surface: &'a mut dyn SurfaceBinding,
}

struct WidgetNode {
    position: Point,
    size: Size,
    visible: bool,
    enabled: bool,
    cursor: Cursor,
    tooltip: String,
    focused: bool,
    kind: WidgetKind,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    // None only while the behavior is checked out for dispatch.
    behavior: Option<Box<dyn Widget>>,
}

/// Arena of widgets rooted at the screen node.
pub struct WidgetTree {
    nodes: Vec<Option<WidgetNode>>,
    free: Vec<WidgetId>,
}

impl WidgetTree {
    /// Creates a tree holding only the root (screen) node.
    pub fn new() -> Self {
        let root = WidgetNode {
            position: Point::ZERO,
            size: Size::ZERO,
            visible: true,
            enabled: true,
            cursor: Cursor::Arrow,
            tooltip: String::new(),
            focused: false,
            kind: WidgetKind::Plain,
            parent: None,
            children: Vec::new(),
            behavior: Some(Box::new(EmptyWidget)),
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, node: WidgetNode) -> WidgetId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn node(&self, id: WidgetId) -> Result<&WidgetNode, WidgetError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(WidgetError::Missing { id })
    }

    fn node_mut(&mut self, id: WidgetId) -> Result<&mut WidgetNode, WidgetError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(WidgetError::Missing { id })
    }

    pub fn exists(&self, id: WidgetId) -> bool {
        self.nodes.get(id).map_or(false, Option::is_some)
    }

    /// Adds a plain child widget under `parent`.
    pub fn add_child(
        &mut self,
        parent: WidgetId,
        behavior: Box<dyn Widget>,
    ) -> Result<WidgetId, WidgetError> {
        self.add_node(parent, WidgetKind::Plain, behavior)
    }

    /// Adds a window under `parent` (normally the root).
    pub fn add_window(
        &mut self,
        parent: WidgetId,
        modal: bool,
        behavior: Box<dyn Widget>,
    ) -> Result<WidgetId, WidgetError> {
        self.add_node(parent, WidgetKind::Window { modal }, behavior)
    }

    /// Adds a popup z-order coupled to `parent_window`. The popup itself is
    /// a child of the root so it can stack above sibling windows.
    pub fn add_popup(
        &mut self,
        parent: WidgetId,
        parent_window: WidgetId,
        behavior: Box<dyn Widget>,
    ) -> Result<WidgetId, WidgetError> {
        if !matches!(self.node(parent_window)?.kind, WidgetKind::Window { .. }) {
            return Err(WidgetError::NotAWindow { id: parent_window });
        }
        self.add_node(parent, WidgetKind::Popup { parent_window }, behavior)
    }

    fn add_node(
        &mut self,
        parent: WidgetId,
        kind: WidgetKind,
        behavior: Box<dyn Widget>,
    ) -> Result<WidgetId, WidgetError> {
        self.node(parent)?;
        let id = self.alloc(WidgetNode {
            position: Point::ZERO,
            size: Size::ZERO,
            visible: true,
            enabled: true,
            cursor: Cursor::Arrow,
            tooltip: String::new(),
            focused: false,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            behavior: Some(behavior),
        });
        // node(parent) above guarantees the slot is live
        if let Ok(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    /// Removes `id` and its whole subtree. Ownership is exclusive: children
    /// never survive their parent.
    pub fn remove(&mut self, id: WidgetId) -> Result<(), WidgetError> {
        if id == ROOT {
            return Err(WidgetError::RootRemoval);
        }
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            if let Ok(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != id);
            }
        }
        self.drop_subtree(id);
        Ok(())
    }

    fn drop_subtree(&mut self, id: WidgetId) {
        let children = match self.nodes.get_mut(id).and_then(Option::take) {
            Some(node) => node.children,
            None => return,
        };
        self.free.push(id);
        for child in children {
            self.drop_subtree(child);
        }
    }

    // ------------------------------------------------------------------
    // Node attribute access
    // ------------------------------------------------------------------

    pub fn position(&self, id: WidgetId) -> Result<Point, WidgetError> {
        Ok(self.node(id)?.position)
    }

    pub fn set_position(&mut self, id: WidgetId, position: Point) -> Result<(), WidgetError> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    pub fn size(&self, id: WidgetId) -> Result<Size, WidgetError> {
        Ok(self.node(id)?.size)
    }

    pub fn set_size(&mut self, id: WidgetId, size: Size) -> Result<(), WidgetError> {
        self.node_mut(id)?.size = size;
        Ok(())
    }

    pub fn visible(&self, id: WidgetId) -> bool {
        self.node(id).map_or(false, |n| n.visible)
    }

    pub fn set_visible(&mut self, id: WidgetId, visible: bool) -> Result<(), WidgetError> {
        self.node_mut(id)?.visible = visible;
        Ok(())
    }

    pub fn enabled(&self, id: WidgetId) -> bool {
        self.node(id).map_or(false, |n| n.enabled)
    }

    pub fn set_enabled(&mut self, id: WidgetId, enabled: bool) -> Result<(), WidgetError> {
        self.node_mut(id)?.enabled = enabled;
        Ok(())
    }

    pub fn cursor(&self, id: WidgetId) -> Cursor {
        self.node(id).map_or(Cursor::Arrow, |n| n.cursor)
    }

    pub fn set_cursor(&mut self, id: WidgetId, cursor: Cursor) -> Result<(), WidgetError> {
        self.node_mut(id)?.cursor = cursor;
        Ok(())
    }

    pub fn tooltip(&self, id: WidgetId) -> &str {
        self.node(id).map_or("", |n| n.tooltip.as_str())
    }

    pub fn set_tooltip(
        &mut self,
        id: WidgetId,
        tooltip: impl Into<String>,
    ) -> Result<(), WidgetError> {
        self.node_mut(id)?.tooltip = tooltip.into();
        Ok(())
    }

    pub fn focused(&self, id: WidgetId) -> bool {
        self.node(id).map_or(false, |n| n.focused)
    }

    pub(crate) fn set_focused(&mut self, id: WidgetId, focused: bool) {
        if let Ok(node) = self.node_mut(id) {
            node.focused = focused;
        }
    }

    pub fn kind(&self, id: WidgetId) -> Result<WidgetKind, WidgetError> {
        Ok(self.node(id)?.kind)
    }

    pub fn is_window(&self, id: WidgetId) -> bool {
        matches!(self.kind(id), Ok(WidgetKind::Window { .. }))
    }

    pub fn is_modal_window(&self, id: WidgetId) -> bool {
        matches!(self.kind(id), Ok(WidgetKind::Window { modal: true }))
    }

    /// For popups, the window this popup must stack above.
    pub fn popup_parent_window(&self, id: WidgetId) -> Option<WidgetId> {
        match self.kind(id) {
            Ok(WidgetKind::Popup { parent_window }) => Some(parent_window),
            _ => None,
        }
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Mutable access to a behavior for downcasting; `None` while the
    /// behavior is checked out for dispatch.
    pub fn behavior_mut(&mut self, id: WidgetId) -> Option<&mut (dyn Widget + 'static)> {
        self.node_mut(id)
            .ok()
            .and_then(|n| n.behavior.as_deref_mut())
    }

    /// Replaces the behavior attached to `id`; the root starts out with
    /// [`EmptyWidget`] and screens install their own logic this way.
    pub fn set_behavior(
        &mut self,
        id: WidgetId,
        behavior: Box<dyn Widget>,
    ) -> Result<(), WidgetError> {
        self.node_mut(id)?.behavior = Some(behavior);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Geometry queries
    // ------------------------------------------------------------------

    /// Absolute position: the sum of all ancestor positions.
    pub fn absolute_position(&self, id: WidgetId) -> Point {
        let mut p = Point::ZERO;
        let mut cursor = Some(id);
        while let Some(id) = cursor {
            match self.node(id) {
                Ok(node) => {
                    p += node.position;
                    cursor = node.parent;
                }
                Err(_) => break,
            }
        }
        p
    }

    /// Whether `p`, in `id`'s parent coordinate space, falls inside `id`.
    pub fn contains(&self, id: WidgetId, p: Point) -> bool {
        match self.node(id) {
            Ok(node) => Rect::new(node.position, node.size).contains(p),
            Err(_) => false,
        }
    }

    /// Whether the absolute point `p` falls inside `id`.
    pub fn contains_absolute(&self, id: WidgetId, p: Point) -> bool {
        match self.node(id) {
            Ok(node) => Rect::new(self.absolute_position(id), node.size).contains(p),
            Err(_) => false,
        }
    }

    /// Deepest visible widget under the absolute point `p`; the root when no
    /// descendant matches but the point is on the screen, `None` outside.
    pub fn find_widget(&self, p: Point) -> Option<WidgetId> {
        self.find_widget_from(ROOT, p)
    }

    fn find_widget_from(&self, id: WidgetId, p: Point) -> Option<WidgetId> {
        let node = self.node(id).ok()?;
        let local = p - node.position;
        for &child in node.children.iter().rev() {
            if self.visible(child) && self.contains(child, local) {
                if let Some(found) = self.find_widget_from(child, local) {
                    return Some(found);
                }
            }
        }
        if Rect::new(Point::ZERO, node.size).contains(local) {
            Some(id)
        } else {
            None
        }
    }

    /// Whether `id` is `ancestor` or sits somewhere below it.
    pub fn is_descendant_of(&self, id: WidgetId, ancestor: WidgetId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Index of `id` within its parent's child list.
    pub fn child_index(&self, parent: WidgetId, id: WidgetId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Moves `id` to the end of its parent's child list (top of the paint
    /// and hit order).
    pub fn raise_child(&mut self, id: WidgetId) -> Result<(), WidgetError> {
        let parent = self.node(id)?.parent.ok_or(WidgetError::Missing { id })?;
        let p = self.node_mut(parent)?;
        p.children.retain(|&c| c != id);
        p.children.push(id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    fn take_behavior(&mut self, id: WidgetId) -> Option<Box<dyn Widget>> {
        self.node_mut(id).ok().and_then(|n| n.behavior.take())
    }

    fn put_behavior(&mut self, id: WidgetId, behavior: Box<dyn Widget>) {
        // The handler may have removed its own node; drop the behavior then.
        if let Ok(node) = self.node_mut(id) {
            node.behavior = Some(behavior);
        }
    }

    /// Runs one behavior hook with failure containment: an `Err` is logged
    /// and reported as "unhandled".
    pub(crate) fn invoke<F>(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        id: WidgetId,
        label: &str,
        f: F,
    ) -> bool
    where
        F: FnOnce(&mut dyn Widget, &mut EventCx<'_>) -> EventResult,
    {
        let Some(mut behavior) = self.take_behavior(id) else {
            return false;
        };
        let result = {
            let mut cx = EventCx {
                tree: self,
                widget: id,
                requests,
            };
            f(behavior.as_mut(), &mut cx)
        };
        self.put_behavior(id, behavior);
        match result {
            Ok(handled) => handled,
            Err(err) => {
                log::error!("widget #{id} {label} handler failed: {err}");
                false
            }
        }
    }

    /// Hit-dispatches a button event from the root. `p` is absolute.
    pub fn deliver_mouse_button(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        p: Point,
        button: MouseButton,
        pressed: bool,
        modifiers: Modifiers,
    ) -> bool {
        self.mouse_button_rec(requests, ROOT, p, button, pressed, modifiers)
    }

    fn mouse_button_rec(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        id: WidgetId,
        p: Point,
        button: MouseButton,
        pressed: bool,
        modifiers: Modifiers,
    ) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let local = p - node.position;
        let children: Vec<WidgetId> = node.children.clone();
        for child in children.into_iter().rev() {
            if self.visible(child)
                && self.contains(child, local)
                && self.mouse_button_rec(requests, child, local, button, pressed, modifiers)
            {
                return true;
            }
        }
        self.invoke(requests, id, "mouse button", |w, cx| {
            w.mouse_button_event(cx, p, button, pressed, modifiers)
        })
    }

    /// Hit-dispatches a motion event from the root. `p` is absolute.
    pub fn deliver_mouse_motion(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        p: Point,
        rel: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
    ) -> bool {
        self.mouse_motion_rec(requests, ROOT, p, rel, buttons, modifiers)
    }

    fn mouse_motion_rec(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        id: WidgetId,
        p: Point,
        rel: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
    ) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let local = p - node.position;
        let children: Vec<WidgetId> = node.children.clone();
        for child in children.into_iter().rev() {
            if self.visible(child)
                && self.contains(child, local)
                && self.mouse_motion_rec(requests, child, local, rel, buttons, modifiers)
            {
                return true;
            }
        }
        self.invoke(requests, id, "mouse motion", |w, cx| {
            w.mouse_motion_event(cx, p, rel, buttons, modifiers)
        })
    }

    /// Hit-dispatches a scroll event from the root. `p` is absolute.
    pub fn deliver_scroll(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        p: Point,
        delta: Point,
    ) -> bool {
        self.scroll_rec(requests, ROOT, p, delta)
    }

    fn scroll_rec(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        id: WidgetId,
        p: Point,
        delta: Point,
    ) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let local = p - node.position;
        let children: Vec<WidgetId> = node.children.clone();
        for child in children.into_iter().rev() {
            if self.visible(child)
                && self.contains(child, local)
                && self.scroll_rec(requests, child, local, delta)
            {
                return true;
            }
        }
        self.invoke(requests, id, "scroll", |w, cx| w.scroll_event(cx, p, delta))
    }

    /// Delivers a drag event directly to the drag target. `pos` must already
    /// be translated into the target's parent coordinate space.
    pub fn deliver_drag(
        &mut self,
        requests: &mut Vec<ScreenRequest>,
        id: WidgetId,
        pos: Point,
        rel: Point,
        buttons: MouseButtons,
        modifiers: Modifiers,
    ) -> bool {
        self.invoke(requests, id, "drag", |w, cx| {
            w.mouse_drag_event(cx, pos, rel, buttons, modifiers)
        })
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Draws the whole tree in paint order (parents before children, child
    /// list front to back). A widget whose draw hook fails is logged and
    /// skipped; the rest of the frame still paints.
    pub fn draw_all(
        &mut self,
        vg: &mut dyn VectorRenderer,
        surface: &mut dyn SurfaceBinding,
        pixel_ratio: f32,
        screen_size: Size,
        framebuffer_extent: PixelExtent,
    ) {
        self.draw_rec(
            ROOT,
            Point::ZERO,
            vg,
            surface,
            pixel_ratio,
            screen_size,
            framebuffer_extent,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_rec(
        &mut self,
        id: WidgetId,
        parent_origin: Point,
        vg: &mut dyn VectorRenderer,
        surface: &mut dyn SurfaceBinding,
        pixel_ratio: f32,
        screen_size: Size,
        framebuffer_extent: PixelExtent,
    ) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if id != ROOT && !node.visible {
            return;
        }
        let origin = parent_origin + node.position;
        let size = node.size;
        if let Some(mut behavior) = self.take_behavior(id) {
            let result = {
                let mut cx = DrawCx {
                    origin,
                    size,
                    pixel_ratio,
                    screen_size,
                    framebuffer_extent,
                    screen_surface: surface,
                };
                behavior.draw(&mut cx, vg)
            };
            self.put_behavior(id, behavior);
            if let Err(err) = result {
                log::error!("widget #{id} draw failed: {err}");
            }
        }
        let children: Vec<WidgetId> = self.children(id).to_vec();
        for child in children {
            self.draw_rec(
                child,
                origin,
                vg,
                surface,
                pixel_ratio,
                screen_size,
                framebuffer_extent,
            );
        }
    }
}

impl Default for WidgetTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct EventLog {
        buttons: Vec<(WidgetId, bool)>,
    }

    struct Recorder {
        log: Rc<RefCell<EventLog>>,
        handle: bool,
    }

    impl Widget for Recorder {
        fn mouse_button_event(
            &mut self,
            cx: &mut EventCx<'_>,
            _pos: Point,
            _button: MouseButton,
            pressed: bool,
            _modifiers: Modifiers,
        ) -> EventResult {
            self.log.borrow_mut().buttons.push((cx.widget, pressed));
            Ok(self.handle)
        }
    }

    struct Failing;

    impl Widget for Failing {
        fn mouse_button_event(
            &mut self,
            _cx: &mut EventCx<'_>,
            _pos: Point,
            _button: MouseButton,
            _pressed: bool,
            _modifiers: Modifiers,
        ) -> EventResult {
            Err("synthetic handler failure".into())
        }
    }

    fn sized_tree() -> WidgetTree {
        let mut tree = WidgetTree::new();
        tree.set_size(ROOT, Size::new(800.0, 600.0)).unwrap();
        tree
    }

    #[test]
    fn absolute_position_sums_ancestors() {
        let mut tree = sized_tree();
        let a = tree.add_child(ROOT, Box::new(EmptyWidget)).unwrap();
        let b = tree.add_child(a, Box::new(EmptyWidget)).unwrap();
        tree.set_position(a, Point::new(10.0, 20.0)).unwrap();
        tree.set_position(b, Point::new(5.0, 5.0)).unwrap();
        let abs = tree.absolute_position(b);
        assert_eq!((abs.x, abs.y), (15.0, 25.0));
    }

    #[test]
    fn find_widget_prefers_topmost_child() {
        let mut tree = sized_tree();
        let below = tree.add_child(ROOT, Box::new(EmptyWidget)).unwrap();
        let above = tree.add_child(ROOT, Box::new(EmptyWidget)).unwrap();
        for id in [below, above] {
            tree.set_position(id, Point::new(100.0, 100.0)).unwrap();
            tree.set_size(id, Size::new(50.0, 50.0)).unwrap();
        }
        // `above` was added later, so it paints later and hit-tests first.
        assert_eq!(tree.find_widget(Point::new(120.0, 120.0)), Some(above));

        tree.set_visible(above, false).unwrap();
        assert_eq!(tree.find_widget(Point::new(120.0, 120.0)), Some(below));
    }

    #[test]
    fn find_widget_falls_back_to_root() {
        let tree = sized_tree();
        assert_eq!(tree.find_widget(Point::new(1.0, 1.0)), Some(ROOT));
        assert_eq!(tree.find_widget(Point::new(900.0, 1.0)), None);
    }

    #[test]
    fn removal_destroys_subtree() {
        let mut tree = sized_tree();
        let window = tree.add_window(ROOT, false, Box::new(EmptyWidget)).unwrap();
        let child = tree.add_child(window, Box::new(EmptyWidget)).unwrap();
        let grandchild = tree.add_child(child, Box::new(EmptyWidget)).unwrap();

        tree.remove(window).unwrap();
        assert!(!tree.exists(window));
        assert!(!tree.exists(child));
        assert!(!tree.exists(grandchild));
        assert!(tree.children(ROOT).is_empty());
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = sized_tree();
        assert!(matches!(tree.remove(ROOT), Err(WidgetError::RootRemoval)));
    }

    #[test]
    fn button_dispatch_stops_at_first_consumer() {
        let mut tree = sized_tree();
        let log = Rc::new(RefCell::new(EventLog::default()));
        let outer = tree
            .add_child(
                ROOT,
                Box::new(Recorder {
                    log: log.clone(),
                    handle: false,
                }),
            )
            .unwrap();
        tree.set_size(outer, Size::new(200.0, 200.0)).unwrap();
        let inner = tree
            .add_child(
                outer,
                Box::new(Recorder {
                    log: log.clone(),
                    handle: true,
                }),
            )
            .unwrap();
        tree.set_size(inner, Size::new(100.0, 100.0)).unwrap();

        let mut requests = Vec::new();
        let handled = tree.deliver_mouse_button(
            &mut requests,
            Point::new(50.0, 50.0),
            MouseButton::Left,
            true,
            Modifiers::NONE,
        );
        assert!(handled);
        // Inner consumed the press, so the outer recorder never saw it.
        assert_eq!(log.borrow().buttons, vec![(inner, true)]);
    }

    #[test]
    fn failing_handler_is_contained() {
        let mut tree = sized_tree();
        let widget = tree.add_child(ROOT, Box::new(Failing)).unwrap();
        tree.set_size(widget, Size::new(100.0, 100.0)).unwrap();

        let mut requests = Vec::new();
        let handled = tree.deliver_mouse_button(
            &mut requests,
            Point::new(10.0, 10.0),
            MouseButton::Left,
            true,
            Modifiers::NONE,
        );
        // Error is logged, event counts as unhandled, tree stays usable.
        assert!(!handled);
        assert!(tree.exists(widget));
        assert!(tree.behavior_mut(widget).is_some());
    }

    #[test]
    fn popup_requires_window_parent() {
        let mut tree = sized_tree();
        let plain = tree.add_child(ROOT, Box::new(EmptyWidget)).unwrap();
        assert!(matches!(
            tree.add_popup(ROOT, plain, Box::new(EmptyWidget)),
            Err(WidgetError::NotAWindow { .. })
        ));
    }
}
