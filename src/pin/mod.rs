//! Pinned-window model: one captured bitmap, its strokes, and the pointer policy
//! that decides between window drag, stroke drawing, and control passthrough.

use std::sync::Arc;

use image::RgbaImage;

use crate::annotation::AnnotationLayer;
use crate::geometry::{Color, Point, Size};
use crate::input::{
    resolve_shortcut, EventTarget, InputContext, InputEvent, ShortcutAction,
};
use crate::ocr::{joined_text, TextRegion};

pub mod actions;
pub mod chrome;

pub use chrome::{initial_pin_size, PinChrome};

pub const MIN_OPACITY: f64 = 0.1;
pub const MAX_OPACITY: f64 = 1.0;
/// Presses inside this strip at the top of the content always drag the window.
pub const DRAG_STRIP_HEIGHT: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct PinnedImage {
    bitmap: Arc<RgbaImage>,
    layer: AnnotationLayer,
    opacity: f64,
}

impl PinnedImage {
    pub fn new(bitmap: RgbaImage) -> Self {
        let base_size = Size::from_pixels(bitmap.width(), bitmap.height());
        Self {
            bitmap: Arc::new(bitmap),
            layer: AnnotationLayer::new(base_size),
            opacity: MAX_OPACITY,
        }
    }

    pub fn bitmap(&self) -> &Arc<RgbaImage> {
        &self.bitmap
    }

    pub fn layer(&self) -> &AnnotationLayer {
        &self.layer
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, value: f64) {
        self.opacity = value.clamp(MIN_OPACITY, MAX_OPACITY);
    }

    /// Bitmap with every stroke painted on top; neither input is modified.
    pub fn composite(&self) -> RgbaImage {
        self.layer.composite(&self.bitmap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    Default,
    TextCaret,
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    Forwarding,
    Drawing { points: Vec<Point> },
    WindowDrag { last_global: Point },
}

/// What the runtime must do after a pointer or key event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispatchAction {
    None,
    /// Let the toolkit's own handler deal with the event.
    Forward,
    StrokeStarted,
    StrokeExtended,
    StrokeCommitted,
    WindowDragStarted,
    MoveWindowBy {
        dx: f64,
        dy: f64,
    },
    GestureEnded,
    CursorChanged(CursorState),
    Shortcut(ShortcutAction),
}

impl DispatchAction {
    pub fn needs_redraw(&self) -> bool {
        matches!(
            self,
            Self::StrokeStarted
                | Self::StrokeExtended
                | Self::StrokeCommitted
                | Self::Shortcut(ShortcutAction::PinUndo | ShortcutAction::PinToggleDrawing)
        )
    }
}

#[derive(Debug, Clone)]
pub struct PinnedWindowModel {
    image: PinnedImage,
    drawing: bool,
    stroke_color: Color,
    view_size: Size,
    window_origin: Point,
    settled_origin: Point,
    text_regions: Vec<TextRegion>,
    cursor: CursorState,
    gesture: Gesture,
    dialog_open: bool,
}

impl PinnedWindowModel {
    pub fn new(bitmap: RgbaImage, stroke_color: Color) -> Self {
        let image = PinnedImage::new(bitmap);
        let view_size = image.layer.base_size();
        Self {
            image,
            drawing: false,
            stroke_color,
            view_size,
            window_origin: Point::default(),
            settled_origin: Point::default(),
            text_regions: Vec::new(),
            cursor: CursorState::Default,
            gesture: Gesture::Idle,
            dialog_open: false,
        }
    }

    pub fn image(&self) -> &PinnedImage {
        &self.image
    }

    pub fn layer(&self) -> &AnnotationLayer {
        self.image.layer()
    }

    pub fn set_opacity(&mut self, value: f64) {
        self.image.set_opacity(value);
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Flips drawing mode. The palette is visible exactly while this returns true.
    pub fn toggle_drawing(&mut self) -> bool {
        self.drawing = !self.drawing;
        if self.drawing {
            self.cursor = CursorState::Default;
        }
        tracing::debug!(drawing = self.drawing, "drawing mode toggled");
        self.drawing
    }

    pub fn palette_visible(&self) -> bool {
        self.drawing
    }

    pub fn stroke_color(&self) -> Color {
        self.stroke_color
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        self.stroke_color = color;
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    pub fn set_view_size(&mut self, size: Size) {
        self.view_size = size;
    }

    /// Where the window has been asked to be, including moves not yet applied.
    pub fn window_origin(&self) -> Point {
        self.window_origin
    }

    /// Where the compositor last placed the window.
    pub fn settled_origin(&self) -> Point {
        self.settled_origin
    }

    /// Records a position reported by the compositor. Moves still in flight
    /// are dropped from the requested origin.
    pub fn set_window_origin(&mut self, origin: Point) {
        self.window_origin = origin;
        self.settled_origin = origin;
    }

    /// Requested translation the compositor has not applied yet.
    pub fn pending_window_move(&self) -> (f64, f64) {
        self.settled_origin.delta_to(self.window_origin)
    }

    /// Settles one requested move. A move the compositor rejected is taken
    /// back out of the requested origin instead.
    pub fn settle_window_move(&mut self, dx: f64, dy: f64, applied: bool) {
        if applied {
            self.settled_origin = self.settled_origin.offset(dx, dy);
        } else {
            self.window_origin = self.window_origin.offset(-dx, -dy);
        }
    }

    /// Screen position of a surface-local point. Local coordinates only
    /// reflect moves the compositor has applied, so this uses the settled origin.
    pub fn to_global(&self, local: Point) -> Point {
        local.offset(self.settled_origin.x, self.settled_origin.y)
    }

    pub fn cursor(&self) -> CursorState {
        self.cursor
    }

    pub fn set_dialog_open(&mut self, open: bool) {
        self.dialog_open = open;
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// Points of the stroke being drawn, in normalized space.
    pub fn pending_stroke(&self) -> Option<&[Point]> {
        match &self.gesture {
            Gesture::Drawing { points } => Some(points),
            _ => None,
        }
    }

    pub fn undo(&mut self) -> bool {
        self.image.layer.undo().is_some()
    }

    pub fn composite(&self) -> RgbaImage {
        self.image.composite()
    }

    pub fn apply_text_regions(&mut self, regions: Vec<TextRegion>) {
        tracing::debug!(count = regions.len(), "text regions applied");
        self.text_regions = regions;
    }

    pub fn text_regions(&self) -> &[TextRegion] {
        &self.text_regions
    }

    pub fn recognized_text(&self) -> Option<String> {
        if self.text_regions.is_empty() {
            return None;
        }
        Some(joined_text(&self.text_regions))
    }

    pub fn dispatch(&mut self, event: InputEvent) -> DispatchAction {
        match event {
            InputEvent::PointerMove { location } => self.update_cursor(location),
            InputEvent::ButtonDown {
                location,
                global,
                target,
            } => self.begin_gesture(location, global, target),
            InputEvent::Drag { location, global } => self.continue_gesture(location, global),
            InputEvent::ButtonUp { .. } => self.end_gesture(),
            InputEvent::Key { key, modifiers } => {
                let context = InputContext {
                    in_pin: true,
                    dialog_open: self.dialog_open,
                    ..InputContext::default()
                };
                match resolve_shortcut(key, modifiers, context) {
                    Some(action) => self.apply_shortcut(action),
                    None => DispatchAction::None,
                }
            }
        }
    }

    fn apply_shortcut(&mut self, action: ShortcutAction) -> DispatchAction {
        match action {
            ShortcutAction::PinUndo => {
                self.undo();
            }
            ShortcutAction::PinToggleDrawing => {
                self.toggle_drawing();
            }
            _ => {}
        }
        DispatchAction::Shortcut(action)
    }

    fn update_cursor(&mut self, location: Point) -> DispatchAction {
        let cursor = if !self.drawing && self.text_region_at(location).is_some() {
            CursorState::TextCaret
        } else {
            CursorState::Default
        };
        if cursor == self.cursor {
            return DispatchAction::None;
        }
        self.cursor = cursor;
        DispatchAction::CursorChanged(cursor)
    }

    fn text_region_at(&self, view_point: Point) -> Option<&TextRegion> {
        let point = self.image.layer.normalize_point(view_point, self.view_size);
        self.text_regions
            .iter()
            .find(|region| region.bounds.contains(point))
    }

    fn begin_gesture(&mut self, location: Point, global: Point, target: EventTarget) -> DispatchAction {
        if target == EventTarget::Control {
            self.gesture = Gesture::Forwarding;
            return DispatchAction::Forward;
        }

        if self.drawing && location.y >= DRAG_STRIP_HEIGHT {
            let point = self.image.layer.normalize_point(location, self.view_size);
            self.gesture = Gesture::Drawing {
                points: vec![point],
            };
            return DispatchAction::StrokeStarted;
        }

        if self.cursor == CursorState::TextCaret {
            self.gesture = Gesture::Forwarding;
            return DispatchAction::Forward;
        }

        self.gesture = Gesture::WindowDrag {
            last_global: global,
        };
        DispatchAction::WindowDragStarted
    }

    fn continue_gesture(&mut self, location: Point, global: Point) -> DispatchAction {
        let view_size = self.view_size;
        match &mut self.gesture {
            Gesture::Idle => DispatchAction::None,
            Gesture::Forwarding => DispatchAction::Forward,
            Gesture::Drawing { points } => {
                points.push(self.image.layer.normalize_point(location, view_size));
                DispatchAction::StrokeExtended
            }
            Gesture::WindowDrag { .. } if self.cursor == CursorState::TextCaret => {
                DispatchAction::Forward
            }
            Gesture::WindowDrag { last_global } => {
                let (dx, dy) = last_global.delta_to(global);
                *last_global = global;
                if dx == 0.0 && dy == 0.0 {
                    return DispatchAction::None;
                }
                self.window_origin = self.window_origin.offset(dx, dy);
                DispatchAction::MoveWindowBy { dx, dy }
            }
        }
    }

    fn end_gesture(&mut self) -> DispatchAction {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Drawing { points } => {
                self.image.layer.add_stroke(points, self.stroke_color);
                DispatchAction::StrokeCommitted
            }
            Gesture::Idle => DispatchAction::None,
            Gesture::Forwarding | Gesture::WindowDrag { .. } => DispatchAction::GestureEnded,
        }
    }
}
