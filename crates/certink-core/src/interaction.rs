//! Pointer interaction: hit-testing, drag, resize/rotate handles.

use crate::canvas::Canvas;
use crate::elements::{Element, ElementId, ElementPatch};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Smallest width/height a transform may produce, in canvas pixels.
pub const MIN_ELEMENT_SIZE: f64 = 5.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 10.0;
/// Distance of the rotation handle above the top edge, in canvas pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 30.0;
/// Rotation snapping increment in degrees.
pub const ROTATION_SNAP_DEGREES: f64 = 15.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

/// Type of transform handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Corner(Corner),
    Edge(Edge),
    /// Rotation handle, above the top edge.
    Rotate,
}

impl HandleKind {
    /// Which sides of the local box this handle moves: (left, top, right, bottom).
    fn moved_sides(&self) -> (bool, bool, bool, bool) {
        match self {
            HandleKind::Corner(Corner::TopLeft) => (true, true, false, false),
            HandleKind::Corner(Corner::TopRight) => (false, true, true, false),
            HandleKind::Corner(Corner::BottomLeft) => (true, false, false, true),
            HandleKind::Corner(Corner::BottomRight) => (false, false, true, true),
            HandleKind::Edge(Edge::Top) => (false, true, false, false),
            HandleKind::Edge(Edge::Right) => (false, false, true, false),
            HandleKind::Edge(Edge::Bottom) => (false, false, false, true),
            HandleKind::Edge(Edge::Left) => (true, false, false, false),
            HandleKind::Rotate => (false, false, false, false),
        }
    }
}

/// A transform handle with its position in canvas coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a canvas point hits this handle.
    /// `tolerance` should be adjusted for zoom.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Handles for an element: four corners, four edge midpoints and rotate.
pub fn handles_for(element: &Element) -> Vec<Handle> {
    let t = element.transform();
    let r = element.local_rect();
    let (cx, cy) = (r.center().x, r.center().y);
    let theta = element.rotation.to_radians();
    let top_center = t * Point::new(cx, r.y0);
    let up = Vec2::new(theta.sin(), -theta.cos());

    vec![
        Handle::new(t * Point::new(r.x0, r.y0), HandleKind::Corner(Corner::TopLeft)),
        Handle::new(t * Point::new(r.x1, r.y0), HandleKind::Corner(Corner::TopRight)),
        Handle::new(t * Point::new(r.x0, r.y1), HandleKind::Corner(Corner::BottomLeft)),
        Handle::new(t * Point::new(r.x1, r.y1), HandleKind::Corner(Corner::BottomRight)),
        Handle::new(top_center, HandleKind::Edge(Edge::Top)),
        Handle::new(t * Point::new(r.x1, cy), HandleKind::Edge(Edge::Right)),
        Handle::new(t * Point::new(cx, r.y1), HandleKind::Edge(Edge::Bottom)),
        Handle::new(t * Point::new(r.x0, cy), HandleKind::Edge(Edge::Left)),
        Handle::new(top_center + up * ROTATE_HANDLE_OFFSET, HandleKind::Rotate),
    ]
}

/// Find which handle (if any) is hit at the given canvas point.
pub fn hit_test_handles(element: &Element, point: Point, tolerance: f64) -> Option<HandleKind> {
    handles_for(element)
        .into_iter()
        .find(|h| h.hit_test(point, tolerance))
        .map(|h| h.kind)
}

/// Geometry produced by a transform gesture, before baking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformResult {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

/// Resize `original` by dragging `handle` by `delta` (canvas coordinates).
///
/// The opposite side stays fixed; sizes never drop below `MIN_ELEMENT_SIZE`.
pub fn apply_resize(original: &Element, handle: HandleKind, delta: Vec2) -> TransformResult {
    let theta = original.rotation.to_radians();
    let (sin, cos) = theta.sin_cos();
    // Delta in the element's rotated frame
    let local = Vec2::new(delta.x * cos + delta.y * sin, -delta.x * sin + delta.y * cos);

    let w = original.width * original.scale_x.abs();
    let h = original.height * original.scale_y.abs();
    let (mut l, mut t, mut r, mut b) = (0.0, 0.0, w, h);
    let (ml, mt, mr, mb) = handle.moved_sides();
    if ml {
        l = (l + local.x).min(r - MIN_ELEMENT_SIZE);
    }
    if mr {
        r = (r + local.x).max(l + MIN_ELEMENT_SIZE);
    }
    if mt {
        t = (t + local.y).min(b - MIN_ELEMENT_SIZE);
    }
    if mb {
        b = (b + local.y).max(t + MIN_ELEMENT_SIZE);
    }

    // New top-left, back in canvas space
    let origin = Point::new(
        original.x + l * cos - t * sin,
        original.y + l * sin + t * cos,
    );
    TransformResult {
        x: origin.x,
        y: origin.y,
        width: r - l,
        height: b - t,
        rotation: original.rotation,
    }
}

/// Rotate `original` about its center so the top edge faces `cursor`.
pub fn apply_rotation(original: &Element, cursor: Point, snap: bool) -> TransformResult {
    let center = original.center();
    let d = cursor - center;
    // Offset so 0° is up
    let mut degrees = (d.y.atan2(d.x) + std::f64::consts::FRAC_PI_2).to_degrees();
    if snap {
        degrees = (degrees / ROTATION_SNAP_DEGREES).round() * ROTATION_SNAP_DEGREES;
    }
    degrees = normalize_degrees(degrees);

    let w = original.width * original.scale_x.abs();
    let h = original.height * original.scale_y.abs();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let half = Vec2::new(w / 2.0, h / 2.0);
    TransformResult {
        x: center.x - (half.x * cos - half.y * sin),
        y: center.y - (half.x * sin + half.y * cos),
        width: w,
        height: h,
        rotation: degrees,
    }
}

/// Normalize an angle to (-180, 180].
fn normalize_degrees(degrees: f64) -> f64 {
    let mut d = degrees % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// Patch that folds any scale into width/height, with the size floor.
pub fn bake_scale(element: &Element) -> ElementPatch {
    ElementPatch {
        width: Some((element.width * element.scale_x.abs()).max(MIN_ELEMENT_SIZE)),
        height: Some((element.height * element.scale_y.abs()).max(MIN_ELEMENT_SIZE)),
        scale_x: Some(1.0),
        scale_y: Some(1.0),
        ..ElementPatch::default()
    }
}

/// State of an in-progress drag.
#[derive(Debug, Clone)]
pub struct DragState {
    pub element_id: ElementId,
    /// Pointer position at drag start, in canvas coordinates.
    pub start_point: Point,
    pub original: Element,
}

/// State of an in-progress resize or rotate.
#[derive(Debug, Clone)]
pub struct TransformState {
    pub element_id: ElementId,
    pub handle: HandleKind,
    pub start_point: Point,
    pub current_point: Point,
    pub original: Element,
}

impl TransformState {
    pub fn delta(&self) -> Vec2 {
        self.current_point - self.start_point
    }
}

#[derive(Debug, Clone)]
pub enum Gesture {
    Drag(DragState),
    Transform(TransformState),
}

/// Translates pointer input into canvas mutations.
///
/// Intermediate gesture updates go through `update_element` without
/// checkpoints; a single checkpoint is taken when a gesture ends with a change.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    gesture: Option<Gesture>,
    /// Snap rotation to 15° increments.
    pub snap_rotation: bool,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gesture(&self) -> Option<&Gesture> {
        self.gesture.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Select the topmost element under `screen`, or clear the selection.
    pub fn click(&mut self, canvas: &mut Canvas, screen: Point) -> Option<ElementId> {
        let point = canvas.view().screen_to_canvas(screen);
        match canvas.scene().elements_at_point(point, 0.0).first().copied() {
            Some(id) => {
                canvas.select(id);
                Some(id)
            }
            None => {
                canvas.clear_selection();
                None
            }
        }
    }

    /// Press: start a transform on a handle of the single selected element,
    /// otherwise select under the pointer and start a drag.
    pub fn pointer_down(&mut self, canvas: &mut Canvas, screen: Point) {
        let point = canvas.view().screen_to_canvas(screen);
        if let [id] = canvas.selection() {
            let id = *id;
            let tolerance = HANDLE_HIT_TOLERANCE / canvas.view().zoom();
            let handle = canvas
                .element(id)
                .filter(|e| e.visible && !e.locked)
                .and_then(|e| hit_test_handles(e, point, tolerance));
            if let Some(handle) = handle {
                self.begin_transform(canvas, id, handle, screen);
                return;
            }
        }
        if let Some(id) = self.click(canvas, screen) {
            self.begin_drag(canvas, id, screen);
        }
    }

    pub fn pointer_move(&mut self, canvas: &mut Canvas, screen: Point) {
        match self.gesture {
            Some(Gesture::Drag(_)) => self.drag_to(canvas, screen),
            Some(Gesture::Transform(_)) => self.transform_to(canvas, screen),
            None => {}
        }
    }

    pub fn pointer_up(&mut self, canvas: &mut Canvas) -> bool {
        match self.gesture {
            Some(Gesture::Drag(_)) => self.end_drag(canvas),
            Some(Gesture::Transform(_)) => self.end_transform(canvas),
            None => false,
        }
    }

    /// Zoom one wheel notch anchored at the pointer.
    pub fn wheel(&mut self, canvas: &mut Canvas, pointer: Point, delta_y: f64) {
        canvas.wheel_zoom(pointer, delta_y);
    }

    /// Start dragging an element. Refused for locked or unknown elements.
    pub fn begin_drag(&mut self, canvas: &Canvas, id: ElementId, screen: Point) -> bool {
        let Some(element) = canvas.element(id).filter(|e| !e.locked) else {
            return false;
        };
        self.gesture = Some(Gesture::Drag(DragState {
            element_id: id,
            start_point: canvas.view().screen_to_canvas(screen),
            original: element.clone(),
        }));
        true
    }

    pub fn drag_to(&mut self, canvas: &mut Canvas, screen: Point) {
        let Some(Gesture::Drag(state)) = &self.gesture else {
            return;
        };
        let delta = canvas.view().screen_to_canvas(screen) - state.start_point;
        let patch = ElementPatch::position(state.original.x + delta.x, state.original.y + delta.y);
        canvas.update_element(state.element_id, &patch);
    }

    /// Finish a drag. Checkpoints only if the position changed.
    pub fn end_drag(&mut self, canvas: &mut Canvas) -> bool {
        let Some(Gesture::Drag(state)) = self.gesture.take() else {
            return false;
        };
        let Some(current) = canvas.element(state.element_id) else {
            // Deleted mid-drag
            return false;
        };
        let moved = current.x != state.original.x || current.y != state.original.y;
        if moved {
            log::debug!("Drag committed for {}", state.element_id);
            canvas.checkpoint();
        }
        moved
    }

    /// Start a resize/rotate. Refused for locked or unknown elements.
    pub fn begin_transform(
        &mut self,
        canvas: &Canvas,
        id: ElementId,
        handle: HandleKind,
        screen: Point,
    ) -> bool {
        let Some(element) = canvas.element(id).filter(|e| !e.locked) else {
            return false;
        };
        let start = canvas.view().screen_to_canvas(screen);
        self.gesture = Some(Gesture::Transform(TransformState {
            element_id: id,
            handle,
            start_point: start,
            current_point: start,
            original: element.clone(),
        }));
        true
    }

    /// Live update; the size change is carried as a transient scale.
    pub fn transform_to(&mut self, canvas: &mut Canvas, screen: Point) {
        let Some(Gesture::Transform(state)) = &mut self.gesture else {
            return;
        };
        state.current_point = canvas.view().screen_to_canvas(screen);
        let result = match state.handle {
            HandleKind::Rotate => apply_rotation(&state.original, state.current_point, self.snap_rotation),
            handle => apply_resize(&state.original, handle, state.delta()),
        };
        let original = &state.original;
        let scale = |size: f64, base: f64| if base > 0.0 { size / base } else { 1.0 };
        let patch = ElementPatch {
            x: Some(result.x),
            y: Some(result.y),
            rotation: Some(result.rotation),
            scale_x: Some(scale(result.width, original.width)),
            scale_y: Some(scale(result.height, original.height)),
            ..ElementPatch::default()
        };
        canvas.update_element(state.element_id, &patch);
    }

    /// Finish a transform: bake scale into size and checkpoint if anything changed.
    pub fn end_transform(&mut self, canvas: &mut Canvas) -> bool {
        let Some(Gesture::Transform(state)) = self.gesture.take() else {
            return false;
        };
        let Some(current) = canvas.element(state.element_id) else {
            return false;
        };
        let patch = bake_scale(current);
        canvas.update_element(state.element_id, &patch);

        let changed = canvas
            .element(state.element_id)
            .is_some_and(|e| *e != state.original);
        if changed {
            log::debug!("Transform committed for {}", state.element_id);
            canvas.checkpoint();
        }
        changed
    }

    /// Abort the current gesture and restore the element.
    pub fn cancel(&mut self, canvas: &mut Canvas) {
        let original = match self.gesture.take() {
            Some(Gesture::Drag(s)) => s.original,
            Some(Gesture::Transform(s)) => s.original,
            None => return,
        };
        let patch = ElementPatch {
            x: Some(original.x),
            y: Some(original.y),
            width: Some(original.width),
            height: Some(original.height),
            rotation: Some(original.rotation),
            scale_x: Some(original.scale_x),
            scale_y: Some(original.scale_y),
            ..ElementPatch::default()
        };
        canvas.update_element(original.id(), &patch);
    }
}
