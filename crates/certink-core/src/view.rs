//! View state: pan/zoom transform between canvas and screen space.

use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Minimum allowed zoom level.
pub const MIN_ZOOM: f64 = 0.1;
/// Maximum allowed zoom level.
pub const MAX_ZOOM: f64 = 5.0;
/// Factor applied by a single zoom-in/zoom-out step.
pub const ZOOM_STEP: f64 = 1.2;
/// Factor applied by a single wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 1.05;
/// Canvas size used before any background is installed.
pub const DEFAULT_CANVAS_SIZE: Size = Size::new(800.0, 600.0);

fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// View manages the transform used to display the canvas.
///
/// `screen = canvas * zoom + pan`. The view never affects export output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// Current zoom level.
    zoom: f64,
    /// Current translation in screen pixels.
    pan: Vec2,
    /// Working size of the canvas in canvas pixels.
    canvas_size: Size,
    /// Whether the automatic fit already ran for the current background.
    #[serde(skip)]
    fitted: bool,
}

impl Default for View {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Vec2::ZERO,
            canvas_size: DEFAULT_CANVAS_SIZE,
            fitted: false,
        }
    }
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Vec2 {
        self.pan
    }

    pub fn canvas_size(&self) -> Size {
        self.canvas_size
    }

    /// Set the zoom, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Pan is unchanged.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(zoom);
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.pan = pan;
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    /// Set the working canvas size. Non-positive or non-finite values are ignored.
    pub fn set_canvas_size(&mut self, width: f64, height: f64) -> bool {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return false;
        }
        self.canvas_size = Size::new(width, height);
        true
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    /// Zoom by one wheel notch, keeping the canvas point under `pointer` fixed.
    ///
    /// A positive `delta_y` (scrolling down) zooms out.
    pub fn wheel_zoom(&mut self, pointer: Point, delta_y: f64) {
        let factor = if delta_y > 0.0 {
            1.0 / WHEEL_ZOOM_STEP
        } else {
            WHEEL_ZOOM_STEP
        };
        self.zoom_at(pointer, factor);
    }

    /// Zoom by `factor`, keeping the given screen point fixed.
    pub fn zoom_at(&mut self, screen_point: Point, factor: f64) {
        let new_zoom = clamp_zoom(self.zoom * factor);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return;
        }

        let canvas_point = self.screen_to_canvas(screen_point);
        self.zoom = new_zoom;

        // Keep canvas_point under screen_point
        let new_screen = self.canvas_to_screen(canvas_point);
        self.pan += screen_point - new_screen;
    }

    /// Reset to zoom 1 and zero pan.
    pub fn reset(&mut self) {
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
    }

    /// Center the canvas in `container` at the largest zoom that fits it.
    ///
    /// Returns false, leaving the view untouched, when either size is degenerate.
    pub fn fit(&mut self, container: Size) -> bool {
        let canvas = self.canvas_size;
        if canvas.width <= 0.0 || canvas.height <= 0.0 {
            return false;
        }
        if !(container.width > 0.0 && container.height > 0.0) {
            return false;
        }

        let zoom = clamp_zoom((container.width / canvas.width).min(container.height / canvas.height));
        self.zoom = zoom;
        self.pan = Vec2::new(
            (container.width - canvas.width * zoom) / 2.0,
            (container.height - canvas.height * zoom) / 2.0,
        );
        self.fitted = true;
        true
    }

    /// Fit once per background. Subsequent calls are no-ops until re-armed.
    pub fn ensure_fitted(&mut self, container: Size) -> bool {
        if self.fitted {
            return false;
        }
        self.fit(container)
    }

    /// Force a fresh fit regardless of whether one already ran.
    pub fn request_fit(&mut self, container: Size) -> bool {
        self.fit(container)
    }

    /// Allow the next `ensure_fitted` to run again.
    pub fn rearm_fit(&mut self) {
        self.fitted = false;
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Canvas-to-screen transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    pub fn screen_to_canvas(&self, screen_point: Point) -> Point {
        Point::new(
            (screen_point.x - self.pan.x) / self.zoom,
            (screen_point.y - self.pan.y) / self.zoom,
        )
    }

    pub fn canvas_to_screen(&self, canvas_point: Point) -> Point {
        self.transform() * canvas_point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_view() {
        let view = View::new();
        assert_eq!(view.pan(), Vec2::ZERO);
        assert!((view.zoom() - 1.0).abs() < f64::EPSILON);
        assert_eq!(view.canvas_size(), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_zoom_clamped_both_ways() {
        let mut view = View::new();
        view.set_zoom(7.0);
        assert!((view.zoom() - MAX_ZOOM).abs() < f64::EPSILON);
        view.set_zoom(0.01);
        assert!((view.zoom() - MIN_ZOOM).abs() < f64::EPSILON);
        for _ in 0..50 {
            view.zoom_in();
        }
        assert!((view.zoom() - MAX_ZOOM).abs() < f64::EPSILON);
        for _ in 0..50 {
            view.zoom_out();
        }
        assert!((view.zoom() - MIN_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zoom_steps() {
        let mut view = View::new();
        view.zoom_in();
        assert!((view.zoom() - 1.2).abs() < 1e-12);
        view.zoom_out();
        assert!((view.zoom() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_landscape_in_square() {
        let mut view = View::new();
        view.set_canvas_size(1000.0, 500.0);
        assert!(view.fit(Size::new(800.0, 800.0)));
        assert!((view.zoom() - 0.8).abs() < 1e-12);
        assert!((view.pan().x - 0.0).abs() < 1e-9);
        assert!((view.pan().y - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_ignores_degenerate_container() {
        let mut view = View::new();
        view.set_zoom(2.0);
        assert!(!view.fit(Size::new(0.0, 600.0)));
        assert!((view.zoom() - 2.0).abs() < f64::EPSILON);
        assert!(!view.is_fitted());
    }

    #[test]
    fn test_ensure_fitted_runs_once_until_rearmed() {
        let mut view = View::new();
        assert!(view.ensure_fitted(Size::new(400.0, 300.0)));
        view.set_zoom(3.0);
        assert!(!view.ensure_fitted(Size::new(400.0, 300.0)));
        assert!((view.zoom() - 3.0).abs() < f64::EPSILON);
        assert!(view.request_fit(Size::new(400.0, 300.0)));
        assert!((view.zoom() - 0.5).abs() < 1e-12);
        view.rearm_fit();
        view.set_zoom(3.0);
        assert!(view.ensure_fitted(Size::new(400.0, 300.0)));
        assert!((view.zoom() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_wheel_zoom_keeps_pointer_fixed() {
        let mut view = View::new();
        view.set_pan(Vec2::new(30.0, -20.0));
        let pointer = Point::new(200.0, 150.0);
        let before = view.screen_to_canvas(pointer);
        view.wheel_zoom(pointer, -1.0);
        assert!((view.zoom() - WHEEL_ZOOM_STEP).abs() < 1e-12);
        let after = view.screen_to_canvas(pointer);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        view.wheel_zoom(pointer, 1.0);
        assert!((view.zoom() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_roundtrip_conversion() {
        let mut view = View::new();
        view.set_pan(Vec2::new(30.0, -20.0));
        view.set_zoom(1.5);
        let original = Point::new(123.0, 456.0);
        let back = view.canvas_to_screen(view.screen_to_canvas(original));
        assert!((back.x - original.x).abs() < 1e-10);
        assert!((back.y - original.y).abs() < 1e-10);
    }

    #[test]
    fn test_reset() {
        let mut view = View::new();
        view.set_zoom(2.5);
        view.pan_by(Vec2::new(10.0, 20.0));
        view.reset();
        assert!((view.zoom() - 1.0).abs() < f64::EPSILON);
        assert_eq!(view.pan(), Vec2::ZERO);
    }

    proptest! {
        #[test]
        fn prop_wheel_zoom_keeps_pointer_anchored(
            zoom in MIN_ZOOM..=MAX_ZOOM,
            pan_x in -1000.0..1000.0f64,
            pan_y in -1000.0..1000.0f64,
            px in 0.0..2000.0f64,
            py in 0.0..2000.0f64,
            zoom_in in any::<bool>(),
        ) {
            let mut view = View::new();
            view.set_zoom(zoom);
            view.set_pan(Vec2::new(pan_x, pan_y));
            let pointer = Point::new(px, py);
            let before = view.screen_to_canvas(pointer);

            view.wheel_zoom(pointer, if zoom_in { -1.0 } else { 1.0 });

            let after = view.screen_to_canvas(pointer);
            prop_assert!((after - before).hypot() <= 1e-6 * (1.0 + before.to_vec2().hypot()));
            prop_assert!((MIN_ZOOM..=MAX_ZOOM).contains(&view.zoom()));
        }
    }
}
