//! Element definitions for the certificate canvas.

mod image;
mod shape;
mod text;

pub use image::{CropRect, ImageElement};
pub use shape::{ShapeElement, ShapeKind};
pub use text::{FontStyle, TextAlign, TextDecoration, TextElement, VerticalAlign, WrapMode};

use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Generate a fresh element identifier.
pub fn generate_id() -> ElementId {
    Uuid::new_v4()
}

/// RGBA8 color, serialized as a CSS hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse a CSS color: `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(r, g, b)`, `rgba(r, g, b, a)` or a handful of named colors.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::parse_rgb_args(args);
        }
        match lower.as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "transparent" => Some(Self::transparent()),
            "red" => Some(Self::rgb(255, 0, 0)),
            "green" => Some(Self::rgb(0, 128, 0)),
            "blue" => Some(Self::rgb(0, 0, 255)),
            "gray" | "grey" => Some(Self::rgb(128, 128, 128)),
            "gold" => Some(Self::rgb(255, 215, 0)),
            "navy" => Some(Self::rgb(0, 0, 128)),
            _ => None,
        }
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            4 => Some(Self::new(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    fn parse_rgb_args(args: &str) -> Option<Self> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |s: &str| s.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
        let alpha = match parts.get(3) {
            Some(a) => (a.parse::<f64>().ok()?.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => 255,
        };
        Some(Self::new(
            channel(parts[0])?,
            channel(parts[1])?,
            channel(parts[2])?,
            alpha,
        ))
    }

    /// Hex representation; alpha is omitted when opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Return this color with its alpha multiplied by `opacity`.
    pub fn with_opacity(&self, opacity: f64) -> Self {
        let alpha = (self.a as f64 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self::new(self.r, self.g, self.b, alpha)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Variant-specific payload of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Text(TextElement),
    Image(ImageElement),
    Shape(ShapeElement),
}

impl ElementKind {
    /// Short name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Text(_) => "text",
            ElementKind::Image(_) => "image",
            ElementKind::Shape(_) => "shape",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

/// A positioned, styled, orderable unit on the canvas.
///
/// Geometry is expressed in canvas pixels. `x`/`y` is the top-left corner
/// before rotation; rotation (degrees, clockwise) and scale are applied
/// around that corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub(crate) id: ElementId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub scale_x: f64,
    #[serde(default = "default_one")]
    pub scale_y: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    pub z_index: i64,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    /// Build an element from a draft with an explicit id and stacking key.
    pub fn from_draft(draft: ElementDraft, id: ElementId, z_index: i64) -> Self {
        Self {
            id,
            x: draft.x,
            y: draft.y,
            width: draft.width,
            height: draft.height,
            rotation: draft.rotation,
            scale_x: draft.scale_x,
            scale_y: draft.scale_y,
            opacity: draft.opacity,
            z_index,
            visible: true,
            locked: false,
            kind: draft.kind,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Clone this element under a new id, shifted by `(dx, dy)`.
    pub fn duplicate_with_offset(&self, dx: f64, dy: f64, z_index: i64) -> Self {
        let mut copy = self.clone();
        copy.id = generate_id();
        copy.x += dx;
        copy.y += dy;
        copy.z_index = z_index;
        copy
    }

    pub fn as_text(&self) -> Option<&TextElement> {
        match &self.kind {
            ElementKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextElement> {
        match &mut self.kind {
            ElementKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, ElementKind::Text(_))
    }

    /// Element-local to canvas transform (translate, rotate, scale).
    pub fn transform(&self) -> Affine {
        Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Unrotated local frame of the element.
    pub fn local_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width.max(0.0), self.height.max(0.0))
    }

    /// Axis-aligned bounds of the rendered element in canvas coordinates.
    pub fn bounds(&self) -> Rect {
        let t = self.transform();
        let r = self.local_rect();
        let corners = [
            t * Point::new(r.x0, r.y0),
            t * Point::new(r.x1, r.y0),
            t * Point::new(r.x1, r.y1),
            t * Point::new(r.x0, r.y1),
        ];
        let mut out = Rect::from_points(corners[0], corners[1]);
        out = out.union_pt(corners[2]);
        out.union_pt(corners[3])
    }

    /// Rendered center point in canvas coordinates.
    pub fn center(&self) -> Point {
        self.transform() * self.local_rect().center()
    }

    /// Check whether a canvas-space point lies inside the rendered element.
    pub fn contains(&self, point: Point, tolerance: f64) -> bool {
        let t = self.transform();
        if t.determinant().abs() < f64::EPSILON {
            return false;
        }
        let local = t.inverse() * point;
        let tol_x = tolerance / self.scale_x.abs().max(f64::EPSILON);
        let tol_y = tolerance / self.scale_y.abs().max(f64::EPSILON);
        self.local_rect().inflate(tol_x, tol_y).contains(local)
    }
}

/// An element description without identity or stacking, as passed to `add_element`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDraft {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub scale_x: f64,
    #[serde(default = "default_one")]
    pub scale_y: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl ElementDraft {
    /// Create a draft for the given variant at the origin.
    pub fn new(kind: ElementKind, width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            opacity: 1.0,
            kind,
        }
    }

    /// Text draft with the given content and box size.
    pub fn text(content: impl Into<String>, width: f64, height: f64) -> Self {
        Self::new(ElementKind::Text(TextElement::new(content)), width, height)
    }

    /// Set the position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    /// Set the opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Modify the text payload in place, if this is a text draft.
    pub fn with_text(mut self, f: impl FnOnce(&mut TextElement)) -> Self {
        if let ElementKind::Text(t) = &mut self.kind {
            f(t);
        }
        self
    }
}

/// Partial changes merged into an element by `update_element`.
///
/// Text-only fields are ignored for other variants. `data_key` uses a
/// nested option so a binding can be cleared with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub opacity: Option<f64>,
    pub z_index: Option<i64>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    pub content: Option<String>,
    pub data_key: Option<Option<String>>,
    pub font_size: Option<f64>,
    pub font_family: Option<String>,
    pub font_style: Option<FontStyle>,
    pub fill: Option<Color>,
    pub align: Option<TextAlign>,
    pub vertical_align: Option<VerticalAlign>,
    pub decoration: Option<TextDecoration>,
    pub wrap: Option<WrapMode>,
    pub line_height: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub ellipsis: Option<bool>,
}

impl ElementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn z_index(z: i64) -> Self {
        Self {
            z_index: Some(z),
            ..Self::default()
        }
    }

    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn data_key(key: Option<String>) -> Self {
        Self {
            data_key: Some(key),
            ..Self::default()
        }
    }

    /// Merge the patch into `element`. Returns true if any field changed.
    pub fn apply(&self, element: &mut Element) -> bool {
        let before = element.clone();

        if let Some(v) = self.x {
            element.x = v;
        }
        if let Some(v) = self.y {
            element.y = v;
        }
        if let Some(v) = self.width {
            element.width = v;
        }
        if let Some(v) = self.height {
            element.height = v;
        }
        if let Some(v) = self.rotation {
            element.rotation = v;
        }
        if let Some(v) = self.scale_x {
            element.scale_x = v;
        }
        if let Some(v) = self.scale_y {
            element.scale_y = v;
        }
        if let Some(v) = self.opacity {
            element.opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = self.z_index {
            element.z_index = v;
        }
        if let Some(v) = self.visible {
            element.visible = v;
        }
        if let Some(v) = self.locked {
            element.locked = v;
        }

        if let ElementKind::Text(text) = &mut element.kind {
            if let Some(v) = &self.content {
                text.content = v.clone();
            }
            if let Some(v) = &self.data_key {
                text.data_key = v.clone().filter(|k| !k.is_empty());
            }
            if let Some(v) = self.font_size {
                text.font_size = v;
            }
            if let Some(v) = &self.font_family {
                text.font_family = v.clone();
            }
            if let Some(v) = self.font_style {
                text.font_style = v;
            }
            if let Some(v) = self.fill {
                text.fill = v;
            }
            if let Some(v) = self.align {
                text.align = v;
            }
            if let Some(v) = self.vertical_align {
                text.vertical_align = v;
            }
            if let Some(v) = self.decoration {
                text.decoration = v;
            }
            if let Some(v) = self.wrap {
                text.wrap = v;
            }
            if let Some(v) = self.line_height {
                text.line_height = v;
            }
            if let Some(v) = self.letter_spacing {
                text.letter_spacing = v;
            }
            if let Some(v) = self.ellipsis {
                text.ellipsis = v;
            }
        }

        *element != before
    }
}

/// Sort elements into render order: ascending z-index, ties by insertion order.
pub fn render_order(elements: &[Element]) -> Vec<&Element> {
    let mut ordered: Vec<&Element> = elements.iter().collect();
    ordered.sort_by_key(|e| e.z_index);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_element(x: f64, y: f64, w: f64, h: f64) -> Element {
        Element::from_draft(ElementDraft::text("Hello", w, h).at(x, y), generate_id(), 1)
    }

    #[test]
    fn test_color_parse_forms() {
        assert_eq!(Color::parse("#000"), Some(Color::black()));
        assert_eq!(Color::parse("#111827"), Some(Color::rgb(0x11, 0x18, 0x27)));
        assert_eq!(Color::parse("#ff000080"), Some(Color::new(255, 0, 0, 128)));
        assert_eq!(Color::parse("rgb(1, 2, 3)"), Some(Color::rgb(1, 2, 3)));
        assert_eq!(Color::parse("rgba(0,0,0,0)"), Some(Color::transparent()));
        assert_eq!(Color::parse("White"), Some(Color::white()));
        assert_eq!(Color::parse("#12"), None);
        assert_eq!(Color::parse("nonsense"), None);
    }

    #[test]
    fn test_color_serde_as_hex() {
        let json = serde_json::to_string(&Color::rgb(17, 24, 39)).unwrap();
        assert_eq!(json, "\"#111827\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(17, 24, 39));
    }

    #[test]
    fn test_contains_unrotated() {
        let el = text_element(100.0, 100.0, 200.0, 50.0);
        assert!(el.contains(Point::new(150.0, 120.0), 0.0));
        assert!(!el.contains(Point::new(99.0, 120.0), 0.0));
        assert!(el.contains(Point::new(99.0, 120.0), 2.0));
    }

    #[test]
    fn test_contains_rotated() {
        let mut el = text_element(0.0, 0.0, 100.0, 10.0);
        el.rotation = 90.0;
        // Rotated clockwise around the top-left corner: the box now spans x in [-10, 0].
        assert!(el.contains(Point::new(-5.0, 50.0), 0.0));
        assert!(!el.contains(Point::new(50.0, 5.0), 0.0));
    }

    #[test]
    fn test_bounds_with_scale() {
        let mut el = text_element(10.0, 20.0, 100.0, 50.0);
        el.scale_x = 2.0;
        let b = el.bounds();
        assert!((b.width() - 200.0).abs() < 1e-9);
        assert!((b.height() - 50.0).abs() < 1e-9);
        assert!((b.x0 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_patch_shallow_merge() {
        let mut el = text_element(0.0, 0.0, 10.0, 10.0);
        let patch = ElementPatch {
            x: Some(5.0),
            content: Some("Ada".to_string()),
            ..ElementPatch::default()
        };
        assert!(patch.apply(&mut el));
        assert!((el.x - 5.0).abs() < f64::EPSILON);
        assert!((el.width - 10.0).abs() < f64::EPSILON);
        assert_eq!(el.as_text().map(|t| t.content.as_str()), Some("Ada"));
        assert!(!patch.apply(&mut el));
    }

    #[test]
    fn test_patch_clears_binding() {
        let mut el = text_element(0.0, 0.0, 10.0, 10.0);
        ElementPatch::data_key(Some("Name".into())).apply(&mut el);
        assert_eq!(el.as_text().and_then(|t| t.data_key.as_deref()), Some("Name"));
        ElementPatch::data_key(Some(String::new())).apply(&mut el);
        assert_eq!(el.as_text().and_then(|t| t.data_key.clone()), None);
    }

    #[test]
    fn test_render_order_is_stable() {
        let a = Element::from_draft(ElementDraft::text("a", 1.0, 1.0), generate_id(), 2);
        let b = Element::from_draft(ElementDraft::text("b", 1.0, 1.0), generate_id(), 1);
        let c = Element::from_draft(ElementDraft::text("c", 1.0, 1.0), generate_id(), 2);
        let elements = vec![a.clone(), b.clone(), c.clone()];
        let ids: Vec<_> = render_order(&elements).iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![b.id(), a.id(), c.id()]);
    }

    #[test]
    fn test_element_json_shape() {
        let el = text_element(1.0, 2.0, 3.0, 4.0);
        let value = serde_json::to_value(&el).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["content"], "Hello");
        let back: Element = serde_json::from_value(value).unwrap();
        assert_eq!(back, el);
    }
}
