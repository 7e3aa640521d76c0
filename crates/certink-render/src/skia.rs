//! CPU rasterizer built on tiny-skia with rusttype glyph coverage.

use crate::config::ExportConfig;
use crate::fonts::{FontBook, SharedFont};
use crate::layout::{LayoutBox, Line, TEXT_PADDING, TextMeasure, layout_lines};
use crate::renderer::{FrameRenderer, RenderResult, RenderedFrame, RendererError, SettleFuture, yield_now};
use crate::template::decode_image_url;
use certink_core::background::{Background, BackgroundKind};
use certink_core::canvas::Scene;
use certink_core::elements::{Color, Element, ElementKind, TextAlign, TextDecoration, TextElement, VerticalAlign};
use kurbo::Affine;
use rusttype::{Font, Scale, point};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tiny_skia::{
    BlendMode, FilterQuality, GradientStop, LinearGradient, Paint, Pixmap, PixmapPaint, Point, Rect,
    SpreadMode, Transform,
};

/// Largest offscreen or output dimension, in device pixels.
const MAX_DIMENSION: u32 = 16384;

fn to_skia_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

/// Convert a kurbo affine to a tiny-skia transform.
fn to_skia_transform(affine: Affine) -> Transform {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    Transform::from_row(a as f32, b as f32, c as f32, d as f32, e as f32, f as f32)
}

/// Width measurement with a specific font at canvas scale.
struct FontMeasure<'a> {
    font: &'a Font<'static>,
    scale: Scale,
    letter_spacing: f64,
}

impl FontMeasure<'_> {
    /// Advance of each char, including kerning with its predecessor.
    fn advances<'s>(&'s self, text: &'s str) -> impl Iterator<Item = (char, f64)> + 's {
        let mut prev = None;
        text.chars().map(move |c| {
            let glyph = self.font.glyph(c);
            let id = glyph.id();
            let mut advance = glyph.scaled(self.scale).h_metrics().advance_width as f64;
            if let Some(prev) = prev {
                advance += self.font.pair_kerning(self.scale, prev, id) as f64;
            }
            prev = Some(id);
            (c, advance)
        })
    }
}

impl TextMeasure for FontMeasure<'_> {
    fn measure(&self, text: &str) -> f64 {
        let count = text.chars().count();
        let glyphs: f64 = self.advances(text).map(|(_, a)| a).sum();
        glyphs + self.letter_spacing * count.saturating_sub(1) as f64
    }
}

/// Source-over a straight color with `coverage` into a premultiplied pixmap.
fn blend_coverage(pixmap: &mut Pixmap, x: i32, y: i32, coverage: f32, color: Color) {
    if x < 0 || y < 0 || x as u32 >= pixmap.width() || y as u32 >= pixmap.height() {
        return;
    }
    let sa = (color.a as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let idx = ((y as u32 * pixmap.width() + x as u32) * 4) as usize;
    let data = pixmap.data_mut();
    let src = [
        color.r as f32 * sa,
        color.g as f32 * sa,
        color.b as f32 * sa,
        255.0 * sa,
    ];
    for (i, s) in src.iter().enumerate() {
        let d = data[idx + i] as f32;
        data[idx + i] = (s + d * (1.0 - sa)).round().clamp(0.0, 255.0) as u8;
    }
}

/// Parse `linear-gradient(<angle>, <color> [<pos>%], ...)`.
///
/// Returns the CSS angle in degrees and stops with positions in 0..=1.
pub fn parse_linear_gradient(spec: &str) -> Option<(f64, Vec<(Color, f32)>)> {
    let inner = spec
        .trim()
        .strip_prefix("linear-gradient(")?
        .strip_suffix(')')?;

    // Split on commas outside parentheses
    let mut parts = Vec::new();
    let (mut depth, mut start) = (0i32, 0usize);
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(inner[start..].trim());

    let mut angle = 180.0;
    let first = parts.first()?;
    let stop_parts = if let Some(deg) = first.strip_suffix("deg") {
        angle = deg.trim().parse::<f64>().ok()?;
        &parts[1..]
    } else if let Some(direction) = first.strip_prefix("to ") {
        angle = match direction.trim() {
            "top" => 0.0,
            "top right" | "right top" => 45.0,
            "right" => 90.0,
            "bottom right" | "right bottom" => 135.0,
            "bottom" => 180.0,
            "bottom left" | "left bottom" => 225.0,
            "left" => 270.0,
            "top left" | "left top" => 315.0,
            _ => return None,
        };
        &parts[1..]
    } else {
        &parts[..]
    };

    let mut stops: Vec<(Color, Option<f32>)> = Vec::new();
    for part in stop_parts {
        let (color, pos) = match part.rsplit_once(char::is_whitespace) {
            Some((c, p)) if p.ends_with('%') => {
                let pct = p.trim_end_matches('%').parse::<f32>().ok()?;
                (c.trim(), Some((pct / 100.0).clamp(0.0, 1.0)))
            }
            _ => (*part, None),
        };
        stops.push((Color::parse(color)?, pos));
    }
    if stops.is_empty() {
        return None;
    }

    // Unpositioned stops are spread evenly
    let last = (stops.len() - 1).max(1) as f32;
    let resolved = stops
        .iter()
        .enumerate()
        .map(|(i, (c, p))| (*c, p.unwrap_or(i as f32 / last)))
        .collect();
    Some((angle, resolved))
}

/// Headless renderer producing RGBA frames at a fixed pixel ratio.
#[derive(Debug)]
pub struct SkiaRenderer {
    pixel_ratio: f64,
    settle_delay: Duration,
    fonts: FontBook,
    /// Decoded background images keyed by data URL.
    images: HashMap<String, Pixmap>,
}

impl Default for SkiaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkiaRenderer {
    pub fn new() -> Self {
        Self::with_config(&ExportConfig::default())
    }

    pub fn with_config(config: &ExportConfig) -> Self {
        Self {
            pixel_ratio: config.pixel_ratio,
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            fonts: FontBook::new(),
            images: HashMap::new(),
        }
    }

    pub fn with_fonts(mut self, fonts: FontBook) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn fonts_mut(&mut self) -> &mut FontBook {
        &mut self.fonts
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn set_pixel_ratio(&mut self, pixel_ratio: f64) {
        self.pixel_ratio = pixel_ratio;
    }

    fn output_size(&self, scene: &Scene) -> RenderResult<(u32, u32)> {
        let width = (scene.canvas_size.width * self.pixel_ratio).ceil();
        let height = (scene.canvas_size.height * self.pixel_ratio).ceil();
        let valid = |v: f64| v.is_finite() && v >= 1.0 && v <= MAX_DIMENSION as f64;
        if !valid(width) || !valid(height) {
            return Err(RendererError::InvalidSize { width, height });
        }
        Ok((width as u32, height as u32))
    }

    fn paint_background(&mut self, pixmap: &mut Pixmap, background: &Background) -> RenderResult<()> {
        match background.kind {
            BackgroundKind::Color => {
                let color = Color::parse(&background.value).ok_or_else(|| {
                    RendererError::InvalidBackground(format!("bad color {:?}", background.value))
                })?;
                pixmap.fill(to_skia_color(color));
            }
            BackgroundKind::Image => {
                let (w, h) = (pixmap.width() as f32, pixmap.height() as f32);
                let image = self.background_image(&background.value)?;
                let sx = w / image.width() as f32;
                let sy = h / image.height() as f32;
                let paint = PixmapPaint {
                    quality: FilterQuality::Bicubic,
                    ..PixmapPaint::default()
                };
                pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, Transform::from_scale(sx, sy), None);
            }
            BackgroundKind::Gradient => {
                let (angle, stops) = parse_linear_gradient(&background.value).ok_or_else(|| {
                    RendererError::InvalidBackground(format!("bad gradient {:?}", background.value))
                })?;
                self.paint_gradient(pixmap, angle, &stops)?;
            }
        }
        Ok(())
    }

    fn background_image(&mut self, url: &str) -> RenderResult<&Pixmap> {
        if !self.images.contains_key(url) {
            let decoded = decode_image_url(url)
                .map_err(|e| RendererError::InvalidBackground(e.to_string()))?
                .to_rgba8();
            let (w, h) = decoded.dimensions();
            let mut pixmap = Pixmap::new(w, h)
                .ok_or_else(|| RendererError::InvalidBackground("empty image".to_string()))?;
            for (dst, src) in pixmap.pixels_mut().iter_mut().zip(decoded.pixels()) {
                let [r, g, b, a] = src.0;
                *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
            }
            log::debug!("Decoded background image {}x{}", w, h);
            self.images.insert(url.to_string(), pixmap);
        }
        self.images
            .get(url)
            .ok_or_else(|| RendererError::RenderFailed("image cache miss".to_string()))
    }

    fn paint_gradient(&self, pixmap: &mut Pixmap, angle: f64, stops: &[(Color, f32)]) -> RenderResult<()> {
        let (w, h) = (pixmap.width() as f64, pixmap.height() as f64);
        if let [(only, _)] = stops {
            pixmap.fill(to_skia_color(*only));
            return Ok(());
        }
        // CSS: 0deg points up, angles grow clockwise
        let (sin, cos) = angle.to_radians().sin_cos();
        let length = (w * sin).abs() + (h * cos).abs();
        let (cx, cy) = (w / 2.0, h / 2.0);
        let (dx, dy) = (sin * length / 2.0, -cos * length / 2.0);
        let start = Point::from_xy((cx - dx) as f32, (cy - dy) as f32);
        let end = Point::from_xy((cx + dx) as f32, (cy + dy) as f32);

        let gradient_stops = stops
            .iter()
            .map(|(c, p)| GradientStop::new(*p, to_skia_color(*c)))
            .collect();
        let shader = LinearGradient::new(start, end, gradient_stops, SpreadMode::Pad, Transform::identity())
            .ok_or_else(|| RendererError::InvalidBackground("degenerate gradient".to_string()))?;
        let mut paint = Paint::default();
        paint.shader = shader;
        let rect = Rect::from_xywh(0.0, 0.0, w as f32, h as f32)
            .ok_or_else(|| RendererError::RenderFailed("invalid gradient rect".to_string()))?;
        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
        Ok(())
    }

    fn paint_text(&mut self, pixmap: &mut Pixmap, element: &Element, text: &TextElement) -> RenderResult<()> {
        if text.content.is_empty() || element.width <= 0.0 || element.height <= 0.0 {
            return Ok(());
        }
        let kx = self.pixel_ratio * element.scale_x.abs();
        let ky = self.pixel_ratio * element.scale_y.abs();
        if kx < f64::EPSILON || ky < f64::EPSILON || text.font_size <= 0.0 {
            return Ok(());
        }

        let font: SharedFont = self
            .fonts
            .font_for(&text.font_family, text.font_style.is_bold(), text.font_style.is_italic())
            .ok_or_else(|| RendererError::FontUnavailable(text.font_family.clone()))?;

        let local_scale = Scale::uniform(text.font_size as f32);
        let measure = FontMeasure {
            font: &font,
            scale: local_scale,
            letter_spacing: text.letter_spacing,
        };
        let line_px = text.font_size * text.line_height;
        let bounds = LayoutBox {
            width: element.width,
            height: element.height,
            padding: TEXT_PADDING,
            line_height: line_px,
            wrap: text.wrap,
            ellipsis: text.ellipsis,
        };
        let lines = layout_lines(&text.content, &bounds, &measure);

        let v_metrics = font.v_metrics(local_scale);
        let (ascent, descent) = (v_metrics.ascent as f64, v_metrics.descent as f64);
        let total = lines.len() as f64 * line_px;
        let y0 = match text.vertical_align {
            VerticalAlign::Top => TEXT_PADDING,
            VerticalAlign::Middle => (element.height - total) / 2.0,
            VerticalAlign::Bottom => element.height - total - TEXT_PADDING,
        };
        let placed: Vec<(f64, f64, &Line)> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let x = match text.align {
                    TextAlign::Left => TEXT_PADDING,
                    TextAlign::Center => (element.width - line.width) / 2.0,
                    TextAlign::Right => element.width - line.width - TEXT_PADDING,
                };
                // Glyphs are centered vertically in their line box
                let baseline = y0 + i as f64 * line_px + line_px / 2.0 + (ascent + descent) / 2.0;
                (x, baseline, line)
            })
            .collect();

        // Offscreen extent in local units, grown to fit overflowing text
        let margin = text.font_size * 0.25;
        let left = placed.iter().map(|(x, _, _)| *x).fold(0.0, f64::min) - margin;
        let right = placed
            .iter()
            .map(|(x, _, l)| x + l.width)
            .fold(element.width, f64::max)
            + margin;
        let top = y0.min(0.0) - margin;
        let bottom = placed
            .iter()
            .map(|(_, b, _)| b - descent)
            .fold(element.height.max(y0 + total), f64::max)
            + margin;

        let off_w = ((right - left) * kx).ceil();
        let off_h = ((bottom - top) * ky).ceil();
        if off_w > MAX_DIMENSION as f64 || off_h > MAX_DIMENSION as f64 {
            return Err(RendererError::RenderFailed(format!(
                "text element {} is too large to rasterize",
                element.id()
            )));
        }
        let Some(mut offscreen) = Pixmap::new(off_w.max(1.0) as u32, off_h.max(1.0) as u32) else {
            return Ok(());
        };

        let device_scale = Scale {
            x: (text.font_size * kx) as f32,
            y: (text.font_size * ky) as f32,
        };
        for (x, baseline, line) in &placed {
            let mut caret = *x;
            for (c, advance) in measure.advances(&line.text) {
                let position = point(((caret - left) * kx) as f32, ((baseline - top) * ky) as f32);
                let glyph = font.glyph(c).scaled(device_scale).positioned(position);
                if let Some(bb) = glyph.pixel_bounding_box() {
                    glyph.draw(|gx, gy, v| {
                        blend_coverage(&mut offscreen, bb.min.x + gx as i32, bb.min.y + gy as i32, v, text.fill);
                    });
                }
                caret += advance + text.letter_spacing;
            }

            let decoration_y = match text.decoration {
                TextDecoration::None => None,
                TextDecoration::Underline => Some(baseline + text.font_size * 0.1),
                TextDecoration::LineThrough => Some(baseline - text.font_size * 0.28),
            };
            if let Some(dy) = decoration_y {
                let thickness = (text.font_size / 15.0).max(1.0 / ky);
                let rect = Rect::from_xywh(
                    ((x - left) * kx) as f32,
                    ((dy - thickness / 2.0 - top) * ky) as f32,
                    (line.width * kx) as f32,
                    (thickness * ky) as f32,
                );
                if let Some(rect) = rect {
                    let mut paint = Paint::default();
                    paint.set_color(to_skia_color(text.fill));
                    offscreen.fill_rect(rect, &paint, Transform::identity(), None);
                }
            }
        }

        let to_device = Affine::scale(self.pixel_ratio)
            * element.transform()
            * Affine::translate((left, top))
            * Affine::scale_non_uniform(1.0 / kx, 1.0 / ky);
        let paint = PixmapPaint {
            opacity: element.opacity.clamp(0.0, 1.0) as f32,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Bilinear,
        };
        pixmap.draw_pixmap(0, 0, offscreen.as_ref(), &paint, to_skia_transform(to_device), None);
        Ok(())
    }
}

impl FrameRenderer for SkiaRenderer {
    fn render_frame(&mut self, scene: &Scene) -> RenderResult<RenderedFrame> {
        let (width, height) = self.output_size(scene)?;
        let mut pixmap = Pixmap::new(width, height).ok_or(RendererError::InvalidSize {
            width: width as f64,
            height: height as f64,
        })?;

        if let Some(background) = &scene.background {
            self.paint_background(&mut pixmap, background)?;
        }

        for element in scene.ordered() {
            if !element.visible || element.opacity <= 0.0 {
                continue;
            }
            match &element.kind {
                ElementKind::Text(text) => self.paint_text(&mut pixmap, element, text)?,
                other => log::trace!("Skipping {} element {}", other.name(), element.id()),
            }
        }

        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for p in pixmap.pixels() {
            let c = p.demultiply();
            pixels.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(RenderedFrame::new(width, height, pixels))
    }

    fn settle(&mut self) -> SettleFuture<'_> {
        let deadline = Instant::now() + self.settle_delay;
        Box::pin(async move {
            yield_now().await;
            while Instant::now() < deadline {
                yield_now().await;
            }
        })
    }
}
