//! Renderer trait abstraction and rendered output.

use base64::Engine;
use certink_core::binding::Row;
use certink_core::canvas::Scene;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid output size {width}x{height}")]
    InvalidSize { width: f64, height: f64 },
    #[error("Invalid background: {0}")]
    InvalidBackground(String),
    #[error("No font available for family {0:?}")]
    FontUnavailable(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// Boxed future returned by [`FrameRenderer::settle`].
pub type SettleFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a>>;

/// A rasterized frame with straight (non-premultiplied) RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderedFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, pixels }
    }

    /// RGBA of the pixel at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let p = self.pixels.get(idx..idx + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| RendererError::Encode(e.to_string()))?;
            writer
                .write_image_data(&self.pixels)
                .map_err(|e| RendererError::Encode(e.to_string()))?;
        }
        Ok(png_data)
    }

    /// Encode as a `data:image/png;base64,` URL.
    pub fn to_data_url(&self) -> RenderResult<String> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

/// Something that can rasterize a scene.
pub trait FrameRenderer {
    /// Bind a data row to the design before capture.
    fn bind_row(&mut self, scene: &Scene, row: &Row) -> Scene {
        scene.with_row(row)
    }

    /// Rasterize `scene`. Must be deterministic for the same scene.
    fn render_frame(&mut self, scene: &Scene) -> RenderResult<RenderedFrame>;

    /// Suspension point awaited between binding a row and capturing it.
    ///
    /// The default yields to the executor once.
    fn settle(&mut self) -> SettleFuture<'_> {
        Box::pin(yield_now())
    }
}

/// Future that returns `Pending` once before completing.
#[derive(Debug, Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yield control to the executor once.
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_signature_and_size() {
        let frame = RenderedFrame::new(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 128]);
        let png = frame.to_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 255, 128]);
    }

    #[test]
    fn test_pixel_bounds() {
        let frame = RenderedFrame::new(1, 1, vec![1, 2, 3, 4]);
        assert_eq!(frame.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(frame.pixel(1, 0), None);
    }

    #[test]
    fn test_mismatched_buffer_fails_to_encode() {
        let frame = RenderedFrame::new(4, 4, vec![0; 3]);
        assert!(matches!(frame.to_png(), Err(RendererError::Encode(_))));
    }

    #[test]
    fn test_data_url_prefix() {
        let frame = RenderedFrame::new(1, 1, vec![0, 0, 0, 0]);
        assert!(frame.to_data_url().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_yield_now_completes() {
        pollster::block_on(yield_now());
    }
}
