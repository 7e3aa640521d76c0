//! CertInk Render Library
//!
//! Rasterizes scenes to RGBA frames and drives per-row batch generation.
//! The default implementation is a CPU renderer built on tiny-skia.

pub mod batch;
pub mod config;
pub mod fonts;
pub mod layout;
mod renderer;
pub mod skia;
pub mod template;

pub use batch::{
    Archive, ArchiveEntry, ArchiveSink, BatchObserver, BatchOutcome, BatchReport, BatchRequest, CancelToken,
    FileNamer, GenerateError, LogObserver, RowFailure, generate_batch, preview, resolve_limit, sanitize_file_name,
};
pub use config::{ConfigError, ExportConfig};
pub use fonts::{FontBook, list_font_families};
pub use renderer::{FrameRenderer, RenderResult, RenderedFrame, RendererError, SettleFuture, yield_now};
pub use skia::SkiaRenderer;
pub use template::{TemplateError, decode_template, template_result};
