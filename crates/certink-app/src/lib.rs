//! CertInk Application
//!
//! Headless host that loads a layout, a template image and row data,
//! then renders a preview or a full batch of certificates.

pub mod commands;
pub mod inputs;
pub mod sinks;

pub use commands::{GenerateOptions, OutputKind, PreviewOptions, load_config, run_generate, run_preview};
pub use inputs::{build_canvas, load_layout, load_rows};
pub use sinks::{DirectorySink, ZipSink};
