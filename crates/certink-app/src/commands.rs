//! Preview and batch generation commands.

use crate::inputs::{build_canvas, load_layout, load_rows};
use crate::sinks::{DirectorySink, ZipSink};
use anyhow::{Context as _, bail};
use certink_render::{
    ArchiveSink, BatchReport, BatchRequest, ExportConfig, FrameRenderer, LogObserver, SkiaRenderer,
    generate_batch, preview,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Load the export config, then apply command-line overrides.
pub fn load_config(path: Option<&Path>, pixel_ratio: Option<f64>) -> anyhow::Result<ExportConfig> {
    let mut config = match path {
        Some(path) => ExportConfig::load(path).with_context(|| format!("load config '{}'", path.display()))?,
        None => ExportConfig::default(),
    };
    if let Some(ratio) = pixel_ratio {
        config.pixel_ratio = ratio;
    }
    config.validate().context("invalid export settings")?;
    Ok(config)
}

fn read_template(path: Option<&Path>) -> anyhow::Result<Option<Vec<u8>>> {
    path.map(|p| fs::read(p).with_context(|| format!("read template '{}'", p.display())))
        .transpose()
}

#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub layout: PathBuf,
    pub template: Option<PathBuf>,
    pub rows: PathBuf,
    pub out: PathBuf,
    pub config: ExportConfig,
}

/// Render the first row to a PNG file.
pub fn run_preview(options: &PreviewOptions) -> anyhow::Result<()> {
    let layout = load_layout(&options.layout)?;
    let template = read_template(options.template.as_deref())?;
    let canvas = build_canvas(layout, template.as_deref(), &options.config)?;
    let data = load_rows(&options.rows)?;

    let mut renderer = SkiaRenderer::with_config(&options.config);
    let frame = pollster::block_on(preview(&mut renderer, canvas.scene(), Some(&data)))
        .context("could not generate a preview image")?;
    let png = frame.to_png()?;

    if let Some(parent) = options.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    fs::write(&options.out, png).with_context(|| format!("write png '{}'", options.out.display()))?;
    log::info!("Preview written to {} ({}x{})", options.out.display(), frame.width, frame.height);
    Ok(())
}

/// How batch output is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    #[default]
    Zip,
    Directory,
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub layout: PathBuf,
    pub template: Option<PathBuf>,
    pub rows: PathBuf,
    /// Zip path, directory for the zip, or directory for loose files.
    pub out: PathBuf,
    pub output: OutputKind,
    pub count: Option<f64>,
    pub config: ExportConfig,
}

/// Render every selected row and write the successes.
pub fn run_generate(options: &GenerateOptions) -> anyhow::Result<BatchReport> {
    let mut renderer = SkiaRenderer::with_config(&options.config);
    run_generate_with(&mut renderer, options)
}

/// As [`run_generate`], with a caller-supplied renderer.
pub fn run_generate_with<R: FrameRenderer + ?Sized>(
    renderer: &mut R,
    options: &GenerateOptions,
) -> anyhow::Result<BatchReport> {
    let layout = load_layout(&options.layout)?;
    let template = read_template(options.template.as_deref())?;
    let canvas = build_canvas(layout, template.as_deref(), &options.config)?;
    let data = load_rows(&options.rows)?;

    let request = BatchRequest::new(options.config.clone()).with_count(options.count);
    let outcome = pollster::block_on(generate_batch(
        renderer,
        canvas.scene(),
        Some(&data),
        &request,
        &mut LogObserver,
    ))
    .context("could not start generation")?;

    let mut sink: Box<dyn ArchiveSink> = match options.output {
        OutputKind::Zip => Box::new(ZipSink::new(&options.out)),
        OutputKind::Directory => Box::new(DirectorySink::new(&options.out)),
    };
    let written = outcome
        .deliver(sink.as_mut())
        .with_context(|| format!("write output to '{}'", options.out.display()))?;
    if !written && outcome.report.total > 0 {
        bail!("no certificates were generated: {}", outcome.report.summary());
    }
    Ok(outcome.report)
}
