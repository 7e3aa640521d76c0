//! Per-row batch generation and single-row preview.

use crate::config::ExportConfig;
use crate::renderer::{FrameRenderer, RenderedFrame, RendererError, yield_now};
use certink_core::binding::{Row, TabularData, unbound_keys};
use certink_core::canvas::Scene;
use std::collections::HashSet;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Characters that may not appear in output file names.
const ILLEGAL_FILE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Errors that stop generation before any row is processed, plus
/// the failure of the single preview row.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("No template background is loaded")]
    MissingBackground,
    #[error("No data source is attached")]
    MissingData,
    #[error("The data source has no rows")]
    NoRows,
    #[error(transparent)]
    Render(#[from] RendererError),
    #[error("Row processing panicked: {0}")]
    Panicked(String),
    #[error("Generation was cancelled")]
    Cancelled,
}

/// Cooperative cancellation flag shared between a host and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One failed row, by 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub row: usize,
    pub message: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub success_count: usize,
    /// Rows the run was asked to process.
    pub total: usize,
    pub failures: Vec<RowFailure>,
    pub cancelled: bool,
}

impl BatchReport {
    /// 1-based positions of the rows that failed.
    pub fn failed_rows(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.row).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        !self.cancelled && self.failures.is_empty() && self.success_count == self.total
    }

    /// Human readable summary for host notifications.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} of {} certificates were generated successfully.",
            self.success_count, self.total
        );
        if !self.failures.is_empty() {
            let rows: Vec<String> = self.failed_rows().iter().map(|r| r.to_string()).collect();
            text.push_str(&format!(" Could not generate certificates for rows: {}.", rows.join(", ")));
        }
        if self.cancelled {
            text.push_str(" Generation was cancelled.");
        }
        text
    }
}

/// A named output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// The collected outputs of a batch, with a suggested archive name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub name: String,
    pub entries: Vec<ArchiveEntry>,
}

impl Archive {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.file_name.as_str()).collect()
    }
}

/// Destination for a finished archive. Compression and disk I/O live
/// in the implementor.
pub trait ArchiveSink {
    fn write_archive(&mut self, archive: &Archive) -> io::Result<()>;
}

/// Progress notifications from a batch run. All methods default to no-ops.
pub trait BatchObserver {
    fn on_started(&mut self, _total: usize) {}
    fn on_row_done(&mut self, _row: usize, _file_name: &str) {}
    fn on_row_failed(&mut self, _row: usize, _message: &str) {}
    fn on_finished(&mut self, _report: &BatchReport) {}
}

/// Observer that reports progress through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl BatchObserver for LogObserver {
    fn on_started(&mut self, total: usize) {
        log::info!("Generating {} certificates", total);
    }

    fn on_row_done(&mut self, row: usize, file_name: &str) {
        log::debug!("Row {} rendered as {}", row, file_name);
    }

    fn on_row_failed(&mut self, row: usize, message: &str) {
        log::warn!("Error generating certificate for row {}: {}", row, message);
    }

    fn on_finished(&mut self, report: &BatchReport) {
        log::info!("{}", report.summary());
    }
}

/// Parameters for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub config: ExportConfig,
    /// Optional user-supplied row count.
    pub custom_count: Option<f64>,
    pub cancel: CancelToken,
}

impl BatchRequest {
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_count(mut self, count: Option<f64>) -> Self {
        self.custom_count = count;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Report plus the archive, which exists only if some row succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub report: BatchReport,
    pub archive: Option<Archive>,
}

impl BatchOutcome {
    /// Hand the archive to `sink`. Returns whether anything was written.
    pub fn deliver(&self, sink: &mut dyn ArchiveSink) -> io::Result<bool> {
        match &self.archive {
            Some(archive) => {
                sink.write_archive(archive)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Number of rows to process: all rows, or `floor(count)` capped at the
/// row count when a positive count is supplied.
pub fn resolve_limit(custom_count: Option<f64>, total_rows: usize) -> usize {
    match custom_count {
        Some(count) if count.is_finite() && count > 0.0 => (count.floor() as usize).min(total_rows),
        _ => total_rows,
    }
}

/// Strip illegal characters, collapse whitespace runs, and trim.
pub fn sanitize_file_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !ILLEGAL_FILE_CHARS.contains(c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assigns unique file names within one batch.
#[derive(Debug)]
pub struct FileNamer {
    used: HashSet<String>,
    fallback_prefix: String,
    extension: String,
}

impl FileNamer {
    pub fn new(fallback_prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            used: HashSet::new(),
            fallback_prefix: fallback_prefix.into(),
            extension: extension.into(),
        }
    }

    /// Base name from the value under `name_column`, or the positional fallback.
    pub fn base_name(&self, row: &Row, name_column: Option<&str>, position: usize) -> String {
        let raw = name_column
            .and_then(|column| row.get(column))
            .and_then(|value| value.as_display())
            .unwrap_or_default();
        let sanitized = sanitize_file_name(&raw);
        if sanitized.is_empty() {
            format!("{}_{}", self.fallback_prefix, position)
        } else {
            sanitized
        }
    }

    /// Reserve a file name for `base`, appending ` (k)` on collision.
    pub fn claim(&mut self, base: &str) -> String {
        let mut file_name = format!("{}.{}", base, self.extension);
        let mut k = 1;
        while self.used.contains(&file_name) {
            file_name = format!("{} ({}).{}", base, k, self.extension);
            k += 1;
        }
        self.used.insert(file_name.clone());
        file_name
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> GenerateError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    GenerateError::Panicked(message)
}

fn check_preconditions<'d>(scene: &Scene, data: Option<&'d TabularData>) -> Result<&'d TabularData, GenerateError> {
    if scene.background.is_none() {
        return Err(GenerateError::MissingBackground);
    }
    data.ok_or(GenerateError::MissingData)
}

/// Bind a row, wait for the renderer to settle, and capture a frame.
///
/// Panics in binding or rendering are converted to errors. Cancellation is
/// honored up to the capture; once a frame is captured the row completes.
async fn render_row<R: FrameRenderer + ?Sized>(
    renderer: &mut R,
    scene: &Scene,
    row: &Row,
    cancel: &CancelToken,
) -> Result<RenderedFrame, GenerateError> {
    let bound = catch_unwind(AssertUnwindSafe(|| renderer.bind_row(scene, row))).map_err(panic_message)?;
    renderer.settle().await;
    if cancel.is_cancelled() {
        return Err(GenerateError::Cancelled);
    }
    let frame = catch_unwind(AssertUnwindSafe(|| renderer.render_frame(&bound))).map_err(panic_message)??;
    Ok(frame)
}

/// Render one output file per row and collect them into an archive.
///
/// Row failures are recorded and never abort the run. Only missing
/// inputs short-circuit, before any row is touched.
pub async fn generate_batch<R: FrameRenderer + ?Sized>(
    renderer: &mut R,
    scene: &Scene,
    data: Option<&TabularData>,
    request: &BatchRequest,
    observer: &mut dyn BatchObserver,
) -> Result<BatchOutcome, GenerateError> {
    let data = check_preconditions(scene, data)?;
    let total = resolve_limit(request.custom_count, data.row_count());

    for key in unbound_keys(&scene.elements, data) {
        log::warn!("Data key {:?} has no matching column", key);
    }

    let config = &request.config;
    let mut namer = FileNamer::new(config.fallback_prefix.clone(), config.file_extension.clone());
    let mut report = BatchReport {
        total,
        ..BatchReport::default()
    };
    let mut entries = Vec::new();
    observer.on_started(total);

    for (index, row) in data.rows.iter().take(total).enumerate() {
        let position = index + 1;
        if request.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let result = render_row(renderer, scene, row, &request.cancel)
            .await
            .and_then(|frame| frame.to_png().map_err(GenerateError::from));

        match result {
            Ok(png) => {
                let base = namer.base_name(row, data.first_header(), position);
                let file_name = namer.claim(&base);
                observer.on_row_done(position, &file_name);
                entries.push(ArchiveEntry { file_name, data: png });
                report.success_count += 1;
            }
            Err(GenerateError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(err) => {
                let message = err.to_string();
                observer.on_row_failed(position, &message);
                report.failures.push(RowFailure { row: position, message });
            }
        }
        yield_now().await;
    }

    observer.on_finished(&report);
    let archive = (report.success_count > 0).then(|| Archive {
        name: config.archive_name.clone(),
        entries,
    });
    Ok(BatchOutcome { report, archive })
}

/// Render the first row without archiving.
pub async fn preview<R: FrameRenderer + ?Sized>(
    renderer: &mut R,
    scene: &Scene,
    data: Option<&TabularData>,
) -> Result<RenderedFrame, GenerateError> {
    let data = check_preconditions(scene, data)?;
    let row = data.row(0).ok_or(GenerateError::NoRows)?;
    log::debug!("Rendering preview of first row");
    render_row(renderer, scene, row, &CancelToken::new()).await
}
