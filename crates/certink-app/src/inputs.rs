//! Loading layout, template and row data from disk.

use anyhow::{Context as _, bail};
use certink_core::binding::TabularData;
use certink_core::canvas::Canvas;
use certink_core::document::LayoutDocument;
use certink_render::{ExportConfig, template_result};
use std::fs;
use std::path::Path;

/// Read a layout document saved as JSON.
pub fn load_layout(path: &Path) -> anyhow::Result<LayoutDocument> {
    LayoutDocument::load(path).with_context(|| format!("load layout '{}'", path.display()))
}

/// Read rows as `{ "headers": [...], "rows": [{...}, ...] }`.
///
/// When `headers` is missing the keys of the first row are used, which
/// loses the original column order.
pub fn load_rows(path: &Path) -> anyhow::Result<TabularData> {
    let json = fs::read_to_string(path).with_context(|| format!("read rows '{}'", path.display()))?;
    let mut data: TabularData =
        serde_json::from_str(&json).with_context(|| format!("parse rows '{}'", path.display()))?;
    if data.headers.is_empty() {
        if let Some(first) = data.rows.first() {
            log::warn!("No headers in '{}', using first row keys", path.display());
            data.headers = first.keys().cloned().collect();
        }
    }
    log::debug!("Loaded {} rows with {} columns", data.row_count(), data.headers.len());
    Ok(data)
}

/// Build a canvas from a layout, optionally replacing its background
/// with a template image.
pub fn build_canvas(layout: LayoutDocument, template: Option<&[u8]>, config: &ExportConfig) -> anyhow::Result<Canvas> {
    let mut canvas = layout.into_canvas();
    canvas.set_history_limit(config.history_limit);
    if let Some(bytes) = template {
        canvas.apply_template_result(template_result(bytes));
        if let Some(message) = canvas.template_error() {
            bail!("template image could not be decoded: {message}");
        }
    }
    Ok(canvas)
}
