//! Line breaking and truncation for text boxes.

use certink_core::elements::WrapMode;
use unicode_segmentation::UnicodeSegmentation;

/// Inner padding of a text box, in canvas pixels.
pub const TEXT_PADDING: f64 = 2.0;
pub const ELLIPSIS: char = '…';

/// Width of a run of text in canvas pixels.
pub trait TextMeasure {
    fn measure(&self, text: &str) -> f64;
}

impl<F: Fn(&str) -> f64> TextMeasure for F {
    fn measure(&self, text: &str) -> f64 {
        self(text)
    }
}

/// Box and paragraph settings for a layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutBox {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
    /// Line advance in canvas pixels.
    pub line_height: f64,
    pub wrap: WrapMode,
    pub ellipsis: bool,
}

impl LayoutBox {
    fn max_width(&self) -> f64 {
        (self.width - self.padding * 2.0).max(0.0)
    }

    /// Lines that fit vertically. At least one line is always laid out.
    fn max_lines(&self) -> usize {
        if self.line_height <= 0.0 {
            return usize::MAX;
        }
        let avail = (self.height - self.padding * 2.0).max(0.0);
        ((avail / self.line_height).floor() as usize).max(1)
    }
}

/// One laid-out line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub width: f64,
}

/// Break `content` into lines that fit `bounds`.
///
/// Lines break between extended grapheme clusters, so combining marks stay
/// with their base. Only `max_lines + 1` lines are ever wrapped.
pub fn layout_lines(content: &str, bounds: &LayoutBox, measure: &dyn TextMeasure) -> Vec<Line> {
    let max_width = bounds.max_width();
    let max_lines = bounds.max_lines();

    let mut lines: Vec<String> = Vec::new();
    for paragraph in content.split('\n') {
        let limit = max_lines.saturating_add(1) - lines.len();
        lines.extend(wrap_paragraph(paragraph, max_width, bounds.wrap, measure, limit));
        if lines.len() > max_lines {
            break;
        }
    }
    let truncated = lines.len() > max_lines;
    lines.truncate(max_lines);

    if bounds.ellipsis {
        if truncated {
            if let Some(last) = lines.last_mut() {
                *last = with_ellipsis(last, max_width, measure);
            }
        }
        if bounds.wrap == WrapMode::None {
            for line in lines.iter_mut() {
                if measure.measure(line) > max_width {
                    *line = with_ellipsis(line, max_width, measure);
                }
            }
        }
    }

    lines
        .into_iter()
        .map(|text| {
            let width = measure.measure(&text);
            Line { text, width }
        })
        .collect()
}

fn is_break(grapheme: &str) -> bool {
    grapheme == "-" || grapheme.chars().all(char::is_whitespace)
}

/// Wrap one paragraph into at most `limit` lines.
fn wrap_paragraph(
    paragraph: &str,
    max_width: f64,
    wrap: WrapMode,
    measure: &dyn TextMeasure,
    limit: usize,
) -> Vec<String> {
    if wrap == WrapMode::None || paragraph.is_empty() {
        return vec![paragraph.to_string()];
    }

    let graphemes: Vec<(usize, &str)> = paragraph.grapheme_indices(true).collect();
    let n = graphemes.len();
    let offset = |i: usize| graphemes.get(i).map_or(paragraph.len(), |(at, _)| *at);

    let mut out = Vec::new();
    let mut start = 0;
    while start < n && out.len() < limit {
        let take = longest_fitting(n - start, |k| {
            measure.measure(&paragraph[offset(start)..offset(start + k)]) <= max_width
        })
        .max(1);
        let mut end = start + take;

        if wrap == WrapMode::Word && end < n && !is_break(graphemes[end].1) {
            // Break after the last space or hyphen on the line
            if let Some(pos) = (start + 1..end).rev().find(|&i| is_break(graphemes[i].1)) {
                end = pos + 1;
            }
        }

        let line = &paragraph[offset(start)..offset(end)];
        let line = if end == n { line } else { line.trim_end() };
        out.push(line.to_string());

        start = end;
        while start < n && graphemes[start].1.chars().all(char::is_whitespace) {
            start += 1;
        }
    }
    out
}

/// Largest `k` in `0..=count` with `fits(k)`, assuming `fits` is monotone.
///
/// Gallops up from zero before bisecting, so the cost follows the length of
/// the answer rather than `count`.
fn longest_fitting(count: usize, fits: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi, mut step) = (0, count, 1);
    while lo + step < count {
        if fits(lo + step) {
            lo += step;
            step *= 2;
        } else {
            hi = lo + step - 1;
            break;
        }
    }
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Trim `text` from the end until it fits with a trailing ellipsis.
fn with_ellipsis(text: &str, max_width: f64, measure: &dyn TextMeasure) -> String {
    let text = text.trim_end();
    let offsets: Vec<usize> = text
        .grapheme_indices(true)
        .map(|(at, _)| at)
        .chain(std::iter::once(text.len()))
        .collect();
    let keep = longest_fitting(offsets.len() - 1, |k| {
        measure.measure(&format!("{}{}", &text[..offsets[k]], ELLIPSIS)) <= max_width
    });
    format!("{}{}", text[..offsets[keep]].trim_end(), ELLIPSIS)
}
