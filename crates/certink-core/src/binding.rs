//! Data binding: projecting a tabular row onto bound text elements.

use crate::elements::{Element, ElementKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single cell of parsed tabular data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// String form used when binding. `None` for null cells.
    pub fn as_display(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{b}"),
            // Integral values print without a fractional part
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// One data row: column name to value.
pub type Row = BTreeMap<String, CellValue>;

/// Parsed tabular data: ordered column names and ordered rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularData {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl TabularData {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// First declared column, used for naming outputs.
    pub fn first_header(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.headers.iter().any(|h| h == key)
    }
}

/// Return a copy of `elements` with bound text contents replaced from `row`.
///
/// Elements without a key, with a key absent from the row, or whose cell is
/// null are copied unchanged. Ids, order and geometry are preserved.
pub fn apply_row(elements: &[Element], row: &Row) -> Vec<Element> {
    let mut out = elements.to_vec();
    apply_row_in_place(&mut out, row);
    out
}

/// In-place variant of [`apply_row`]. Returns the number of elements rewritten.
pub fn apply_row_in_place(elements: &mut [Element], row: &Row) -> usize {
    let mut rewritten = 0;
    for element in elements.iter_mut() {
        let ElementKind::Text(text) = &mut element.kind else {
            continue;
        };
        let Some(key) = text.data_key.as_deref() else {
            continue;
        };
        if let Some(value) = row.get(key).and_then(CellValue::as_display) {
            text.content = value;
            rewritten += 1;
        }
    }
    rewritten
}

/// Data keys used by `elements` that are not columns of `data`.
pub fn unbound_keys(elements: &[Element], data: &TabularData) -> Vec<String> {
    let keys: BTreeSet<&str> = elements
        .iter()
        .filter_map(|e| e.as_text().and_then(|t| t.data_key.as_deref()))
        .filter(|key| !data.has_column(key))
        .collect();
    keys.into_iter().map(str::to_string).collect()
}
