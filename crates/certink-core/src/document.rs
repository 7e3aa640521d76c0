//! Layout documents: the saved form of a certificate design.

use crate::background::Background;
use crate::canvas::{Canvas, Scene};
use crate::elements::Element;
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

/// Errors reading or writing a layout file.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid layout JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for layout document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// A saved certificate layout: background, canvas size and elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub background: Option<Background>,
    pub canvas_size: Size,
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl LayoutDocument {
    /// Create an empty layout with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        let scene = Scene::default();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            background: None,
            canvas_size: scene.canvas_size,
            elements: Vec::new(),
        }
    }

    /// Capture the current design of a canvas.
    pub fn from_canvas(canvas: &Canvas, name: impl Into<String>) -> Self {
        let scene = canvas.scene();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            background: scene.background.clone(),
            canvas_size: scene.canvas_size,
            elements: scene.elements.clone(),
        }
    }

    pub fn scene(&self) -> Scene {
        Scene {
            elements: self.elements.clone(),
            background: self.background.clone(),
            canvas_size: self.canvas_size,
        }
    }

    /// Open this layout as an editable canvas with fresh history.
    pub fn into_canvas(self) -> Canvas {
        Canvas::from_scene(Scene {
            elements: self.elements,
            background: self.background,
            canvas_size: self.canvas_size,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read a layout from a JSON file.
    pub fn load(path: &Path) -> DocumentResult<Self> {
        let json = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let document = Self::from_json(&json)?;
        log::debug!(
            "Loaded layout {:?} with {} elements from {}",
            document.name,
            document.elements.len(),
            path.display()
        );
        Ok(document)
    }

    /// Write the layout as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> DocumentResult<()> {
        let io_error = |source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json()?).map_err(io_error)
    }
}
