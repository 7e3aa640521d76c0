//! Canvas background.

use serde::{Deserialize, Serialize};

/// How the background value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    /// A CSS color string.
    Color,
    /// A data URL of an encoded image.
    Image,
    /// A `linear-gradient(...)` spec.
    Gradient,
}

/// The layer painted under all elements. Its size is the canvas working size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    pub value: String,
    pub width: f64,
    pub height: f64,
}

impl Background {
    pub fn color(value: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            kind: BackgroundKind::Color,
            value: value.into(),
            width,
            height,
        }
    }

    pub fn image(data_url: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            kind: BackgroundKind::Image,
            value: data_url.into(),
            width,
            height,
        }
    }

    pub fn gradient(spec: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            kind: BackgroundKind::Gradient,
            value: spec.into(),
            width,
            height,
        }
    }

    /// Whether the declared size can be used as a canvas size.
    pub fn has_valid_size(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Result of decoding a template image, delivered to the canvas once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    /// Data URL of the encoded image.
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

impl TemplateInfo {
    pub fn into_background(self) -> Background {
        Background::image(self.data_url, self.width as f64, self.height as f64)
    }
}
