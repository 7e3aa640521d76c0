//! Decorative shape element. Kept in the model; the renderer skips it.

use super::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Circle,
    Line,
    Arrow,
}

fn default_stroke_width() -> f64 {
    1.0
}

/// Shape payload of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    pub shape: ShapeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Color>,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub corner_radius: f64,
}

impl ShapeElement {
    pub fn new(shape: ShapeKind) -> Self {
        Self {
            shape,
            fill: None,
            stroke: Some(Color::black()),
            stroke_width: 1.0,
            corner_radius: 0.0,
        }
    }
}
