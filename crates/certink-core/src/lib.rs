//! CertInk Core Library
//!
//! Scene model, history, view, interaction and data binding for certificate layouts.

pub mod background;
pub mod binding;
pub mod canvas;
pub mod document;
pub mod elements;
pub mod events;
pub mod history;
pub mod interaction;
pub mod view;

pub use background::{Background, BackgroundKind, TemplateInfo};
pub use binding::{CellValue, Row, TabularData, apply_row, unbound_keys};
pub use canvas::{Canvas, Scene};
pub use document::{DocumentError, DocumentResult, LayoutDocument};
pub use elements::{Color, Element, ElementDraft, ElementId, ElementKind, ElementPatch, TextElement};
pub use events::{CanvasEvent, SubscriptionId};
pub use history::History;
pub use interaction::{Handle, HandleKind, InteractionController, MIN_ELEMENT_SIZE, handles_for};
pub use view::{MAX_ZOOM, MIN_ZOOM, View, WHEEL_ZOOM_STEP, ZOOM_STEP};
