//! Scene model and the runtime canvas that owns it.

use crate::background::{Background, TemplateInfo};
use crate::binding::{self, Row};
use crate::elements::{
    Color, Element, ElementDraft, ElementId, ElementPatch, FontStyle, TextAlign, VerticalAlign, generate_id,
    render_order,
};
use crate::events::{CanvasEvent, EventBus, Listener, SubscriptionId};
use crate::history::History;
use crate::view::{DEFAULT_CANVAS_SIZE, View};
use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Offset applied by `duplicate_element`.
pub const DUPLICATE_OFFSET: Vec2 = Vec2::new(10.0, 10.0);
/// Offset applied by `paste_elements`.
pub const PASTE_OFFSET: Vec2 = Vec2::new(20.0, 20.0);

/// Elements over an optional background, at a working canvas size.
///
/// This is the unit the renderer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub elements: Vec<Element>,
    pub background: Option<Background>,
    pub canvas_size: Size,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            elements: Vec::new(),
            background: None,
            canvas_size: DEFAULT_CANVAS_SIZE,
        }
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.element(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Highest z-index in the scene, never below zero.
    pub fn top_z(&self) -> i64 {
        self.elements.iter().map(|e| e.z_index).max().unwrap_or(0).max(0)
    }

    fn max_z(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.z_index).max()
    }

    fn min_z(&self) -> Option<i64> {
        self.elements.iter().map(|e| e.z_index).min()
    }

    /// Elements in render order (back to front).
    pub fn ordered(&self) -> Vec<&Element> {
        render_order(&self.elements)
    }

    /// Visible elements containing `point`, topmost first.
    pub fn elements_at_point(&self, point: Point, tolerance: f64) -> Vec<ElementId> {
        self.ordered()
            .into_iter()
            .rev()
            .filter(|e| e.visible && e.contains(point, tolerance))
            .map(|e| e.id)
            .collect()
    }

    /// A copy of this scene with `row` projected onto bound elements.
    pub fn with_row(&self, row: &Row) -> Scene {
        Scene {
            elements: binding::apply_row(&self.elements, row),
            background: self.background.clone(),
            canvas_size: self.canvas_size,
        }
    }

    fn set_z(&mut self, id: ElementId, z: i64) -> bool {
        match self.element_mut(id) {
            Some(element) if element.z_index != z => {
                element.z_index = z;
                true
            }
            _ => false,
        }
    }
}

/// Draft used by the "add text" action.
pub fn default_text_draft() -> ElementDraft {
    ElementDraft::text("New Text", 200.0, 50.0).at(100.0, 100.0)
}

/// Draft seeded onto an empty canvas when a template loads, if enabled.
pub fn recipient_placeholder_draft() -> ElementDraft {
    ElementDraft::text("Recipient Name", 360.0, 60.0)
        .at(80.0, 80.0)
        .with_text(|t| {
            t.font_size = 36.0;
            t.font_family = "Arial".into();
            t.font_style = FontStyle::Bold;
            t.fill = Color::rgb(0x11, 0x18, 0x27);
            t.align = TextAlign::Center;
            t.vertical_align = VerticalAlign::Middle;
        })
}

/// The mutable design state: scene, selection, clipboard, view and history.
///
/// All operations are total over the id space: unknown ids are ignored.
#[derive(Debug, Default)]
pub struct Canvas {
    scene: Scene,
    selection: Vec<ElementId>,
    clipboard: Vec<Element>,
    view: View,
    history: History,
    template_error: Option<String>,
    /// Seed a recipient placeholder when a template lands on an empty canvas.
    template_placeholder: bool,
    events: EventBus,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a canvas whose history keeps at most `limit` undo steps.
    pub fn with_history_limit(limit: Option<usize>) -> Self {
        Self {
            history: History::with_limit(&[], limit),
            ..Self::default()
        }
    }

    /// Create a canvas from a stored scene. History starts at that scene.
    pub fn from_scene(scene: Scene) -> Self {
        let mut view = View::new();
        view.set_canvas_size(scene.canvas_size.width, scene.canvas_size.height);
        Self {
            history: History::new(&scene.elements),
            scene,
            view,
            ..Self::default()
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn elements(&self) -> &[Element] {
        &self.scene.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.scene.element(id)
    }

    pub fn background(&self) -> Option<&Background> {
        self.scene.background.as_ref()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn selection(&self) -> &[ElementId] {
        &self.selection
    }

    pub fn is_selected(&self, id: ElementId) -> bool {
        self.selection.contains(&id)
    }

    /// Selected elements that exist in the scene, in selection order.
    pub fn selected_elements(&self) -> Vec<&Element> {
        self.selection
            .iter()
            .filter_map(|id| self.scene.element(*id))
            .collect()
    }

    pub fn clipboard(&self) -> &[Element] {
        &self.clipboard
    }

    /// Last template decode failure, if any.
    pub fn template_error(&self) -> Option<&str> {
        self.template_error.as_deref()
    }

    pub fn template_placeholder(&self) -> bool {
        self.template_placeholder
    }

    /// Editor hosts enable this to start new designs with a name field.
    pub fn set_template_placeholder(&mut self, enabled: bool) {
        self.template_placeholder = enabled;
    }

    // --- Change notification ---

    pub fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit(&mut self, event: CanvasEvent) {
        self.events.emit(&event);
    }

    // --- Element lifecycle ---

    /// Add an element on top of the stack and make it the sole selection.
    pub fn add_element(&mut self, draft: ElementDraft) -> ElementId {
        let id = generate_id();
        let element = Element::from_draft(draft, id, self.scene.top_z() + 1);
        log::debug!("Adding {} element {} at z {}", element.kind.name(), id, element.z_index);
        self.scene.elements.push(element);
        self.emit(CanvasEvent::ElementsChanged);
        self.set_selection(vec![id]);
        self.checkpoint();
        id
    }

    /// Add the default "New Text" element.
    pub fn add_text_element(&mut self) -> ElementId {
        self.add_element(default_text_draft())
    }

    /// Shallow-merge `patch` into an element. Does not checkpoint.
    pub fn update_element(&mut self, id: ElementId, patch: &ElementPatch) -> bool {
        let changed = match self.scene.element_mut(id) {
            Some(element) => patch.apply(element),
            None => false,
        };
        if changed {
            self.emit(CanvasEvent::ElementsChanged);
        }
        changed
    }

    pub fn delete_element(&mut self, id: ElementId) -> bool {
        self.delete_many(&[id])
    }

    pub fn delete_selected(&mut self) -> bool {
        let ids = self.selection.clone();
        self.delete_many(&ids)
    }

    fn delete_many(&mut self, ids: &[ElementId]) -> bool {
        let before = self.scene.elements.len();
        self.scene.elements.retain(|e| !ids.contains(&e.id));
        if self.scene.elements.len() == before {
            return false;
        }
        log::debug!("Deleted {} element(s)", before - self.scene.elements.len());
        self.emit(CanvasEvent::ElementsChanged);
        let remaining: Vec<ElementId> = self
            .selection
            .iter()
            .copied()
            .filter(|id| !ids.contains(id))
            .collect();
        self.set_selection(remaining);
        self.checkpoint();
        true
    }

    /// Clone an element under a new id, offset and on top, and select it.
    pub fn duplicate_element(&mut self, id: ElementId) -> Option<ElementId> {
        self.duplicate_many(&[id]).into_iter().next()
    }

    /// Duplicate every selected element; the copies become the selection.
    pub fn duplicate_selected(&mut self) -> Vec<ElementId> {
        let ids = self.selection.clone();
        self.duplicate_many(&ids)
    }

    fn duplicate_many(&mut self, ids: &[ElementId]) -> Vec<ElementId> {
        let mut created = Vec::new();
        for id in ids {
            let Some(source) = self.scene.element(*id) else {
                continue;
            };
            let copy = source.duplicate_with_offset(
                DUPLICATE_OFFSET.x,
                DUPLICATE_OFFSET.y,
                self.scene.top_z() + 1,
            );
            created.push(copy.id);
            self.scene.elements.push(copy);
        }
        if created.is_empty() {
            return created;
        }
        self.emit(CanvasEvent::ElementsChanged);
        self.set_selection(created.clone());
        self.checkpoint();
        created
    }

    // --- Selection ---

    /// Replace the selection. Unknown ids are kept but inert.
    pub fn select_elements(&mut self, ids: &[ElementId]) {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) {
                unique.push(*id);
            }
        }
        self.set_selection(unique);
    }

    pub fn select(&mut self, id: ElementId) {
        self.set_selection(vec![id]);
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(Vec::new());
    }

    fn set_selection(&mut self, ids: Vec<ElementId>) {
        if self.selection != ids {
            self.selection = ids;
            self.emit(CanvasEvent::SelectionChanged);
        }
    }

    // --- Z-order ---

    pub fn move_to_front(&mut self, id: ElementId) -> bool {
        let Some(max) = self.scene.max_z() else {
            return false;
        };
        self.reorder(id, max + 1)
    }

    pub fn move_to_back(&mut self, id: ElementId) -> bool {
        let Some(min) = self.scene.min_z() else {
            return false;
        };
        self.reorder(id, min - 1)
    }

    /// Jump just above the nearest element above. No-op at the top.
    pub fn move_forward(&mut self, id: ElementId) -> bool {
        let Some(current) = self.scene.element(id).map(|e| e.z_index) else {
            return false;
        };
        let next = self
            .scene
            .elements
            .iter()
            .filter(|e| e.id != id && e.z_index > current)
            .map(|e| e.z_index)
            .min();
        match next {
            Some(z) => self.reorder(id, z + 1),
            None => false,
        }
    }

    /// Jump just below the nearest element below. No-op at the bottom.
    pub fn move_backward(&mut self, id: ElementId) -> bool {
        let Some(current) = self.scene.element(id).map(|e| e.z_index) else {
            return false;
        };
        let prev = self
            .scene
            .elements
            .iter()
            .filter(|e| e.id != id && e.z_index < current)
            .map(|e| e.z_index)
            .max();
        match prev {
            Some(z) => self.reorder(id, z - 1),
            None => false,
        }
    }

    fn reorder(&mut self, id: ElementId, z: i64) -> bool {
        if !self.scene.set_z(id, z) {
            return false;
        }
        log::debug!("Moved element {} to z {}", id, z);
        self.emit(CanvasEvent::ElementsChanged);
        self.checkpoint();
        true
    }

    // --- Clipboard ---

    /// Copy matching elements into the clipboard, replacing its contents.
    pub fn copy_elements(&mut self, ids: &[ElementId]) {
        self.clipboard = self
            .scene
            .elements
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect();
    }

    pub fn copy_selection(&mut self) {
        let ids = self.selection.clone();
        self.copy_elements(&ids);
    }

    /// Paste clipboard copies on top, preserving their relative stacking.
    pub fn paste_elements(&mut self) -> Vec<ElementId> {
        if self.clipboard.is_empty() {
            return Vec::new();
        }
        let mut sources: Vec<&Element> = self.clipboard.iter().collect();
        sources.sort_by_key(|e| e.z_index);

        let base = self.scene.top_z();
        let pasted: Vec<Element> = sources
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.duplicate_with_offset(PASTE_OFFSET.x, PASTE_OFFSET.y, base + 1 + i as i64))
            .collect();
        let ids: Vec<ElementId> = pasted.iter().map(|e| e.id).collect();
        log::debug!("Pasting {} element(s)", ids.len());
        self.scene.elements.extend(pasted);
        self.emit(CanvasEvent::ElementsChanged);
        self.set_selection(ids.clone());
        self.checkpoint();
        ids
    }

    /// Empty the scene and hard-reset history. Not undoable.
    pub fn clear_canvas(&mut self) {
        self.scene.elements.clear();
        self.history.reset(&[]);
        self.emit(CanvasEvent::ElementsChanged);
        self.set_selection(Vec::new());
        self.emit(CanvasEvent::HistoryChanged);
    }

    // --- History ---

    /// Record the current elements as a history step.
    pub fn checkpoint(&mut self) {
        self.history.checkpoint(&self.scene.elements);
        self.emit(CanvasEvent::HistoryChanged);
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(snapshot.to_vec());
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(snapshot.to_vec());
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn set_history_limit(&mut self, limit: Option<usize>) {
        self.history.set_limit(limit);
    }

    fn restore(&mut self, elements: Vec<Element>) {
        self.scene.elements = elements;
        self.emit(CanvasEvent::ElementsChanged);
        let alive: Vec<ElementId> = self
            .selection
            .iter()
            .copied()
            .filter(|id| self.scene.contains(*id))
            .collect();
        self.set_selection(alive);
        self.emit(CanvasEvent::HistoryChanged);
    }

    // --- Background & canvas size ---

    /// Install a background, adopt its size and re-arm auto-fit.
    pub fn set_background(&mut self, background: Background) {
        if background.has_valid_size() {
            self.view.set_canvas_size(background.width, background.height);
            self.scene.canvas_size = self.view.canvas_size();
        } else {
            log::warn!(
                "Background has unusable size {}x{}, keeping canvas size",
                background.width,
                background.height
            );
        }
        self.scene.background = Some(background);
        self.template_error = None;
        self.view.rearm_fit();
        self.emit(CanvasEvent::BackgroundChanged);
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn set_canvas_size(&mut self, width: f64, height: f64) -> bool {
        if !self.view.set_canvas_size(width, height) {
            return false;
        }
        self.scene.canvas_size = self.view.canvas_size();
        self.emit(CanvasEvent::ViewChanged);
        true
    }

    /// Deliver the outcome of decoding a template image.
    ///
    /// Failure is recorded once and leaves the canvas size untouched.
    pub fn apply_template_result(&mut self, result: Result<TemplateInfo, String>) {
        match result {
            Ok(info) => {
                log::info!("Template loaded ({}x{})", info.width, info.height);
                self.set_background(info.into_background());
                if self.template_placeholder && self.scene.is_empty() {
                    self.add_element(recipient_placeholder_draft());
                }
            }
            Err(message) => {
                log::warn!("Template failed to load: {}", message);
                self.template_error = Some(message.clone());
                self.emit(CanvasEvent::TemplateFailed(message));
            }
        }
    }

    // --- View ---

    pub fn zoom_in(&mut self) {
        self.view.zoom_in();
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn zoom_out(&mut self) {
        self.view.zoom_out();
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.view.set_zoom(zoom);
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn set_pan(&mut self, pan: Vec2) {
        self.view.set_pan(pan);
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn wheel_zoom(&mut self, pointer: Point, delta_y: f64) {
        self.view.wheel_zoom(pointer, delta_y);
        self.emit(CanvasEvent::ViewChanged);
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
        self.emit(CanvasEvent::ViewChanged);
    }

    /// Fit once per background load.
    pub fn ensure_fitted(&mut self, container: Size) -> bool {
        let fitted = self.view.ensure_fitted(container);
        if fitted {
            self.emit(CanvasEvent::ViewChanged);
        }
        fitted
    }

    /// Fit on explicit request.
    pub fn request_fit(&mut self, container: Size) -> bool {
        let fitted = self.view.request_fit(container);
        if fitted {
            self.emit(CanvasEvent::ViewChanged);
        }
        fitted
    }

    // --- Binding ---

    /// Bind (or unbind with `None`) the single selected text element.
    pub fn bind_selected(&mut self, column: Option<&str>) -> bool {
        let [id] = self.selection[..] else {
            return false;
        };
        if !self.scene.element(id).is_some_and(Element::is_text) {
            return false;
        }
        let patch = ElementPatch::data_key(column.map(str::to_string));
        if self.update_element(id, &patch) {
            self.checkpoint();
            true
        } else {
            false
        }
    }

    /// Rewrite bound elements from `row` in place. History is untouched.
    pub fn apply_row(&mut self, row: &Row) -> usize {
        let rewritten = binding::apply_row_in_place(&mut self.scene.elements, row);
        if rewritten > 0 {
            self.emit(CanvasEvent::ElementsChanged);
        }
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CellValue;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    fn draft(content: &str) -> ElementDraft {
        ElementDraft::text(content, 100.0, 40.0)
    }

    fn z_of(canvas: &Canvas, id: ElementId) -> i64 {
        canvas.element(id).map(|e| e.z_index).unwrap()
    }

    #[test]
    fn test_add_assigns_increasing_z_and_selects() {
        let mut canvas = Canvas::new();
        let ids: Vec<_> = (0..5).map(|i| canvas.add_element(draft(&i.to_string()))).collect();
        let zs: Vec<_> = ids.iter().map(|id| z_of(&canvas, *id)).collect();
        assert_eq!(zs, vec![1, 2, 3, 4, 5]);
        assert_eq!(canvas.selection(), &[ids[4]]);
        assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 5);
        assert!(canvas.can_undo());
    }

    #[test]
    fn test_add_above_negative_z_starts_at_one() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        canvas.move_to_back(a);
        canvas.move_to_back(a);
        assert_eq!(z_of(&canvas, a), -1);
        let b = canvas.add_element(draft("b"));
        assert_eq!(z_of(&canvas, b), 1);
    }

    #[test]
    fn test_add_forces_visible_unlocked() {
        let mut canvas = Canvas::new();
        let id = canvas.add_text_element();
        let el = canvas.element(id).unwrap();
        assert!(el.visible);
        assert!(!el.locked);
        assert_eq!(el.as_text().unwrap().content, "New Text");
        assert!((el.width - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_does_not_checkpoint() {
        let mut canvas = Canvas::new();
        let id = canvas.add_element(draft("a"));
        let depth = canvas.history().undo_depth();
        assert!(canvas.update_element(id, &ElementPatch::position(50.0, 60.0)));
        assert_eq!(canvas.history().undo_depth(), depth);
        assert!(!canvas.update_element(generate_id(), &ElementPatch::position(1.0, 1.0)));
    }

    #[test]
    fn test_delete_prunes_selection_keeps_clipboard() {
        let mut canvas = Canvas::new();
        let id = canvas.add_element(draft("a"));
        canvas.copy_elements(&[id]);
        assert!(canvas.delete_element(id));
        assert!(canvas.selection().is_empty());
        assert_eq!(canvas.clipboard().len(), 1);
        assert!(!canvas.delete_element(id));
    }

    #[test]
    fn test_duplicate() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a").at(5.0, 5.0));
        canvas.add_element(draft("b"));
        let dup = canvas.duplicate_element(a).unwrap();
        let el = canvas.element(dup).unwrap();
        assert!((el.x - 15.0).abs() < f64::EPSILON);
        assert!((el.y - 15.0).abs() < f64::EPSILON);
        assert_eq!(el.z_index, 3);
        assert_eq!(canvas.selection(), &[dup]);
        assert!(canvas.duplicate_element(generate_id()).is_none());
    }

    #[test]
    fn test_select_tolerates_stale_ids() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        let ghost = generate_id();
        canvas.select_elements(&[a, ghost, a]);
        assert_eq!(canvas.selection(), &[a, ghost]);
        assert_eq!(canvas.selected_elements().len(), 1);
        canvas.clear_selection();
        assert!(canvas.selection().is_empty());
    }

    #[test]
    fn test_front_then_back_keeps_others_order() {
        let mut canvas = Canvas::new();
        let ids: Vec<_> = (0..4).map(|i| canvas.add_element(draft(&i.to_string()))).collect();
        let others = |c: &Canvas| -> Vec<ElementId> {
            c.scene()
                .ordered()
                .iter()
                .map(|e| e.id())
                .filter(|id| *id != ids[1])
                .collect()
        };
        let before = others(&canvas);
        canvas.move_to_front(ids[1]);
        assert_eq!(z_of(&canvas, ids[1]), 5);
        canvas.move_to_back(ids[1]);
        assert_eq!(z_of(&canvas, ids[1]), 0);
        assert_eq!(others(&canvas), before);
    }

    #[test]
    fn test_forward_backward_neighbors() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        let b = canvas.add_element(draft("b"));
        let c = canvas.add_element(draft("c"));

        assert!(canvas.move_forward(a));
        assert_eq!(z_of(&canvas, a), 3);
        // Nothing strictly above any more
        assert!(!canvas.move_forward(a));

        assert!(canvas.move_backward(c));
        assert_eq!(z_of(&canvas, c), 1);
        assert!(!canvas.move_backward(generate_id()));
        let order: Vec<_> = canvas.scene().ordered().iter().map(|e| e.id()).collect();
        assert_eq!(order, vec![c, b, a]);
    }

    #[test]
    fn test_paste_offsets_and_stacks() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a").at(0.0, 0.0));
        let b = canvas.add_element(draft("b").at(10.0, 10.0));
        canvas.copy_elements(&[b, a]);
        let pasted = canvas.paste_elements();
        assert_eq!(pasted.len(), 2);
        assert_eq!(canvas.selection(), pasted.as_slice());

        let first = canvas.element(pasted[0]).unwrap();
        let second = canvas.element(pasted[1]).unwrap();
        assert!((first.x - 20.0).abs() < f64::EPSILON);
        assert!((second.x - 30.0).abs() < f64::EPSILON);
        assert!(first.z_index < second.z_index);
        assert!(first.z_index > z_of(&canvas, b));
    }

    #[test]
    fn test_paste_empty_is_noop() {
        let mut canvas = Canvas::new();
        let depth = canvas.history().undo_depth();
        assert!(canvas.paste_elements().is_empty());
        assert_eq!(canvas.history().undo_depth(), depth);
    }

    #[test]
    fn test_clipboard_is_a_value_copy() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        canvas.copy_elements(&[a]);
        canvas.update_element(a, &ElementPatch::content("changed"));
        assert_eq!(canvas.clipboard()[0].as_text().unwrap().content, "a");
    }

    #[test]
    fn test_undo_redo_exact_inverse() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        let before: Vec<Element> = canvas.elements().to_vec();
        canvas.update_element(a, &ElementPatch::position(90.0, 90.0));
        canvas.checkpoint();
        let after: Vec<Element> = canvas.elements().to_vec();

        assert!(canvas.undo());
        assert_eq!(canvas.elements(), before.as_slice());
        assert!(canvas.can_redo());
        assert!(canvas.redo());
        assert_eq!(canvas.elements(), after.as_slice());
        assert!(!canvas.can_redo());
    }

    #[test]
    fn test_undo_prunes_selection() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        assert!(canvas.undo());
        assert!(canvas.elements().is_empty());
        assert!(!canvas.is_selected(a));
    }

    #[test]
    fn test_clear_canvas_resets_history() {
        let mut canvas = Canvas::new();
        canvas.add_element(draft("a"));
        canvas.add_element(draft("b"));
        canvas.clear_canvas();
        assert!(canvas.elements().is_empty());
        assert!(!canvas.can_undo());
        assert!(!canvas.can_redo());
    }

    #[test]
    fn test_background_sets_size_and_rearms_fit() {
        let mut canvas = Canvas::new();
        assert!(canvas.ensure_fitted(Size::new(800.0, 600.0)));
        canvas.set_background(Background::color("#fff", 1000.0, 500.0));
        assert_eq!(canvas.scene().canvas_size, Size::new(1000.0, 500.0));
        assert!(canvas.ensure_fitted(Size::new(800.0, 800.0)));
        assert!((canvas.view().zoom() - 0.8).abs() < 1e-12);
        assert!((canvas.view().pan().y - 200.0).abs() < 1e-9);
        assert!(!canvas.ensure_fitted(Size::new(800.0, 800.0)));
    }

    fn template(width: u32, height: u32) -> Result<TemplateInfo, String> {
        Ok(TemplateInfo {
            data_url: "data:image/png;base64,".into(),
            width,
            height,
        })
    }

    #[test]
    fn test_template_placeholder_on_empty_canvas() {
        let mut canvas = Canvas::new();
        canvas.set_template_placeholder(true);
        canvas.apply_template_result(template(1200, 850));

        assert_eq!(canvas.elements().len(), 1);
        let el = &canvas.elements()[0];
        let text = el.as_text().unwrap();
        assert_eq!(text.content, "Recipient Name");
        assert_eq!(text.font_style, FontStyle::Bold);
        assert_eq!(text.align, TextAlign::Center);
        assert_eq!(text.fill, Color::rgb(0x11, 0x18, 0x27));
        assert_eq!((el.x, el.y, el.width, el.height), (80.0, 80.0, 360.0, 60.0));
        assert_eq!(canvas.selection(), &[el.id]);

        // A second template keeps the existing design
        canvas.apply_template_result(template(800, 600));
        assert_eq!(canvas.elements().len(), 1);
    }

    #[test]
    fn test_template_placeholder_is_opt_in() {
        let mut canvas = Canvas::new();
        assert!(!canvas.template_placeholder());
        canvas.apply_template_result(template(300, 200));
        assert!(canvas.elements().is_empty());

        let mut canvas = Canvas::new();
        canvas.set_template_placeholder(true);
        let id = canvas.add_element(draft("Award"));
        canvas.apply_template_result(template(300, 200));
        assert_eq!(canvas.elements().len(), 1);
        assert_eq!(canvas.elements()[0].id, id);

        canvas.apply_template_result(Err("bad image".into()));
        assert_eq!(canvas.elements().len(), 1);
    }

    #[test]
    fn test_template_failure_keeps_size() {
        let mut canvas = Canvas::new();
        canvas.set_canvas_size(640.0, 480.0);
        canvas.apply_template_result(Err("bad image".to_string()));
        assert_eq!(canvas.template_error(), Some("bad image"));
        assert!(canvas.background().is_none());
        assert_eq!(canvas.scene().canvas_size, Size::new(640.0, 480.0));

        canvas.apply_template_result(Ok(TemplateInfo {
            data_url: "data:image/png;base64,".into(),
            width: 300,
            height: 200,
        }));
        assert!(canvas.template_error().is_none());
        assert_eq!(canvas.scene().canvas_size, Size::new(300.0, 200.0));
    }

    #[test]
    fn test_bind_selected_requires_single_text() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a"));
        assert!(canvas.bind_selected(Some("Name")));
        assert_eq!(
            canvas.element(a).unwrap().as_text().unwrap().data_key.as_deref(),
            Some("Name")
        );
        canvas.clear_selection();
        assert!(!canvas.bind_selected(Some("Other")));
        canvas.select(a);
        assert!(canvas.bind_selected(None));
        assert!(canvas.element(a).unwrap().as_text().unwrap().data_key.is_none());
    }

    #[test]
    fn test_apply_row_skips_history() {
        let mut canvas = Canvas::new();
        canvas.add_element(draft("Placeholder").with_text(|t| t.data_key = Some("Name".into())));
        let depth = canvas.history().undo_depth();
        let row: Row = [("Name".to_string(), CellValue::from("Ada"))].into_iter().collect();
        assert_eq!(canvas.apply_row(&row), 1);
        assert_eq!(canvas.elements()[0].as_text().unwrap().content, "Ada");
        assert_eq!(canvas.history().undo_depth(), depth);
    }

    #[test]
    fn test_scene_with_row_leaves_original() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("Placeholder").with_text(|t| t.data_key = Some("Name".into())));
        let row: Row = [("Name".to_string(), CellValue::from("Ada"))].into_iter().collect();
        let projected = canvas.scene().with_row(&row);
        assert_eq!(projected.element(a).unwrap().as_text().unwrap().content, "Ada");
        assert_eq!(canvas.element(a).unwrap().as_text().unwrap().content, "Placeholder");
    }

    #[test]
    fn test_elements_at_point_topmost_first_skips_hidden() {
        let mut canvas = Canvas::new();
        let a = canvas.add_element(draft("a").at(0.0, 0.0));
        let b = canvas.add_element(draft("b").at(0.0, 0.0));
        let c = canvas.add_element(draft("c").at(0.0, 0.0));
        canvas.update_element(c, &ElementPatch { visible: Some(false), ..ElementPatch::default() });
        let hits = canvas.scene().elements_at_point(Point::new(10.0, 10.0), 0.0);
        assert_eq!(hits, vec![b, a]);
    }

    #[test]
    fn test_events_emitted() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut canvas = Canvas::new();
        let sub = canvas.subscribe(Box::new(move |e| sink.borrow_mut().push(e.clone())));
        canvas.add_element(draft("a"));
        assert_eq!(
            *seen.borrow(),
            vec![
                CanvasEvent::ElementsChanged,
                CanvasEvent::SelectionChanged,
                CanvasEvent::HistoryChanged,
            ]
        );
        assert!(canvas.unsubscribe(sub));
        canvas.zoom_in();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_history_limit() {
        let mut canvas = Canvas::with_history_limit(Some(1));
        canvas.add_element(draft("a"));
        canvas.add_element(draft("b"));
        assert!(canvas.undo());
        assert!(!canvas.undo());
        assert_eq!(canvas.elements().len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Duplicate(usize),
        CopyPaste(usize),
        MoveToBack(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            any::<usize>().prop_map(Op::Duplicate),
            any::<usize>().prop_map(Op::CopyPaste),
            any::<usize>().prop_map(Op::MoveToBack),
        ]
    }

    fn pick(canvas: &Canvas, index: usize) -> Option<ElementId> {
        let elements = canvas.elements();
        (!elements.is_empty()).then(|| elements[index % elements.len()].id)
    }

    /// Apply `op` and return the ids it created.
    fn apply(canvas: &mut Canvas, op: &Op) -> Vec<ElementId> {
        match *op {
            Op::Add => vec![canvas.add_element(draft("x"))],
            Op::Duplicate(i) => pick(canvas, i)
                .and_then(|id| canvas.duplicate_element(id))
                .into_iter()
                .collect(),
            Op::CopyPaste(i) => match pick(canvas, i) {
                Some(id) => {
                    canvas.copy_elements(&[id]);
                    canvas.paste_elements()
                }
                None => Vec::new(),
            },
            Op::MoveToBack(i) => {
                if let Some(id) = pick(canvas, i) {
                    canvas.move_to_back(id);
                }
                Vec::new()
            }
        }
    }

    proptest! {
        #[test]
        fn prop_created_elements_stack_on_top_with_fresh_ids(ops in prop::collection::vec(op(), 1..40)) {
            let mut canvas = Canvas::new();
            let mut seen = HashSet::new();
            for op in &ops {
                let top = canvas.scene().top_z();
                let created = apply(&mut canvas, op);
                let mut last = top;
                for id in &created {
                    prop_assert!(seen.insert(*id));
                    let z = z_of(&canvas, *id);
                    prop_assert!(z > last);
                    last = z;
                }
                if !created.is_empty() {
                    prop_assert_eq!(canvas.scene().top_z(), last);
                }
            }
            prop_assert_eq!(canvas.elements().iter().map(|e| e.id).collect::<HashSet<_>>().len(), canvas.elements().len());
        }

        #[test]
        fn prop_undo_walks_back_through_checkpoints(ops in prop::collection::vec(op(), 1..25)) {
            let mut canvas = Canvas::new();
            let mut snapshots = vec![canvas.elements().to_vec()];
            for op in &ops {
                let depth = canvas.history().undo_depth();
                apply(&mut canvas, op);
                if canvas.history().undo_depth() > depth {
                    snapshots.push(canvas.elements().to_vec());
                }
            }

            for expected in snapshots.iter().rev().skip(1) {
                prop_assert!(canvas.undo());
                prop_assert_eq!(canvas.elements(), expected.as_slice());
            }
            prop_assert!(!canvas.undo());

            for expected in snapshots.iter().skip(1) {
                prop_assert!(canvas.redo());
                prop_assert_eq!(canvas.elements(), expected.as_slice());
            }
            prop_assert!(!canvas.redo());
        }
    }
}
