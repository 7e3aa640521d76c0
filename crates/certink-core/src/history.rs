//! Snapshot-based undo/redo log.

use crate::elements::Element;
use std::collections::VecDeque;
use std::sync::Arc;

/// Immutable, cheaply shareable copy of the element list.
pub type Snapshot = Arc<[Element]>;

/// Linear undo history of element snapshots.
///
/// `present` always mirrors the element list as of the last checkpoint,
/// undo or redo. Selection and view state are not recorded.
#[derive(Debug, Clone)]
pub struct History {
    past: Vec<Snapshot>,
    present: Snapshot,
    future: VecDeque<Snapshot>,
    /// Maximum number of `past` entries kept, if bounded.
    limit: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl History {
    /// Create an unbounded history whose present is `elements`.
    pub fn new(elements: &[Element]) -> Self {
        Self {
            past: Vec::new(),
            present: Arc::from(elements),
            future: VecDeque::new(),
            limit: None,
        }
    }

    /// Create a history that keeps at most `limit` undo steps.
    pub fn with_limit(elements: &[Element], limit: Option<usize>) -> Self {
        let mut history = Self::new(elements);
        history.limit = limit;
        history
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
        self.enforce_limit();
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Record `elements` as the new present and drop any redo branch.
    pub fn checkpoint(&mut self, elements: &[Element]) {
        let previous = std::mem::replace(&mut self.present, Arc::from(elements));
        self.past.push(previous);
        self.future.clear();
        self.enforce_limit();
    }

    /// Step back one snapshot. Returns the element list to restore.
    pub fn undo(&mut self) -> Option<Snapshot> {
        let previous = self.past.pop()?;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        Some(self.present.clone())
    }

    /// Step forward one snapshot. Returns the element list to restore.
    pub fn redo(&mut self) -> Option<Snapshot> {
        let next = self.future.pop_front()?;
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        Some(self.present.clone())
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Drop all history and make `elements` the present.
    pub fn reset(&mut self, elements: &[Element]) {
        self.past.clear();
        self.future.clear();
        self.present = Arc::from(elements);
    }

    pub fn present(&self) -> &[Element] {
        &self.present
    }

    pub fn undo_depth(&self) -> usize {
        self.past.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.future.len()
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            if self.past.len() > limit {
                let excess = self.past.len() - limit;
                self.past.drain(..excess);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{ElementDraft, generate_id};

    fn element(content: &str) -> Element {
        Element::from_draft(ElementDraft::text(content, 10.0, 10.0), generate_id(), 1)
    }

    fn contents(snapshot: &[Element]) -> Vec<String> {
        snapshot
            .iter()
            .filter_map(|e| e.as_text().map(|t| t.content.clone()))
            .collect()
    }

    #[test]
    fn test_fresh_history() {
        let history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.present().is_empty());
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let a = element("a");
        let b = element("b");
        let mut history = History::default();
        history.checkpoint(&[a.clone()]);
        history.checkpoint(&[a.clone(), b.clone()]);

        let restored = history.undo().unwrap();
        assert_eq!(contents(&restored), vec!["a"]);
        let restored = history.undo().unwrap();
        assert!(restored.is_empty());
        assert!(history.undo().is_none());

        let restored = history.redo().unwrap();
        assert_eq!(contents(&restored), vec!["a"]);
        let restored = history.redo().unwrap();
        assert_eq!(contents(&restored), vec!["a", "b"]);
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_checkpoint_clears_future() {
        let mut history = History::default();
        history.checkpoint(&[element("a")]);
        history.undo();
        assert!(history.can_redo());
        history.checkpoint(&[element("c")]);
        assert!(!history.can_redo());
    }

    #[test]
    fn test_reset() {
        let mut history = History::default();
        history.checkpoint(&[element("a")]);
        history.checkpoint(&[element("b")]);
        history.undo();
        history.reset(&[]);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.present().is_empty());
    }

    #[test]
    fn test_limit_evicts_oldest() {
        let mut history = History::with_limit(&[], Some(2));
        history.checkpoint(&[element("a")]);
        history.checkpoint(&[element("b")]);
        history.checkpoint(&[element("c")]);
        assert_eq!(history.undo_depth(), 2);
        assert_eq!(contents(&history.undo().unwrap()), vec!["b"]);
        assert_eq!(contents(&history.undo().unwrap()), vec!["a"]);
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut a = element("a");
        let mut history = History::default();
        history.checkpoint(std::slice::from_ref(&a));
        a.x = 500.0;
        assert!((history.present()[0].x - 0.0).abs() < f64::EPSILON);
    }
}
