//! Per-window tab order cache
//!
//! Mirrors the browser's native left-to-right tab order as a vector of
//! page node ids per live window. The cache is derived state: it can be
//! rebuilt from the pages' recorded `index` attributes at any time. The
//! expected-moves set records corrective moves the engine itself issued,
//! so their echo events are not mistaken for user reorders.

use std::collections::{HashMap, HashSet};

pub struct TabIndex {
    by_window: HashMap<u32, Vec<String>>,
    expected_moves: HashSet<(u32, u32)>,
}

impl TabIndex {
    pub fn new() -> Self {
        Self {
            by_window: HashMap::new(),
            expected_moves: HashSet::new(),
        }
    }

    /// Ordered node ids for a window; empty when the window is unknown.
    pub fn entries(&self, window_id: u32) -> &[String] {
        self.by_window
            .get(&window_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, window_id: u32) -> usize {
        self.entries(window_id).len()
    }

    pub fn position(&self, window_id: u32, node_id: &str) -> Option<usize> {
        self.entries(window_id)
            .iter()
            .position(|s| s.as_str() == node_id)
    }

    /// Insert a node at a native position, clamped to the current length.
    pub fn insert_at(&mut self, window_id: u32, index: usize, node_id: String) {
        let list = self.by_window.entry(window_id).or_default();
        let at = index.min(list.len());
        list.insert(at, node_id);
    }

    /// Drop a node id from whichever window holds it.
    pub fn remove_node(&mut self, node_id: &str) {
        for list in self.by_window.values_mut() {
            list.retain(|s| s.as_str() != node_id);
        }
        self.by_window.retain(|_, list| !list.is_empty());
    }

    pub fn remove_window(&mut self, window_id: u32) {
        self.by_window.remove(&window_id);
    }

    /// Replace an id in place, wherever it sits.
    pub fn rename(&mut self, old_id: &str, new_id: &str) {
        for list in self.by_window.values_mut() {
            if let Some(entry) = list.iter_mut().find(|s| s.as_str() == old_id) {
                *entry = new_id.to_string();
            }
        }
    }

    /// Apply a native reorder to the cache; returns the moved node id.
    pub fn apply_native_move(
        &mut self,
        window_id: u32,
        from: usize,
        to: usize,
    ) -> Option<String> {
        let list = self.by_window.get_mut(&window_id)?;
        if from >= list.len() {
            return None;
        }
        let node_id = list.remove(from);
        let at = to.min(list.len());
        list.insert(at, node_id.clone());
        Some(node_id)
    }

    /// Replace a window's cache wholesale with a freshly computed order.
    pub fn rebuild(&mut self, window_id: u32, ordered: Vec<String>) {
        if ordered.is_empty() {
            self.by_window.remove(&window_id);
        } else {
            self.by_window.insert(window_id, ordered);
        }
    }

    // === Expected-move echo suppression ===

    pub fn expect_move(&mut self, tab_id: u32, to_index: u32) {
        self.expected_moves.insert((tab_id, to_index));
    }

    /// Consume a matching expectation; true means the echo was ours.
    pub fn take_expected(&mut self, tab_id: u32, to_index: u32) -> bool {
        self.expected_moves.remove(&(tab_id, to_index))
    }
}

impl Default for TabIndex {
    fn default() -> Self {
        Self::new()
    }
}
