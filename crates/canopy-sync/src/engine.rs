//! Synchronization engine
//!
//! One value owns the tree, the per-window tab order cache, and the
//! pending registries that carry multi-step flows (awaken a window, then
//! its tabs) across host-command echoes. Events are handled one at a
//! time, run to completion; every continuation looks nodes up again by
//! id rather than trusting a reference captured before the suspension.
//!
//! Startup order: open the store, build the bridge, construct the
//! engine, restore the snapshot, install the listener, then start
//! feeding events.

use std::collections::HashMap;
use std::sync::Arc;

use canopy_model::{
    ids, ChangeListener, FolderNode, HeaderNode, Node, PageTree, SnapshotNode, WindowKind,
    WindowNode,
};
use canopy_tree::Anchor;

use crate::events::{BrowserEvent, TabChange, WindowInfo};
use crate::host::BrowserHost;
use crate::persist::PersistenceBridge;
use crate::tab_index::TabIndex;
use crate::Result;

/// Host-specific page addresses the engine special-cases.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Scheme identifying the organizer's own pages
    pub internal_scheme: String,
    /// Settings-style page; parented straight to its window and locked there
    pub options_url: String,
    /// Blank placeholder tab, also the marker of a reusable empty window
    pub new_tab_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            internal_scheme: "canopy".to_string(),
            options_url: "canopy://options".to_string(),
            new_tab_url: "canopy://newtab".to_string(),
        }
    }
}

/// A hibernated page waiting for the tab-created echo of its awaken
/// request.
pub(crate) struct PendingAwaken {
    pub node_id: String,
    pub url: String,
    pub window_node_id: String,
    pub activate: bool,
}

/// A hibernated window waiting for the window-created echo of its awaken
/// request. The window is created carrying the first page's url; the
/// remaining pages get their tabs once the echo arrives.
pub(crate) struct PendingWindowAwaken {
    pub window_node_id: String,
    pub remaining: Vec<String>,
}

pub struct SyncEngine {
    pub(crate) tree: PageTree,
    pub(crate) tab_index: TabIndex,
    pub(crate) host: Arc<dyn BrowserHost>,
    pub(crate) config: EngineConfig,
    pub(crate) bridge: Option<PersistenceBridge>,
    pub(crate) pending_awakens: Vec<PendingAwaken>,
    pub(crate) pending_window_awakens: Vec<PendingWindowAwaken>,
    /// Navigation targets announced before their tab-created event
    pub(crate) pending_nav_targets: HashMap<u32, u32>,
    /// Last activated page per live window, for focus restoration
    pub(crate) last_active_page: HashMap<u32, String>,
    pub(crate) focused_window_id: Option<u32>,
    pub(crate) focused_page_id: Option<String>,
    pub(crate) shutting_down: bool,
}

impl SyncEngine {
    pub fn new(host: Arc<dyn BrowserHost>, config: EngineConfig) -> Self {
        Self {
            tree: PageTree::new(),
            tab_index: TabIndex::new(),
            host,
            config,
            bridge: None,
            pending_awakens: Vec::new(),
            pending_window_awakens: Vec::new(),
            pending_nav_targets: HashMap::new(),
            last_active_page: HashMap::new(),
            focused_window_id: None,
            focused_page_id: None,
            shutting_down: false,
        }
    }

    /// Attach the debounced snapshot writer. Requires a tokio runtime at
    /// event-handling time.
    pub fn with_persistence(mut self, bridge: PersistenceBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Install the single change listener on the tree. Call after any
    /// snapshot restore; restoring replaces the tree wholesale.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.tree.set_listener(listener);
    }

    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    pub fn tab_index(&self) -> &TabIndex {
        &self.tab_index
    }

    pub fn focused_window_id(&self) -> Option<u32> {
        self.focused_window_id
    }

    pub fn focused_page_id(&self) -> Option<&str> {
        self.focused_page_id.as_deref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    // === Event dispatch ===

    /// Apply one browser event to the tree. Runs to completion before the
    /// caller may feed the next event; a structural change schedules a
    /// debounced snapshot write.
    pub fn handle_event(&mut self, event: BrowserEvent) -> Result<()> {
        let before = self.tree.tree().last_modified();
        match event {
            BrowserEvent::TabCreated(tab) => self.on_tab_created(tab)?,
            BrowserEvent::TabRemoved {
                tab_id,
                window_id,
                window_closing,
            } => self.on_tab_removed(tab_id, window_id, window_closing)?,
            BrowserEvent::TabUpdated { tab_id, change } => self.on_tab_updated(tab_id, change)?,
            BrowserEvent::TabActivated { tab_id, window_id } => {
                self.on_tab_activated(tab_id, window_id)?
            }
            BrowserEvent::TabMoved {
                tab_id,
                window_id,
                from_index,
                to_index,
            } => self.on_tab_moved(tab_id, window_id, from_index, to_index)?,
            BrowserEvent::WindowCreated(info) => self.on_window_created(info)?,
            BrowserEvent::WindowRemoved { window_id } => self.on_window_removed(window_id)?,
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.on_window_focus_changed(window_id)
            }
            BrowserEvent::NavCommitted(details) => self.on_nav_committed(details)?,
            BrowserEvent::NavCompleted { tab_id, frame_id } => {
                self.on_nav_completed(tab_id, frame_id)?
            }
            BrowserEvent::NavTargetCreated {
                source_tab_id,
                tab_id,
                ..
            } => self.on_nav_target_created(source_tab_id, tab_id)?,
            BrowserEvent::PageReported(report) => self.on_page_reported(report)?,
        }
        if self.tree.tree().last_modified() > before {
            self.schedule_save();
        }
        Ok(())
    }

    // === Window lifecycle ===

    /// A tab can be observed before its window; conjure a provisional
    /// window node that a later window-created event corrects.
    pub(crate) fn ensure_window(&mut self, window_id: u32) -> Result<String> {
        let node_id = ids::window(window_id);
        if !self.tree.contains(&node_id) {
            tracing::debug!(window_id, "Tab observed before its window");
            self.tree
                .add_window(WindowNode::new_live(window_id, WindowKind::Normal, false))?;
        }
        Ok(node_id)
    }

    fn on_window_created(&mut self, info: WindowInfo) -> Result<()> {
        if !self.pending_window_awakens.is_empty() {
            let pending = self.pending_window_awakens.remove(0);
            if self.tree.contains(&pending.window_node_id) {
                let live_node_id = self.bind_awakened_window(&pending.window_node_id, info.id)?;
                for entry in &mut self.pending_awakens {
                    if entry.window_node_id == pending.window_node_id {
                        entry.window_node_id = live_node_id.clone();
                    }
                }
                let remaining: Vec<(String, String)> = pending
                    .remaining
                    .iter()
                    .filter_map(|id| {
                        self.tree
                            .page(id)
                            .ok()
                            .map(|page| (id.clone(), page.url.clone()))
                    })
                    .collect();
                for (node_id, url) in remaining {
                    self.request_awaken_tab(node_id, url, live_node_id.clone(), info.id, false);
                }
                if info.focused {
                    self.focused_window_id = Some(info.id);
                }
                return Ok(());
            }
        }

        let node_id = ids::window(info.id);
        if self.tree.contains(&node_id) {
            // created provisionally off an earlier tab event
            self.tree.update_window(&node_id, |window| {
                window.kind = info.kind;
                window.incognito = info.incognito;
            })?;
        } else {
            self.tree
                .add_window(WindowNode::new_live(info.id, info.kind, info.incognito))?;
        }
        if info.focused {
            self.focused_window_id = Some(info.id);
        }
        tracing::debug!(window_id = info.id, kind = %info.kind, "Window created");
        Ok(())
    }

    fn on_window_removed(&mut self, window_id: u32) -> Result<()> {
        let node_id = self
            .tree
            .find_window(|window| window.window_id == Some(window_id))
            .map(|window| window.id.clone());
        if let Some(node_id) = node_id {
            let keeps_archive = self
                .tree
                .tree()
                .subtree_ids(&node_id)
                .iter()
                .filter_map(|id| self.tree.get(id).and_then(Node::as_page))
                .any(|page| page.hibernated);
            if keeps_archive {
                // live pages drop out; hibernated descendants survive
                // under an archival window that outlives the browser one
                let live: Vec<String> = self
                    .tree
                    .tree()
                    .subtree_ids(&node_id)
                    .iter()
                    .filter_map(|id| self.tree.get(id).and_then(Node::as_page))
                    .filter(|page| !page.hibernated)
                    .map(|page| page.id.clone())
                    .collect();
                for page_id in live {
                    self.tree.remove(&page_id, false);
                }
                let archived = self.tree.update_window(&node_id, |window| window.hibernate())?;
                tracing::info!(window = %archived, "Window closed; archive retained");
            } else {
                self.tree.remove(&node_id, true);
                tracing::debug!(window = %node_id, "Window removed");
            }
        }
        self.tab_index.remove_window(window_id);
        self.last_active_page.remove(&window_id);
        if self.focused_window_id == Some(window_id) {
            self.focused_window_id = None;
            self.focused_page_id = None;
        }

        // With no normal window left the browser is on its way out: close
        // the auxiliary windows so it can actually exit, and stop writing
        // a partially-torn-down tree into storage.
        let windows = self.host.windows();
        if !windows.iter().any(|w| w.kind == WindowKind::Normal) {
            self.shutting_down = true;
            if let Some(bridge) = &mut self.bridge {
                bridge.disable();
            }
            if !windows.is_empty() {
                tracing::info!(remaining = windows.len(), "No normal window left; shutting down");
            }
            for window in windows {
                let _ = self.host.remove_window(window.id);
            }
        }
        Ok(())
    }

    fn on_window_focus_changed(&mut self, window_id: Option<u32>) {
        self.focused_window_id = window_id;
        self.focused_page_id = window_id
            .and_then(|wid| self.last_active_page.get(&wid).cloned())
            .filter(|id| self.tree.contains(id));
    }

    // === Tab lifecycle ===

    fn on_tab_removed(&mut self, tab_id: u32, window_id: u32, window_closing: bool) -> Result<()> {
        let node_id = self
            .tree
            .find_page(|page| page.tab_id == Some(tab_id))
            .map(|page| page.id.clone());
        let Some(node_id) = node_id else {
            // hibernation already converted this node; the close was ours
            tracing::debug!(tab_id, "Removal echo with no live node");
            return Ok(());
        };
        self.tree.remove(&node_id, false);
        self.tab_index.remove_node(&node_id);
        if self.focused_page_id.as_deref() == Some(node_id.as_str()) {
            self.focused_page_id = None;
        }
        if self.last_active_page.get(&window_id).map(String::as_str) == Some(node_id.as_str()) {
            self.last_active_page.remove(&window_id);
        }
        if !window_closing {
            self.refresh_indexes(window_id)?;
            self.conform_to_tree(window_id)?;
        }
        Ok(())
    }

    fn on_tab_updated(&mut self, tab_id: u32, change: TabChange) -> Result<()> {
        let node_id = self
            .tree
            .find_page(|page| page.tab_id == Some(tab_id))
            .map(|page| page.id.clone());
        let Some(node_id) = node_id else {
            tracing::debug!(tab_id, "Update for an unknown tab");
            return Ok(());
        };
        let focused = self.focused_page_id.as_deref() == Some(node_id.as_str());
        self.tree.update_page(&node_id, |page| {
            if let Some(url) = change.url {
                if !url.is_empty() {
                    let _ = page.navigate(url);
                }
            }
            if let Some(title) = change.title {
                page.set_title(title);
            }
            if let Some(favicon) = change.favicon {
                page.set_favicon(Some(favicon));
            }
            if let Some(pinned) = change.pinned {
                page.pinned = pinned;
            }
            if let Some(status) = change.status {
                let was_settled = page.status.is_settled();
                let _ = page.transition_to(status);
                if status.is_settled() && !was_settled && !focused {
                    page.unread = true;
                }
            }
        })?;
        Ok(())
    }

    fn on_tab_activated(&mut self, tab_id: u32, window_id: u32) -> Result<()> {
        let node_id = self
            .tree
            .find_page(|page| page.tab_id == Some(tab_id))
            .map(|page| page.id.clone());
        let Some(node_id) = node_id else {
            tracing::debug!(tab_id, "Activation raced the tab's creation");
            return Ok(());
        };
        self.focused_window_id = Some(window_id);
        self.focused_page_id = Some(node_id.clone());
        self.last_active_page.insert(window_id, node_id.clone());
        self.tree.focus_page(&node_id)?;
        Ok(())
    }

    // === Tab order reconciliation ===

    fn on_tab_moved(&mut self, tab_id: u32, window_id: u32, from: u32, to: u32) -> Result<()> {
        if self.tab_index.take_expected(tab_id, to) {
            // echo of our own corrective move; the cache was already
            // conformed when the move was issued, so touching it again
            // would corrupt it and restart the correction loop
            return Ok(());
        }
        let Some(node_id) =
            self.tab_index
                .apply_native_move(window_id, from as usize, to as usize)
        else {
            tracing::debug!(tab_id, window_id, "Move for a tab missing from the order cache");
            return Ok(());
        };
        // mirror the reorder as a relative tree move: after the tab now
        // to the left, else before the one to the right
        let anchor = {
            let entries = self.tab_index.entries(window_id);
            let pos = entries
                .iter()
                .position(|entry| entry.as_str() == node_id)
                .unwrap_or(0);
            if pos > 0 {
                Anchor::After(entries[pos - 1].clone())
            } else if entries.len() > 1 {
                Anchor::Before(entries[1].clone())
            } else {
                Anchor::LastChildOf(ids::window(window_id))
            }
        };
        if let Err(e) = self.tree.move_anchored(&node_id, anchor) {
            tracing::warn!(page = %node_id, error = %e, "Reorder could not be mirrored in the tree");
        }
        self.refresh_indexes(window_id)?;
        Ok(())
    }

    /// Recompute each cached page's recorded native position.
    pub(crate) fn refresh_indexes(&mut self, window_id: u32) -> Result<()> {
        let entries = self.tab_index.entries(window_id).to_vec();
        for (position, node_id) in entries.into_iter().enumerate() {
            if self.tree.contains(&node_id) {
                self.tree
                    .update_page(&node_id, |page| page.index = Some(position as u32))?;
            }
        }
        Ok(())
    }

    /// Rebuild a window's order cache from the pages' recorded positions.
    pub fn rebuild_tab_index(&mut self, window_id: u32) {
        let mut pages: Vec<(u32, String)> = self
            .tree
            .tree()
            .nodes()
            .iter()
            .filter_map(|node| node.as_page())
            .filter(|page| page.window_id == Some(window_id) && !page.hibernated)
            .filter_map(|page| page.index.map(|i| (i, page.id.clone())))
            .collect();
        pages.sort_by_key(|(index, _)| *index);
        self.tab_index
            .rebuild(window_id, pages.into_iter().map(|(_, id)| id).collect());
    }

    /// Issue the minimal corrective native moves that bring a window's
    /// tab strip into the order the tree prescribes. Self-issued moves
    /// are registered so their echoes are not taken for user reorders.
    pub fn conform_to_tree(&mut self, window_id: u32) -> Result<()> {
        let window_node_id = match self
            .tree
            .find_window(|window| window.window_id == Some(window_id))
        {
            Some(window) => window.id.clone(),
            None => return Ok(()),
        };
        let desired: Vec<(String, u32)> = self
            .tree
            .tree()
            .subtree_ids(&window_node_id)
            .iter()
            .filter_map(|id| self.tree.get(id).and_then(Node::as_page))
            .filter(|page| !page.hibernated && page.window_id == Some(window_id))
            .filter_map(|page| page.tab_id.map(|tab_id| (page.id.clone(), tab_id)))
            .collect();

        let mut simulated = self.tab_index.entries(window_id).to_vec();
        for (target, (node_id, tab_id)) in desired.iter().enumerate() {
            match simulated.iter().position(|entry| entry == node_id) {
                Some(pos) if pos == target => {}
                Some(pos) => {
                    let moved = simulated.remove(pos);
                    simulated.insert(target.min(simulated.len()), moved);
                    self.tab_index.expect_move(*tab_id, target as u32);
                    if let Err(e) = self.host.move_tab(*tab_id, window_id, target as u32) {
                        tracing::warn!(tab_id, error = %e, "Corrective tab move refused");
                    }
                }
                None => {}
            }
        }
        self.tab_index
            .rebuild(window_id, desired.iter().map(|(id, _)| id.clone()).collect());
        self.refresh_indexes(window_id)?;
        Ok(())
    }

    // === User-directed operations ===

    /// Explicit move requested by the user; finalizes placement and
    /// brings the native tab order along.
    pub fn move_page(&mut self, node_id: &str, anchor: Anchor) -> Result<()> {
        self.tree.page(node_id)?;
        self.tree.update_page(node_id, |page| page.placed = true)?;
        self.tree.move_anchored(node_id, anchor)?;
        let window_id = self.tree.page(node_id)?.window_id;
        if let Some(window_id) = window_id {
            self.conform_to_tree(window_id)?;
        }
        self.schedule_save();
        Ok(())
    }

    pub fn set_collapsed(&mut self, node_id: &str, collapsed: bool) -> Result<()> {
        self.tree.set_collapsed(node_id, collapsed)?;
        self.schedule_save();
        Ok(())
    }

    pub fn add_folder(&mut self, label: &str, parent_id: Option<&str>) -> Result<String> {
        let folder = FolderNode::new(label.to_string());
        let id = folder.id.clone();
        self.tree.add_folder(folder, parent_id)?;
        self.schedule_save();
        Ok(id)
    }

    pub fn add_header(&mut self, label: &str, parent_id: Option<&str>) -> Result<String> {
        let header = HeaderNode::new(label.to_string());
        let id = header.id.clone();
        self.tree.add_header(header, parent_id)?;
        self.schedule_save();
        Ok(id)
    }

    // === Persistence ===

    pub(crate) fn schedule_save(&self) {
        if self.shutting_down {
            return;
        }
        let Some(bridge) = &self.bridge else {
            return;
        };
        match canopy_model::snapshot_to_json(&self.tree.to_snapshot()) {
            Ok(json) => bridge.schedule(json),
            Err(e) => tracing::warn!(error = %e, "Snapshot serialization failed"),
        }
    }

    /// Write the current tree immediately, skipping the debounce.
    pub fn persist_now(&self) -> Result<()> {
        if let Some(bridge) = &self.bridge {
            let json = canopy_model::snapshot_to_json(&self.tree.to_snapshot())?;
            bridge.flush(&json)?;
        }
        Ok(())
    }

    /// Replace the tree with a restored snapshot. Every live binding from
    /// the previous run is stale, so pages and windows are archived
    /// wholesale; association rebinds pages to live tabs as their reports
    /// come in.
    pub fn restore_snapshot(&mut self, nodes: &[SnapshotNode]) -> Result<()> {
        let mut tree = PageTree::from_snapshot(nodes)?;
        let page_ids: Vec<String> = tree
            .tree()
            .nodes()
            .iter()
            .filter_map(|node| node.as_page())
            .filter(|page| !page.hibernated)
            .map(|page| page.id.clone())
            .collect();
        for id in page_ids {
            tree.update_page(&id, |page| {
                page.hibernate();
                page.restorable = true;
            })?;
        }
        let window_ids: Vec<String> = tree
            .tree()
            .nodes()
            .iter()
            .filter_map(|node| node.as_window())
            .filter(|window| !window.hibernated)
            .map(|window| window.id.clone())
            .collect();
        for id in window_ids {
            tree.update_window(&id, |window| window.hibernate())?;
        }
        self.tree = tree;
        self.tab_index = TabIndex::new();
        self.last_active_page.clear();
        self.focused_page_id = None;
        tracing::info!(nodes = self.tree.len(), "Tree restored from snapshot");
        Ok(())
    }

    /// Load the persisted snapshot through the bridge, if both exist.
    pub fn restore_from_bridge(&mut self) -> Result<bool> {
        let json = match &self.bridge {
            Some(bridge) => bridge.load()?,
            None => return Ok(false),
        };
        let Some(json) = json else {
            return Ok(false);
        };
        let nodes = canopy_model::snapshot_from_json(&json)?;
        self.restore_snapshot(&nodes)?;
        Ok(true)
    }

    // === Lookup helpers ===

    /// Nearest window node above `node_id`, if any.
    pub(crate) fn containing_window(&self, node_id: &str) -> Option<&WindowNode> {
        let mut current = self.tree.tree().parent_id(node_id);
        while let Some(parent_id) = current {
            if let Some(window) = self.tree.get(parent_id).and_then(Node::as_window) {
                return Some(window);
            }
            current = self.tree.tree().parent_id(parent_id);
        }
        None
    }
}
