//! Page tree
//!
//! Domain wrapper over the generic tree. All mutation flows through here
//! so the change-notification contract stays authoritative; readers get
//! the underlying tree by shared reference only.

use canopy_tree::{Anchor, Tree, TreeError};

use crate::error::ModelError;
use crate::event::{ChangeListener, TreeChange};
use crate::node::{FolderNode, HeaderNode, Node, PageNode, WindowNode};
use crate::Result;

pub struct PageTree {
    tree: Tree<Node>,
    listener: Option<ChangeListener>,
}

impl PageTree {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(),
            listener: None,
        }
    }

    /// Install the single change listener. Replaces any previous one.
    pub fn set_listener(&mut self, listener: ChangeListener) {
        self.listener = Some(listener);
    }

    fn notify(&self, change: &TreeChange) {
        if let Some(listener) = &self.listener {
            listener(change);
        }
    }

    /// Read-only view of the underlying tree.
    pub fn tree(&self) -> &Tree<Node> {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tree.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn page(&self, id: &str) -> Result<&PageNode> {
        self.tree
            .get(id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?
            .as_page()
            .ok_or_else(|| ModelError::NotAPage(id.to_string()))
    }

    pub fn window(&self, id: &str) -> Result<&WindowNode> {
        self.tree
            .get(id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?
            .as_window()
            .ok_or_else(|| ModelError::NotAWindow(id.to_string()))
    }

    pub fn find_page<F>(&self, matcher: F) -> Option<&PageNode>
    where
        F: Fn(&PageNode) -> bool,
    {
        self.tree
            .find(|node| node.as_page().map(&matcher).unwrap_or(false))
            .and_then(Node::as_page)
    }

    pub fn find_window<F>(&self, matcher: F) -> Option<&WindowNode>
    where
        F: Fn(&WindowNode) -> bool,
    {
        self.tree
            .find(|node| node.as_window().map(&matcher).unwrap_or(false))
            .and_then(Node::as_window)
    }

    /// All window nodes in pre-order.
    pub fn windows(&self) -> Vec<&WindowNode> {
        self.tree
            .nodes()
            .into_iter()
            .filter_map(Node::as_window)
            .collect()
    }

    // === Mutations ===

    /// Attach a node; `parent_id: None` makes it a root.
    pub fn add_node(&mut self, node: Node, parent_id: Option<&str>) -> Result<()> {
        let id = node.id().to_string();
        match parent_id {
            Some(pid) => self.tree.add_child_of(node, pid)?,
            None => self.tree.add_root(node)?,
        }
        let (parent_id, before_sibling_id) = self.change_context(&id);
        let node = match self.tree.get(&id) {
            Some(node) => node.clone(),
            None => return Err(ModelError::NotFound(id)),
        };
        self.notify(&TreeChange::Added {
            node,
            parent_id,
            before_sibling_id,
        });
        Ok(())
    }

    pub fn add_window(&mut self, window: WindowNode) -> Result<()> {
        self.add_node(Node::Window(window), None)
    }

    pub fn add_page(&mut self, page: PageNode, parent_id: &str) -> Result<()> {
        self.add_node(Node::Page(page), Some(parent_id))
    }

    pub fn add_folder(&mut self, folder: FolderNode, parent_id: Option<&str>) -> Result<()> {
        self.add_node(Node::Folder(folder), parent_id)
    }

    pub fn add_header(&mut self, header: HeaderNode, parent_id: Option<&str>) -> Result<()> {
        self.add_node(Node::Header(header), parent_id)
    }

    /// Mutate a page in place. Re-keys the id index when the closure
    /// changes the page's id; returns the current id either way.
    pub fn update_page<F>(&mut self, id: &str, f: F) -> Result<String>
    where
        F: FnOnce(&mut PageNode),
    {
        self.page(id)?;
        let new_id = self.tree.update_by_id(id, |node| {
            if let Node::Page(page) = node {
                f(page);
            }
        })?;
        let node = match self.tree.get(&new_id) {
            Some(node) => node.clone(),
            None => return Err(ModelError::NotFound(new_id)),
        };
        self.notify(&TreeChange::Updated {
            old_id: id.to_string(),
            node,
        });
        Ok(new_id)
    }

    pub fn update_window<F>(&mut self, id: &str, f: F) -> Result<String>
    where
        F: FnOnce(&mut WindowNode),
    {
        self.window(id)?;
        let new_id = self.tree.update_by_id(id, |node| {
            if let Node::Window(window) = node {
                f(window);
            }
        })?;
        let node = match self.tree.get(&new_id) {
            Some(node) => node.clone(),
            None => return Err(ModelError::NotFound(new_id)),
        };
        self.notify(&TreeChange::Updated {
            old_id: id.to_string(),
            node,
        });
        Ok(new_id)
    }

    /// Detach a node. Children are promoted into its position unless
    /// `remove_children` is set. `None` when the id is already gone.
    pub fn remove(&mut self, id: &str, remove_children: bool) -> Option<Node> {
        let removed = self.tree.remove_by_id(id, remove_children)?;
        self.notify(&TreeChange::Removed {
            node_id: id.to_string(),
            removed_children: remove_children,
        });
        Some(removed)
    }

    pub fn move_deep(&mut self, id: &str, new_parent_id: &str) -> Result<()> {
        self.tree.move_deep_by_id(id, new_parent_id)?;
        self.emit_moved(id);
        Ok(())
    }

    pub fn move_shallow(&mut self, id: &str, new_parent_id: &str) -> Result<()> {
        self.tree.move_shallow_by_id(id, new_parent_id)?;
        self.emit_moved(id);
        Ok(())
    }

    pub fn move_anchored(&mut self, id: &str, anchor: Anchor) -> Result<()> {
        self.tree.move_deep_anchored(id, anchor)?;
        self.emit_moved(id);
        Ok(())
    }

    fn emit_moved(&self, id: &str) {
        let (parent_id, before_sibling_id) = self.change_context(id);
        self.notify(&TreeChange::Moved {
            node_id: id.to_string(),
            parent_id,
            before_sibling_id,
        });
    }

    /// Absorb `absorbed_id`'s children into `kept_id` (appended, in
    /// order), then discard the absorbed node.
    pub fn merge(&mut self, kept_id: &str, absorbed_id: &str) -> Result<()> {
        if !self.tree.contains(kept_id) {
            return Err(ModelError::NotFound(kept_id.to_string()));
        }
        if !self.tree.contains(absorbed_id) {
            return Err(ModelError::NotFound(absorbed_id.to_string()));
        }
        if kept_id == absorbed_id || self.tree.is_descendant_of(kept_id, absorbed_id) {
            return Err(ModelError::Tree(TreeError::WouldCycle {
                id: absorbed_id.to_string(),
                dest: kept_id.to_string(),
            }));
        }
        for child in self.tree.child_ids(absorbed_id).to_vec() {
            self.tree.move_deep_by_id(&child, kept_id)?;
        }
        self.tree.remove_by_id(absorbed_id, false);
        self.notify(&TreeChange::Merged {
            kept_id: kept_id.to_string(),
            absorbed_id: absorbed_id.to_string(),
        });
        Ok(())
    }

    /// Mark a page as the active one; clears its unread flag.
    pub fn focus_page(&mut self, id: &str) -> Result<()> {
        self.page(id)?;
        self.tree.update_by_id(id, |node| {
            if let Node::Page(page) = node {
                page.unread = false;
            }
        })?;
        self.notify(&TreeChange::PageFocused {
            node_id: id.to_string(),
        });
        Ok(())
    }

    /// Expand or collapse a node; emits only when the state changes.
    pub fn set_collapsed(&mut self, id: &str, collapsed: bool) -> Result<()> {
        let current = self
            .tree
            .get(id)
            .ok_or_else(|| ModelError::NotFound(id.to_string()))?
            .collapsed();
        if current == collapsed {
            return Ok(());
        }
        self.tree.update_by_id(id, |node| node.set_collapsed(collapsed))?;
        let change = if collapsed {
            TreeChange::Collapsed {
                node_id: id.to_string(),
            }
        } else {
            TreeChange::Expanded {
                node_id: id.to_string(),
            }
        };
        self.notify(&change);
        Ok(())
    }

    fn change_context(&self, id: &str) -> (Option<String>, Option<String>) {
        let parent = self.tree.parent_id(id).map(|s| s.to_string());
        let siblings = match parent.as_deref() {
            Some(pid) => self.tree.child_ids(pid),
            None => self.tree.root_ids(),
        };
        let before = siblings
            .iter()
            .position(|s| s.as_str() == id)
            .and_then(|pos| siblings.get(pos + 1))
            .cloned();
        (parent, before)
    }
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}
