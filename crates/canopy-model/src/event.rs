//! Change notifications
//!
//! Every successful [`PageTree`](crate::PageTree) mutation is reported to
//! a single externally-supplied listener, synchronously, after the
//! structural change lands. Each variant carries enough context for a
//! listener to replay the change against an independent view.

use crate::node::Node;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeChange {
    Added {
        node: Node,
        parent_id: Option<String>,
        /// Sibling the node now sits in front of; `None` means appended
        before_sibling_id: Option<String>,
    },
    Removed {
        node_id: String,
        /// True when the subtree went with it, false when children were
        /// promoted into the removed node's position
        removed_children: bool,
    },
    Moved {
        node_id: String,
        parent_id: Option<String>,
        before_sibling_id: Option<String>,
    },
    Merged {
        kept_id: String,
        absorbed_id: String,
    },
    Updated {
        /// Snapshot of the node after the update (its id may have changed;
        /// `old_id` is the key the listener knew it by)
        old_id: String,
        node: Node,
    },
    Expanded {
        node_id: String,
    },
    Collapsed {
        node_id: String,
    },
    PageFocused {
        node_id: String,
    },
}

/// Listener invoked synchronously after every mutation.
pub type ChangeListener = Box<dyn Fn(&TreeChange) + Send>;
