//! Canopy Node Model
//!
//! Typed node variants (window, page, folder, header) layered over the
//! generic tree, the page status state machine, and the [`PageTree`]
//! specialization whose every mutation emits a [`TreeChange`] so an
//! independent view can replay the change without re-deriving it.

mod error;
mod event;
mod node;
mod page_tree;
mod snapshot;
mod status;

pub use error::ModelError;
pub use event::{ChangeListener, TreeChange};
pub use node::{ids, FolderNode, HeaderNode, Node, PageNode, WindowKind, WindowNode};
pub use page_tree::PageTree;
pub use snapshot::{snapshot_from_json, snapshot_to_json, SnapshotNode};
pub use status::PageStatus;

pub type Result<T> = std::result::Result<T, ModelError>;
