//! Canopy Tree Container
//!
//! Ordered, multi-root tree with id-indexed lookup. Nodes live in a flat
//! arena keyed by id; each node stores its parent id and an ordered list
//! of child ids, so parent lookup is O(1) and no reference cycles exist.
//! The container knows nothing about pages or windows.

mod error;
mod tree;

pub use error::TreeError;
pub use tree::{Anchor, FoundNode, Tree, TreeValue};

pub type Result<T> = std::result::Result<T, TreeError>;
