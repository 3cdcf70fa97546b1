//! Model error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Tree error: {0}")]
    Tree(#[from] canopy_tree::TreeError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Node is not a page: {0}")]
    NotAPage(String),

    #[error("Node is not a window: {0}")]
    NotAWindow(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
