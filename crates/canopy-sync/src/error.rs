//! Sync engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Tree error: {0}")]
    Tree(#[from] canopy_tree::TreeError),

    #[error("Model error: {0}")]
    Model(#[from] canopy_model::ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] canopy_store::StorageError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Browser host error: {0}")]
    Host(#[from] crate::host::HostError),

    #[error("No window node for browser window {0}")]
    UnknownWindow(u32),

    #[error("No page node for browser tab {0}")]
    UnknownTab(u32),

    #[error("Node is not hibernated: {0}")]
    NotHibernated(String),

    #[error("Node is already hibernated: {0}")]
    AlreadyHibernated(String),
}
