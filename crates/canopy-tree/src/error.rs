//! Tree error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("No node matched the predicate")]
    NoMatch,

    #[error("Parent predicate matched no node")]
    ParentNotFound,

    #[error("Duplicate node id: {0}")]
    DuplicateId(String),

    #[error("Anchor node not found: {0}")]
    AnchorNotFound(String),

    #[error("Moving {id} under {dest} would create a cycle")]
    WouldCycle { id: String, dest: String },
}
