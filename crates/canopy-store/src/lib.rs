//! Canopy Storage Layer
//!
//! SQLite-based persistence for tree snapshots, plus the named debounce
//! registry used to coalesce rapid mutations into a single write.

mod database;
mod debounce;
mod error;
mod migrations;

pub use database::Database;
pub use debounce::TimeoutManager;
pub use error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;
