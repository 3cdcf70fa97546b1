//! Canopy Synchronization Engine
//!
//! Keeps the page tree consistent with live browser window/tab state
//! under a stream of out-of-order, partial, and sometimes contradictory
//! events. Early placement signals (opener tab, navigation target) are
//! provisional; the engine promotes a page to `placed` only once a
//! signal is judged authoritative (address-bar navigation, or load
//! completion as the backstop), refining the guess via referrer
//! matching in between.

mod engine;
mod error;
mod events;
mod hibernate;
mod host;
mod persist;
mod placement;
mod tab_index;

#[cfg(test)]
pub(crate) mod testing;

pub use canopy_tree::Anchor;
pub use engine::{EngineConfig, SyncEngine};
pub use error::SyncError;
pub use events::{
    BrowserEvent, NavDetails, PageAction, PageReport, TabChange, TabInfo, TransitionType,
    WindowInfo,
};
pub use host::{BrowserHost, CreateTabOptions, HostError, HostResult};
pub use persist::PersistenceBridge;
pub use tab_index::TabIndex;

pub type Result<T> = std::result::Result<T, SyncError>;
