//! Browser host seam
//!
//! The engine's only view of the live browser. Commands are fire and
//! forget: their effects come back through the event stream as echoes,
//! which is also how the engine recognizes its own corrective actions.
//! Queries answer from current browser state.

use thiserror::Error;

use crate::events::{TabInfo, WindowInfo};

#[derive(Error, Debug)]
#[error("{0}")]
pub struct HostError(pub String);

pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateTabOptions {
    /// `None` lets the browser pick the focused window
    pub window_id: Option<u32>,
    pub url: String,
    pub active: bool,
    pub pinned: bool,
    /// `None` appends at the end of the tab strip
    pub index: Option<u32>,
}

pub trait BrowserHost: Send + Sync {
    // === Commands (fire and forget) ===

    fn create_tab(&self, opts: CreateTabOptions) -> HostResult<()>;
    fn remove_tab(&self, tab_id: u32) -> HostResult<()>;
    fn move_tab(&self, tab_id: u32, window_id: u32, to_index: u32) -> HostResult<()>;
    fn activate_tab(&self, tab_id: u32) -> HostResult<()>;
    fn create_window(&self, first_url: Option<String>) -> HostResult<()>;
    fn remove_window(&self, window_id: u32) -> HostResult<()>;

    // === Queries ===

    fn tab_info(&self, tab_id: u32) -> Option<TabInfo>;
    fn tabs_in_window(&self, window_id: u32) -> Vec<TabInfo>;
    fn windows(&self) -> Vec<WindowInfo>;
}
