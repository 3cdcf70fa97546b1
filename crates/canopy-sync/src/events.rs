//! Browser event stream
//!
//! The engine consumes these one at a time, run-to-completion. Events
//! for a single tab arrive in browser order (create before update before
//! remove) but cross-entity ordering is not guaranteed, and echoes of
//! the engine's own host commands come back through the same stream.

use canopy_model::{PageStatus, WindowKind};

#[derive(Debug, Clone, PartialEq)]
pub struct TabInfo {
    pub id: u32,
    pub window_id: u32,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    /// Browsers only report loading/complete; preload is inferred
    pub status: PageStatus,
    pub index: u32,
    pub pinned: bool,
    pub opener_tab_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: u32,
    pub kind: WindowKind,
    pub incognito: bool,
    pub focused: bool,
}

/// Changed attributes reported by a tab-updated event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabChange {
    pub url: Option<String>,
    pub title: Option<String>,
    pub favicon: Option<String>,
    pub status: Option<PageStatus>,
    pub pinned: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionType {
    Link,
    Typed,
    Generated,
    AutoBookmark,
    FormSubmit,
    Reload,
    Other,
}

/// Main-frame navigation details. Sub-frame events carry `frame_id != 0`
/// and are ignored wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct NavDetails {
    pub tab_id: u32,
    pub frame_id: u32,
    pub url: String,
    pub transition_type: TransitionType,
    pub transition_qualifiers: Vec<String>,
}

impl NavDetails {
    pub fn from_address_bar(&self) -> bool {
        self.transition_qualifiers
            .iter()
            .any(|q| q == "from_address_bar")
    }
}

/// Which reconciliation branch a content-script report selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    /// Record referrer/history for later use
    Store,
    /// Match a restored tab back to an existing restorable node
    Associate,
    /// Re-parent under the page whose url equals the reported referrer
    FindParent,
}

/// A page's own report of itself, sent by the injected content script.
#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub tab_id: u32,
    pub action: PageAction,
    pub referrer: String,
    pub history_length: u32,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    TabCreated(TabInfo),
    TabRemoved {
        tab_id: u32,
        window_id: u32,
        /// The whole window is going away; skip per-tab reconciliation
        window_closing: bool,
    },
    TabUpdated {
        tab_id: u32,
        change: TabChange,
    },
    TabActivated {
        tab_id: u32,
        window_id: u32,
    },
    TabMoved {
        tab_id: u32,
        window_id: u32,
        from_index: u32,
        to_index: u32,
    },
    WindowCreated(WindowInfo),
    WindowRemoved {
        window_id: u32,
    },
    WindowFocusChanged {
        window_id: Option<u32>,
    },
    NavCommitted(NavDetails),
    NavCompleted {
        tab_id: u32,
        frame_id: u32,
    },
    /// A navigation will open in a new tab; may arrive before or after
    /// that tab's created event
    NavTargetCreated {
        source_tab_id: u32,
        tab_id: u32,
        url: String,
    },
    PageReported(PageReport),
}
