//! Node variants
//!
//! Every node carries its own format-tagged id: `p<n>` live page keyed by
//! tab id, `w<n>` live window keyed by window id, `pH<uuid>`/`wH<uuid>`
//! archival forms, `f<uuid>`/`h<uuid>` synthetic folders and headers. Ids
//! change on hibernate/awaken; the tree re-keys its index when they do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use canopy_tree::TreeValue;

use crate::error::ModelError;
use crate::status::PageStatus;
use crate::Result;

/// Format-tagged id constructors.
pub mod ids {
    use uuid::Uuid;

    pub fn page(tab_id: u32) -> String {
        format!("p{}", tab_id)
    }

    pub fn window(window_id: u32) -> String {
        format!("w{}", window_id)
    }

    pub fn hibernated_page() -> String {
        format!("pH{}", Uuid::new_v4())
    }

    pub fn hibernated_window() -> String {
        format!("wH{}", Uuid::new_v4())
    }

    pub fn folder() -> String {
        format!("f{}", Uuid::new_v4())
    }

    pub fn header() -> String {
        format!("h{}", Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Normal,
    Popup,
}

impl WindowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Normal => "normal",
            WindowKind::Popup => "popup",
        }
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowNode {
    /// Current id; `w<n>` while awake, `wH<uuid>` once hibernated
    pub id: String,
    pub kind: WindowKind,
    pub incognito: bool,
    pub hibernated: bool,
    pub collapsed: bool,
    /// User-visible label for the window row
    pub title: String,
    /// Live browser window id, `None` while hibernated
    pub window_id: Option<u32>,
}

impl WindowNode {
    pub fn new_live(window_id: u32, kind: WindowKind, incognito: bool) -> Self {
        Self {
            id: ids::window(window_id),
            kind,
            incognito,
            hibernated: false,
            collapsed: false,
            title: String::new(),
            window_id: Some(window_id),
        }
    }

    /// Sever the live binding and assign an archival id.
    pub fn hibernate(&mut self) {
        self.id = ids::hibernated_window();
        self.hibernated = true;
        self.window_id = None;
    }

    /// Rebind to a live browser window.
    pub fn awaken(&mut self, window_id: u32) {
        self.id = ids::window(window_id);
        self.hibernated = false;
        self.window_id = Some(window_id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    /// Current id; `p<n>` while awake, `pH<uuid>` once hibernated
    pub id: String,
    pub url: String,
    pub title: String,
    pub favicon: Option<String>,
    pub status: PageStatus,
    pub pinned: bool,
    /// Finished loading while another page was focused
    pub unread: bool,
    /// Tree position finalized by an authoritative signal; automatic
    /// re-parenting must not touch this node again
    pub placed: bool,
    pub hibernated: bool,
    /// Loaded from a snapshot and waiting to be matched to a live tab
    pub restorable: bool,
    pub highlighted: bool,
    pub collapsed: bool,
    /// Optional user label shown alongside the title
    pub label: String,
    /// Referrer reported by the page itself
    pub referrer: Option<String>,
    /// History length reported by the page itself
    pub history_length: Option<u32>,
    /// Last known position in the native tab strip
    pub index: Option<u32>,
    /// Live browser tab id, `None` while hibernated
    pub tab_id: Option<u32>,
    /// Live browser window id, `None` while hibernated
    pub window_id: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageNode {
    pub fn new_live(tab_id: u32, window_id: u32, url: String, index: u32) -> Result<Self> {
        if url.is_empty() {
            return Err(ModelError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let now = Utc::now();

        Ok(Self {
            id: ids::page(tab_id),
            url,
            title: String::new(),
            favicon: None,
            status: PageStatus::Preload,
            pinned: false,
            unread: false,
            placed: false,
            hibernated: false,
            restorable: false,
            highlighted: false,
            collapsed: false,
            label: String::new(),
            referrer: None,
            history_length: None,
            index: Some(index),
            tab_id: Some(tab_id),
            window_id: Some(window_id),
            created_at: now,
            updated_at: now,
        })
    }

    /// Attempt to transition to a new load status
    pub fn transition_to(&mut self, next: PageStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        tracing::debug!(
            page_id = %self.id,
            from = %self.status,
            to = %next,
            "Page status transition"
        );

        self.status = next;
        self.touch();
        Ok(())
    }

    /// Sever the live binding, assign an archival id, and settle the status.
    pub fn hibernate(&mut self) {
        self.id = ids::hibernated_page();
        self.hibernated = true;
        self.status = PageStatus::Complete;
        self.tab_id = None;
        self.window_id = None;
        self.index = None;
        self.touch();
    }

    /// Rebind to a live browser tab.
    pub fn awaken(&mut self, tab_id: u32, window_id: u32) {
        self.id = ids::page(tab_id);
        self.hibernated = false;
        self.restorable = false;
        self.tab_id = Some(tab_id);
        self.window_id = Some(window_id);
        self.touch();
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.touch();
    }

    pub fn set_favicon(&mut self, favicon: Option<String>) {
        self.favicon = favicon;
        self.touch();
    }

    /// Update URL (navigation)
    pub fn navigate(&mut self, url: String) -> Result<()> {
        if url.is_empty() {
            return Err(ModelError::InvalidUrl("URL cannot be empty".to_string()));
        }
        self.url = url;
        self.touch();
        Ok(())
    }

    /// Get display title (with fallback to URL)
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub label: String,
    pub collapsed: bool,
}

impl FolderNode {
    pub fn new(label: String) -> Self {
        Self {
            id: ids::folder(),
            label,
            collapsed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderNode {
    pub id: String,
    pub label: String,
    pub collapsed: bool,
}

impl HeaderNode {
    pub fn new(label: String) -> Self {
        Self {
            id: ids::header(),
            label,
            collapsed: false,
        }
    }
}

/// A node in the organizer tree, matched exhaustively at every call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_kind", rename_all = "lowercase")]
pub enum Node {
    Window(WindowNode),
    Page(PageNode),
    Folder(FolderNode),
    Header(HeaderNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Window(w) => &w.id,
            Node::Page(p) => &p.id,
            Node::Folder(f) => &f.id,
            Node::Header(h) => &h.id,
        }
    }

    pub fn collapsed(&self) -> bool {
        match self {
            Node::Window(w) => w.collapsed,
            Node::Page(p) => p.collapsed,
            Node::Folder(f) => f.collapsed,
            Node::Header(h) => h.collapsed,
        }
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        match self {
            Node::Window(w) => w.collapsed = collapsed,
            Node::Page(p) => p.collapsed = collapsed,
            Node::Folder(f) => f.collapsed = collapsed,
            Node::Header(h) => h.collapsed = collapsed,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Node::Page(_))
    }

    pub fn is_window(&self) -> bool {
        matches!(self, Node::Window(_))
    }

    pub fn as_page(&self) -> Option<&PageNode> {
        match self {
            Node::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_page_mut(&mut self) -> Option<&mut PageNode> {
        match self {
            Node::Page(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_window(&self) -> Option<&WindowNode> {
        match self {
            Node::Window(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_window_mut(&mut self) -> Option<&mut WindowNode> {
        match self {
            Node::Window(w) => Some(w),
            _ => None,
        }
    }
}

impl TreeValue for Node {
    fn id(&self) -> &str {
        Node::id(self)
    }
}
