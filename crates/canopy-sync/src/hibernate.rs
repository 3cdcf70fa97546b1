//! Hibernate and awaken flows
//!
//! Hibernation converts "remove the live tab" into "retain the node":
//! the tree is updated first, so the tab-removal echo finds no live node
//! and leaves the archival entry alone. Awakening runs the other way and
//! spans several events; pending registries carry the flow across the
//! echoes instead of nesting continuations.

use canopy_model::{ids, Node, PageStatus};

use crate::engine::{PendingAwaken, PendingWindowAwaken, SyncEngine};
use crate::events::TabInfo;
use crate::host::CreateTabOptions;
use crate::{Result, SyncError};

impl SyncEngine {
    /// Convert a live page into an archival node, then close its tab.
    /// Returns the node's archival id.
    pub fn hibernate_page(&mut self, node_id: &str, skip_last_tab_check: bool) -> Result<String> {
        let page = self.tree.page(node_id)?;
        if page.hibernated {
            return Err(SyncError::AlreadyHibernated(node_id.to_string()));
        }
        let Some(tab_id) = page.tab_id else {
            return Err(SyncError::AlreadyHibernated(node_id.to_string()));
        };

        if !skip_last_tab_check && self.live_tab_count() <= 1 {
            // the browser process exits with its last tab; park a blank
            // one before closing the original
            tracing::info!("Hibernating the last open tab; opening a placeholder first");
            if let Err(e) = self.host.create_tab(CreateTabOptions {
                window_id: None,
                url: self.config.new_tab_url.clone(),
                active: true,
                pinned: false,
                index: None,
            }) {
                tracing::warn!(error = %e, "Placeholder tab refused");
            }
        }

        self.tab_index.remove_node(node_id);
        if self.focused_page_id.as_deref() == Some(node_id) {
            self.focused_page_id = None;
        }
        let new_id = self.tree.update_page(node_id, |page| page.hibernate())?;
        // tree first, then the tab: the removal echo finds no live node
        if let Err(e) = self.host.remove_tab(tab_id) {
            tracing::warn!(tab_id, error = %e, "Tab close refused during hibernation");
        }
        tracing::info!(old = %node_id, new = %new_id, "Page hibernated");
        self.schedule_save();
        Ok(new_id)
    }

    fn live_tab_count(&self) -> usize {
        self.host
            .windows()
            .iter()
            .map(|window| self.host.tabs_in_window(window.id).len())
            .sum()
    }

    /// Hibernate a window's live pages, archive the window node, then
    /// close the browser window.
    pub fn hibernate_window(&mut self, node_id: &str) -> Result<String> {
        let window = self.tree.window(node_id)?;
        if window.hibernated {
            return Err(SyncError::AlreadyHibernated(node_id.to_string()));
        }
        let Some(window_id) = window.window_id else {
            return Err(SyncError::AlreadyHibernated(node_id.to_string()));
        };

        let live_pages: Vec<String> = self
            .tree
            .tree()
            .subtree_ids(node_id)
            .iter()
            .filter_map(|id| self.tree.get(id).and_then(Node::as_page))
            .filter(|page| page.tab_id.is_some())
            .map(|page| page.id.clone())
            .collect();
        for page_id in live_pages {
            self.hibernate_page(&page_id, true)?;
        }
        let new_id = self.tree.update_window(node_id, |window| window.hibernate())?;
        self.tab_index.remove_window(window_id);
        if let Err(e) = self.host.remove_window(window_id) {
            tracing::warn!(window_id, error = %e, "Window close refused during hibernation");
        }
        tracing::info!(old = %node_id, new = %new_id, "Window hibernated");
        self.schedule_save();
        Ok(new_id)
    }

    /// Recreate live tabs for a set of hibernated pages owned by
    /// `window_node_id`. An awake owner gets its tabs immediately; a
    /// hibernated owner first takes over a lone blank window if the host
    /// has one, else a fresh window is requested and the flow finishes
    /// when its echo arrives.
    pub fn awaken_pages(
        &mut self,
        node_ids: &[String],
        window_node_id: &str,
        activate: bool,
    ) -> Result<()> {
        let window = self.tree.window(window_node_id)?.clone();
        let mut pages = Vec::new();
        for id in node_ids {
            let page = self.tree.page(id)?;
            if !page.hibernated {
                return Err(SyncError::NotHibernated(id.clone()));
            }
            pages.push((id.clone(), page.url.clone()));
        }
        if pages.is_empty() {
            return Ok(());
        }

        if let Some(live_window_id) = window.window_id {
            for (i, (node_id, url)) in pages.into_iter().enumerate() {
                self.request_awaken_tab(
                    node_id,
                    url,
                    window_node_id.to_string(),
                    live_window_id,
                    activate && i == 0,
                );
            }
            return Ok(());
        }

        let placeholder = self.host.windows().into_iter().find(|window| {
            let tabs = self.host.tabs_in_window(window.id);
            tabs.len() == 1 && tabs[0].url == self.config.new_tab_url
        });
        match placeholder {
            Some(info) => {
                let placeholder_tab = self
                    .host
                    .tabs_in_window(info.id)
                    .first()
                    .map(|tab| tab.id);
                let live_node_id = self.bind_awakened_window(window_node_id, info.id)?;
                for (i, (node_id, url)) in pages.into_iter().enumerate() {
                    self.request_awaken_tab(
                        node_id,
                        url,
                        live_node_id.clone(),
                        info.id,
                        activate && i == 0,
                    );
                }
                if let Some(tab_id) = placeholder_tab {
                    let _ = self.host.remove_tab(tab_id);
                }
            }
            None => {
                let (first_id, first_url) = pages[0].clone();
                self.pending_awakens.push(PendingAwaken {
                    node_id: first_id,
                    url: first_url.clone(),
                    window_node_id: window_node_id.to_string(),
                    activate,
                });
                self.pending_window_awakens.push(PendingWindowAwaken {
                    window_node_id: window_node_id.to_string(),
                    remaining: pages[1..].iter().map(|(id, _)| id.clone()).collect(),
                });
                if let Err(e) = self.host.create_window(Some(first_url)) {
                    tracing::warn!(error = %e, "Window create refused during awaken");
                }
            }
        }
        Ok(())
    }

    /// Awaken every hibernated page in a window's subtree.
    pub fn awaken_window(&mut self, window_node_id: &str, activate: bool) -> Result<()> {
        let page_ids: Vec<String> = self
            .tree
            .tree()
            .subtree_ids(window_node_id)
            .iter()
            .filter_map(|id| self.tree.get(id).and_then(Node::as_page))
            .filter(|page| page.hibernated)
            .map(|page| page.id.clone())
            .collect();
        self.awaken_pages(&page_ids, window_node_id, activate)
    }

    pub(crate) fn request_awaken_tab(
        &mut self,
        node_id: String,
        url: String,
        window_node_id: String,
        live_window_id: u32,
        activate: bool,
    ) {
        self.pending_awakens.push(PendingAwaken {
            node_id,
            url: url.clone(),
            window_node_id,
            activate,
        });
        if let Err(e) = self.host.create_tab(CreateTabOptions {
            window_id: Some(live_window_id),
            url,
            active: false,
            pinned: false,
            index: None,
        }) {
            tracing::warn!(error = %e, "Tab create refused during awaken");
        }
    }

    /// Rebind an archival window node to a live browser window, absorbing
    /// any node the live window already acquired so the archival node's
    /// identity survives the id change.
    pub(crate) fn bind_awakened_window(
        &mut self,
        old_node_id: &str,
        live_window_id: u32,
    ) -> Result<String> {
        let live_id = ids::window(live_window_id);
        if !self.tree.contains(old_node_id) {
            // vanished while the window came up; fall back to a plain node
            tracing::warn!(node = %old_node_id, "Awaken target window vanished");
            self.ensure_window(live_window_id)?;
            return Ok(live_id);
        }
        if self.tree.contains(&live_id) {
            self.tree.merge(old_node_id, &live_id)?;
        }
        let new_id = self
            .tree
            .update_window(old_node_id, |window| window.awaken(live_window_id))?;
        tracing::info!(window = %new_id, "Window awakened");
        Ok(new_id)
    }

    /// Match a created tab against the pending awakens, by url first and
    /// owner window second. A match reuses the hibernated node instead of
    /// creating a duplicate.
    pub(crate) fn try_complete_awaken(&mut self, tab: &TabInfo) -> Result<bool> {
        let position = self
            .pending_awakens
            .iter()
            .position(|pending| pending.url == tab.url)
            .or_else(|| {
                let window_node_id = ids::window(tab.window_id);
                self.pending_awakens
                    .iter()
                    .position(|pending| pending.window_node_id == window_node_id)
            });
        let Some(position) = position else {
            return Ok(false);
        };
        let pending = self.pending_awakens.remove(position);
        if !self.tree.contains(&pending.node_id) {
            tracing::warn!(node = %pending.node_id, "Awaken target vanished; treating the tab as new");
            return Ok(false);
        }

        let new_id = self.tree.update_page(&pending.node_id, |page| {
            page.awaken(tab.id, tab.window_id);
            page.index = Some(tab.index);
            if !tab.title.is_empty() {
                page.set_title(tab.title.clone());
            }
            if tab.status != PageStatus::Preload {
                let _ = page.transition_to(tab.status);
            }
        })?;

        // the node must live under the window the browser actually put
        // the tab in; the branch it hibernated under may differ
        let live_window_node = ids::window(tab.window_id);
        let holder = self.containing_window(&new_id).map(|window| window.id.clone());
        if self.tree.contains(&live_window_node)
            && holder.as_deref() != Some(live_window_node.as_str())
        {
            if let Err(e) = self.tree.move_deep(&new_id, &live_window_node) {
                tracing::warn!(page = %new_id, error = %e, "Awakened page re-parent failed");
            }
        }
        self.tab_index
            .insert_at(tab.window_id, tab.index as usize, new_id.clone());
        self.refresh_indexes(tab.window_id)?;
        if pending.activate {
            let _ = self.host.activate_tab(tab.id);
        }
        tracing::info!(page = %new_id, "Hibernated page awakened");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::events::{BrowserEvent, WindowInfo};
    use crate::host::BrowserHost;
    use crate::testing::{tab, HostCommand, ScriptedHost};
    use canopy_model::WindowKind;
    use std::sync::Arc;

    fn engine_with_host() -> (SyncEngine, Arc<ScriptedHost>) {
        let host = Arc::new(ScriptedHost::new());
        let engine = SyncEngine::new(
            Arc::clone(&host) as Arc<dyn BrowserHost>,
            EngineConfig::default(),
        );
        (engine, host)
    }

    fn open_window(engine: &mut SyncEngine, window_id: u32) {
        engine
            .handle_event(BrowserEvent::WindowCreated(WindowInfo {
                id: window_id,
                kind: WindowKind::Normal,
                incognito: false,
                focused: false,
            }))
            .unwrap();
    }

    #[test]
    fn test_hibernate_survives_removal_echo() {
        let (mut engine, host) = engine_with_host();
        host.add_window(10, WindowKind::Normal);
        host.add_tab(tab(1, 10, "https://a"));
        host.add_tab(tab(2, 10, "https://b"));
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let mut second = tab(2, 10, "https://b");
        second.index = 1;
        engine.handle_event(BrowserEvent::TabCreated(second)).unwrap();

        let archived = engine.hibernate_page("p2", false).unwrap();
        assert!(archived.starts_with("pH"));
        let page = engine.tree().page(&archived).unwrap();
        assert!(page.hibernated);
        assert_eq!(page.status, PageStatus::Complete);
        assert_eq!(page.tab_id, None);
        assert!(host.commands().contains(&HostCommand::RemoveTab(2)));
        assert_eq!(engine.tab_index().entries(10), &["p1"]);

        let before = engine.tree().len();
        engine
            .handle_event(BrowserEvent::TabRemoved {
                tab_id: 2,
                window_id: 10,
                window_closing: false,
            })
            .unwrap();
        assert_eq!(engine.tree().len(), before);
        assert!(engine.tree().contains(&archived));
    }

    #[test]
    fn test_last_tab_hibernation_opens_placeholder() {
        let (mut engine, host) = engine_with_host();
        host.add_window(10, WindowKind::Normal);
        host.add_tab(tab(1, 10, "https://a"));
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();

        engine.hibernate_page("p1", false).unwrap();
        let commands = host.commands();
        let placeholder = commands
            .iter()
            .position(|c| {
                matches!(c, HostCommand::CreateTab(opts) if opts.url == "canopy://newtab")
            })
            .expect("placeholder tab requested");
        let close = commands
            .iter()
            .position(|c| matches!(c, HostCommand::RemoveTab(1)))
            .expect("original tab closed");
        assert!(placeholder < close, "placeholder opens before the close");
    }

    #[test]
    fn test_skip_last_tab_check_suppresses_placeholder() {
        let (mut engine, host) = engine_with_host();
        host.add_window(10, WindowKind::Normal);
        host.add_tab(tab(1, 10, "https://a"));
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();

        engine.hibernate_page("p1", true).unwrap();
        assert!(!host
            .commands()
            .iter()
            .any(|c| matches!(c, HostCommand::CreateTab(_))));
    }

    #[test]
    fn test_awaken_into_live_window_reuses_node() {
        let (mut engine, host) = engine_with_host();
        host.add_window(10, WindowKind::Normal);
        host.add_tab(tab(1, 10, "https://a"));
        host.add_tab(tab(2, 10, "https://x"));
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let mut second = tab(2, 10, "https://x");
        second.index = 1;
        engine.handle_event(BrowserEvent::TabCreated(second)).unwrap();

        let archived = engine.hibernate_page("p2", false).unwrap();
        engine
            .handle_event(BrowserEvent::TabRemoved {
                tab_id: 2,
                window_id: 10,
                window_closing: false,
            })
            .unwrap();

        engine
            .awaken_pages(&[archived.clone()], "w10", true)
            .unwrap();
        assert!(host.commands().iter().any(|c| {
            matches!(c, HostCommand::CreateTab(opts)
                if opts.url == "https://x" && opts.window_id == Some(10))
        }));

        let before = engine.tree().len();
        let mut echo = tab(42, 10, "https://x");
        echo.index = 1;
        engine.handle_event(BrowserEvent::TabCreated(echo)).unwrap();
        // the hibernated node is reused, not duplicated
        assert_eq!(engine.tree().len(), before);
        assert!(!engine.tree().contains(&archived));
        let page = engine.tree().page("p42").unwrap();
        assert_eq!(page.url, "https://x");
        assert!(!page.hibernated);
        assert_eq!(page.window_id, Some(10));
        assert!(host.commands().contains(&HostCommand::ActivateTab(42)));
        assert_eq!(engine.tab_index().entries(10), &["p1", "p42"]);
    }

    #[test]
    fn test_awaken_hibernated_window_requests_window() {
        let (mut engine, host) = engine_with_host();
        host.add_window(11, WindowKind::Normal);
        host.add_tab(tab(9, 11, "https://other"));
        open_window(&mut engine, 10);
        open_window(&mut engine, 11);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(9, 11, "https://other")))
            .unwrap();
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let mut second = tab(2, 10, "https://b");
        second.index = 1;
        engine.handle_event(BrowserEvent::TabCreated(second)).unwrap();

        let window_node = engine.hibernate_window("w10").unwrap();
        assert!(window_node.starts_with("wH"));
        assert!(host.commands().contains(&HostCommand::RemoveWindow(10)));
        assert_eq!(engine.tree().window(&window_node).unwrap().window_id, None);

        engine.awaken_window(&window_node, false).unwrap();
        assert!(host
            .commands()
            .contains(&HostCommand::CreateWindow(Some("https://a".to_string()))));

        // window echo binds the archival node to the live window id
        engine
            .handle_event(BrowserEvent::WindowCreated(WindowInfo {
                id: 20,
                kind: WindowKind::Normal,
                incognito: false,
                focused: true,
            }))
            .unwrap();
        assert!(!engine.tree().contains(&window_node));
        let window = engine.tree().window("w20").unwrap();
        assert!(!window.hibernated);
        // the second page's tab was requested against the new window
        assert!(host.commands().iter().any(|c| {
            matches!(c, HostCommand::CreateTab(opts)
                if opts.url == "https://b" && opts.window_id == Some(20))
        }));

        // tab echoes rebind both pages without duplicates
        engine
            .handle_event(BrowserEvent::TabCreated(tab(30, 20, "https://a")))
            .unwrap();
        let mut second_echo = tab(31, 20, "https://b");
        second_echo.index = 1;
        engine
            .handle_event(BrowserEvent::TabCreated(second_echo))
            .unwrap();
        assert_eq!(engine.tree().tree().parent_id("p30"), Some("w20"));
        assert_eq!(engine.tree().tree().parent_id("p31"), Some("w20"));
        assert!(engine
            .tree()
            .find_page(|page| page.hibernated)
            .is_none());
        assert_eq!(engine.tab_index().entries(20), &["p30", "p31"]);
    }

    #[test]
    fn test_awaken_reuses_lone_blank_window() {
        let (mut engine, host) = engine_with_host();
        host.add_window(11, WindowKind::Normal);
        host.add_window(30, WindowKind::Normal);
        host.add_tab(tab(9, 11, "https://other"));
        host.add_tab(tab(99, 30, "canopy://newtab"));
        open_window(&mut engine, 10);
        open_window(&mut engine, 11);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(9, 11, "https://other")))
            .unwrap();
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let window_node = engine.hibernate_window("w10").unwrap();

        engine.awaken_window(&window_node, false).unwrap();
        // no new window; the blank one is taken over and its tab closed
        assert!(!host
            .commands()
            .iter()
            .any(|c| matches!(c, HostCommand::CreateWindow(_))));
        assert!(host.commands().contains(&HostCommand::RemoveTab(99)));
        let window = engine.tree().window("w30").unwrap();
        assert!(!window.hibernated);
        assert_eq!(window.window_id, Some(30));
        assert!(host.commands().iter().any(|c| {
            matches!(c, HostCommand::CreateTab(opts)
                if opts.url == "https://a" && opts.window_id == Some(30))
        }));
    }

    #[test]
    fn test_awaken_rejects_live_page() {
        let (mut engine, _host) = engine_with_host();
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let err = engine
            .awaken_pages(&["p1".to_string()], "w10", false)
            .unwrap_err();
        assert!(matches!(err, SyncError::NotHibernated(_)));
    }

    #[test]
    fn test_double_hibernate_rejected() {
        let (mut engine, host) = engine_with_host();
        host.add_window(10, WindowKind::Normal);
        host.add_tab(tab(1, 10, "https://a"));
        host.add_tab(tab(2, 10, "https://b"));
        open_window(&mut engine, 10);
        engine
            .handle_event(BrowserEvent::TabCreated(tab(1, 10, "https://a")))
            .unwrap();
        let mut second = tab(2, 10, "https://b");
        second.index = 1;
        engine.handle_event(BrowserEvent::TabCreated(second)).unwrap();

        let archived = engine.hibernate_page("p2", false).unwrap();
        let err = engine.hibernate_page(&archived, false).unwrap_err();
        assert!(matches!(err, SyncError::AlreadyHibernated(_)));
    }
}
