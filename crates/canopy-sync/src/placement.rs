//! Placement heuristics
//!
//! No single event reliably conveys a page's final parent. Early signals
//! (opener tab, navigation target) parent provisionally; an address-bar
//! navigation or load completion promotes the guess to final, and the
//! page's own referrer report can refine it in between. Once `placed` is
//! set, no automatic signal moves the node again.

use canopy_model::{ids, PageNode, PageStatus};
use url::Url;

use crate::engine::SyncEngine;
use crate::events::{NavDetails, PageAction, PageReport, TabInfo, TransitionType};
use crate::Result;

impl SyncEngine {
    pub(crate) fn on_tab_created(&mut self, tab: TabInfo) -> Result<()> {
        let window_node_id = self.ensure_window(tab.window_id)?;
        if self.try_complete_awaken(&tab)? {
            return Ok(());
        }

        let (parent_id, lock_placed) = self.initial_parent(&tab, &window_node_id);

        let url = if tab.url.is_empty() {
            self.config.new_tab_url.clone()
        } else {
            tab.url.clone()
        };
        let mut page = PageNode::new_live(tab.id, tab.window_id, url, tab.index)?;
        if !tab.title.is_empty() {
            page.title = tab.title.clone();
        }
        page.favicon = tab.favicon.clone();
        page.pinned = tab.pinned;
        page.placed = lock_placed;
        if tab.status != PageStatus::Preload {
            let _ = page.transition_to(tab.status);
        }

        let node_id = page.id.clone();
        tracing::debug!(page = %node_id, parent = %parent_id, placed = lock_placed, "Page created");
        self.tree.add_page(page, &parent_id)?;
        self.tab_index
            .insert_at(tab.window_id, tab.index as usize, node_id);
        self.refresh_indexes(tab.window_id)?;
        Ok(())
    }

    /// First guess at a page's parent, weakest signal last. The second
    /// element locks the decision immediately (settings-style pages
    /// only); everything else stays open to a stronger signal.
    fn initial_parent(&mut self, tab: &TabInfo, window_node_id: &str) -> (String, bool) {
        if self.is_internal_page(&tab.url) {
            if tab.url == self.config.options_url {
                return (window_node_id.to_string(), true);
            }
            if let Some(focused) = self.focused_page_id.clone() {
                if self.tree.contains(&focused) {
                    return (focused, false);
                }
            }
            return (window_node_id.to_string(), false);
        }
        if let Some(opener) = tab.opener_tab_id {
            let opener_id = ids::page(opener);
            if self.tree.contains(&opener_id) {
                return (opener_id, false);
            }
        }
        if let Some(source) = self.pending_nav_targets.remove(&tab.id) {
            let source_id = ids::page(source);
            if self.tree.contains(&source_id) {
                return (source_id, false);
            }
        }
        (window_node_id.to_string(), false)
    }

    pub(crate) fn is_internal_page(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|parsed| parsed.scheme() == self.config.internal_scheme)
            .unwrap_or(false)
    }

    /// The target tab may not exist yet; park the source until it does.
    pub(crate) fn on_nav_target_created(&mut self, source_tab_id: u32, tab_id: u32) -> Result<()> {
        let found = self
            .tree
            .find_page(|page| page.tab_id == Some(tab_id))
            .map(|page| (page.id.clone(), page.placed));
        match found {
            Some((node_id, placed)) => {
                if placed {
                    return Ok(());
                }
                let source_id = ids::page(source_tab_id);
                if self.tree.contains(&source_id)
                    && self.tree.tree().parent_id(&node_id) != Some(source_id.as_str())
                {
                    if let Err(e) = self.tree.move_deep(&node_id, &source_id) {
                        tracing::warn!(page = %node_id, error = %e, "Target re-parent failed");
                    }
                }
            }
            None => {
                self.pending_nav_targets.insert(tab_id, source_tab_id);
            }
        }
        Ok(())
    }

    pub(crate) fn on_nav_committed(&mut self, details: NavDetails) -> Result<()> {
        if details.frame_id != 0 {
            return Ok(());
        }
        let found = self
            .tree
            .find_page(|page| page.tab_id == Some(details.tab_id))
            .map(|page| (page.id.clone(), page.placed, page.window_id));
        let Some((node_id, placed, window_id)) = found else {
            return Ok(());
        };

        let url = details.url.clone();
        self.tree.update_page(&node_id, |page| {
            if !url.is_empty() {
                let _ = page.navigate(url);
            }
            let _ = page.transition_to(PageStatus::Loading);
        })?;

        let typed = matches!(
            details.transition_type,
            TransitionType::Typed | TransitionType::Generated
        );
        if typed && details.from_address_bar() && !placed {
            // the user asked for this address themselves; whatever opened
            // the tab is no longer its parent
            if let Some(window_node_id) = window_id.map(ids::window) {
                if self.tree.contains(&window_node_id)
                    && self.tree.tree().parent_id(&node_id) != Some(window_node_id.as_str())
                {
                    if let Err(e) = self.tree.move_deep(&node_id, &window_node_id) {
                        tracing::warn!(page = %node_id, error = %e, "Address-bar re-parent failed");
                    }
                }
            }
            self.tree.update_page(&node_id, |page| page.placed = true)?;
            tracing::debug!(page = %node_id, "Address-bar navigation finalized placement");
        }
        Ok(())
    }

    /// Terminal placement signal: any address-bar event that should have
    /// fired has fired by now.
    pub(crate) fn on_nav_completed(&mut self, tab_id: u32, frame_id: u32) -> Result<()> {
        if frame_id != 0 {
            return Ok(());
        }
        let node_id = self
            .tree
            .find_page(|page| page.tab_id == Some(tab_id))
            .map(|page| page.id.clone());
        let Some(node_id) = node_id else {
            return Ok(());
        };
        let fresh = self.host.tab_info(tab_id);
        let focused = self.focused_page_id.as_deref() == Some(node_id.as_str());
        self.tree.update_page(&node_id, |page| {
            if let Some(info) = fresh {
                if !info.url.is_empty() {
                    let _ = page.navigate(info.url);
                }
                if !info.title.is_empty() {
                    page.set_title(info.title);
                }
                if info.favicon.is_some() {
                    page.set_favicon(info.favicon);
                }
            }
            let was_settled = page.status.is_settled();
            let _ = page.transition_to(PageStatus::Complete);
            if !was_settled && !focused {
                page.unread = true;
            }
            page.placed = true;
        })?;
        Ok(())
    }

    pub(crate) fn on_page_reported(&mut self, report: PageReport) -> Result<()> {
        let found = self
            .tree
            .find_page(|page| page.tab_id == Some(report.tab_id))
            .map(|page| (page.id.clone(), page.placed));
        let Some((node_id, placed)) = found else {
            tracing::debug!(tab_id = report.tab_id, "Report from an unknown tab");
            return Ok(());
        };
        self.tree.update_page(&node_id, |page| {
            page.referrer = Some(report.referrer.clone());
            page.history_length = Some(report.history_length);
            if !report.title.is_empty() {
                page.set_title(report.title.clone());
            }
        })?;
        match report.action {
            PageAction::Store => {}
            PageAction::FindParent => {
                if !placed {
                    self.reparent_by_referrer(&node_id, &report.referrer)?;
                }
            }
            PageAction::Associate => self.associate_restored(&node_id, &report)?,
        }
        Ok(())
    }

    /// window.open()-style children carry no opener id; the page that
    /// referred them is the best remaining guess. First pre-order match
    /// wins; two open pages sharing a URL are not disambiguated further.
    fn reparent_by_referrer(&mut self, node_id: &str, referrer: &str) -> Result<()> {
        if referrer.is_empty() {
            return Ok(());
        }
        let parent = self
            .tree
            .find_page(|page| page.url == referrer && page.id != node_id)
            .map(|page| page.id.clone());
        let Some(parent_id) = parent else {
            return Ok(());
        };
        if self.tree.tree().parent_id(node_id) == Some(parent_id.as_str()) {
            return Ok(());
        }
        match self.tree.move_deep(node_id, &parent_id) {
            Ok(()) => {
                tracing::debug!(page = %node_id, parent = %parent_id, "Re-parented by referrer")
            }
            Err(e) => tracing::warn!(page = %node_id, error = %e, "Referrer re-parent failed"),
        }
        Ok(())
    }

    /// A restored tab announces itself; if a restorable node matches its
    /// url, referrer and history length, that node takes the live
    /// binding and the fresh guess node is dropped.
    fn associate_restored(&mut self, live_node_id: &str, report: &PageReport) -> Result<()> {
        let live = self.tree.page(live_node_id)?;
        let Some(tab_id) = live.tab_id else {
            return Ok(());
        };
        let Some(window_id) = live.window_id else {
            return Ok(());
        };
        let url = live.url.clone();
        let index = live.index;
        let status = live.status;

        let candidate = self
            .tree
            .find_page(|page| {
                page.restorable
                    && page.url == url
                    && page.referrer.as_deref() == Some(report.referrer.as_str())
                    && page.history_length == Some(report.history_length)
            })
            .map(|page| page.id.clone());
        let Some(restored_id) = candidate else {
            return Ok(());
        };

        self.tree.remove(live_node_id, false);
        let new_id = self.tree.update_page(&restored_id, |page| {
            page.awaken(tab_id, window_id);
            page.index = index;
            page.status = status;
            if !report.title.is_empty() {
                page.set_title(report.title.clone());
            }
        })?;

        // first association out of a restored window rebinds the whole
        // branch to the live window
        let rebind = self
            .containing_window(&new_id)
            .filter(|window| window.hibernated)
            .map(|window| window.id.clone());
        if let Some(old_window_id) = rebind {
            self.bind_awakened_window(&old_window_id, window_id)?;
        }
        tracing::info!(page = %new_id, tab_id, "Restored page associated with live tab");
        Ok(())
    }
}
