//! Test doubles shared by the engine scenario tests

use parking_lot::Mutex;

use canopy_model::{PageStatus, WindowKind};

use crate::events::{TabInfo, WindowInfo};
use crate::host::{BrowserHost, CreateTabOptions, HostResult};

/// A minimal live tab for scenario scripts; tests adjust fields as
/// needed.
pub(crate) fn tab(id: u32, window_id: u32, url: &str) -> TabInfo {
    TabInfo {
        id,
        window_id,
        url: url.to_string(),
        title: String::new(),
        favicon: None,
        status: PageStatus::Loading,
        index: 0,
        pinned: false,
        opener_tab_id: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCommand {
    CreateTab(CreateTabOptions),
    RemoveTab(u32),
    MoveTab {
        tab_id: u32,
        window_id: u32,
        to_index: u32,
    },
    ActivateTab(u32),
    CreateWindow(Option<String>),
    RemoveWindow(u32),
}

/// Records every command and answers queries from scripted state.
#[derive(Default)]
pub(crate) struct ScriptedHost {
    commands: Mutex<Vec<HostCommand>>,
    windows: Mutex<Vec<WindowInfo>>,
    tabs: Mutex<Vec<TabInfo>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_window(&self, id: u32, kind: WindowKind) {
        self.windows.lock().push(WindowInfo {
            id,
            kind,
            incognito: false,
            focused: false,
        });
    }

    pub fn remove_window_entry(&self, id: u32) {
        self.windows.lock().retain(|window| window.id != id);
        self.tabs.lock().retain(|tab| tab.window_id != id);
    }

    pub fn add_tab(&self, tab: TabInfo) {
        self.tabs.lock().push(tab);
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().clone()
    }
}

impl BrowserHost for ScriptedHost {
    fn create_tab(&self, opts: CreateTabOptions) -> HostResult<()> {
        self.commands.lock().push(HostCommand::CreateTab(opts));
        Ok(())
    }

    fn remove_tab(&self, tab_id: u32) -> HostResult<()> {
        self.commands.lock().push(HostCommand::RemoveTab(tab_id));
        Ok(())
    }

    fn move_tab(&self, tab_id: u32, window_id: u32, to_index: u32) -> HostResult<()> {
        self.commands.lock().push(HostCommand::MoveTab {
            tab_id,
            window_id,
            to_index,
        });
        Ok(())
    }

    fn activate_tab(&self, tab_id: u32) -> HostResult<()> {
        self.commands.lock().push(HostCommand::ActivateTab(tab_id));
        Ok(())
    }

    fn create_window(&self, first_url: Option<String>) -> HostResult<()> {
        self.commands
            .lock()
            .push(HostCommand::CreateWindow(first_url));
        Ok(())
    }

    fn remove_window(&self, window_id: u32) -> HostResult<()> {
        self.commands
            .lock()
            .push(HostCommand::RemoveWindow(window_id));
        Ok(())
    }

    fn tab_info(&self, tab_id: u32) -> Option<TabInfo> {
        self.tabs.lock().iter().find(|tab| tab.id == tab_id).cloned()
    }

    fn tabs_in_window(&self, window_id: u32) -> Vec<TabInfo> {
        self.tabs
            .lock()
            .iter()
            .filter(|tab| tab.window_id == window_id)
            .cloned()
            .collect()
    }

    fn windows(&self) -> Vec<WindowInfo> {
        self.windows.lock().clone()
    }
}
