//! Notifications for the desktop-shell UI.
//!
//! The [`TabManager`](crate::tabs::TabManager) sends [`UiEvent`]s over an
//! optional channel.  Whatever draws the top bar consumes them; inside this
//! crate the only consumer is the bridge thread that folds them into a
//! [`UiSnapshot`] served on `GET /state`.

use crate::command::Theme;
use crate::layout::{DisplayProfile, PixelRect};
use crate::workspace::Workspace;
use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::{mpsc, Arc};

/// One-way state-change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The workspace list changed (create, close, duplicate, handle updates).
    WorkspacesChanged {
        workspaces: Vec<Workspace>,
        active_index: usize,
    },
    /// Another workspace became active.
    ActiveIndexChanged { active_index: usize, theme: Theme },
    ThemeChanged(Theme),
    /// Show or hide the 1px separator between the panes.
    DividerVisibility(bool),
    /// A display layout was applied; the bar and divider should move.
    LayoutApplied {
        profile: DisplayProfile,
        top_bar: PixelRect,
        divider: Option<PixelRect>,
    },
}

/// Button label for a workspace: the last path component.
fn label_for(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// A tab button as the UI draws it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabEntry {
    pub label: String,
    pub path: String,
}

/// The UI state reconstructed from the event stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSnapshot {
    pub tabs: Vec<TabEntry>,
    pub active_index: usize,
    pub theme: Theme,
    pub divider_visible: bool,
    pub profile: DisplayProfile,
    pub top_bar: Option<PixelRect>,
    pub divider: Option<PixelRect>,
}

impl UiSnapshot {
    pub fn apply(&mut self, event: &UiEvent) {
        match event {
            UiEvent::WorkspacesChanged {
                workspaces,
                active_index,
            } => {
                self.tabs = workspaces
                    .iter()
                    .map(|ws| TabEntry {
                        label: label_for(&ws.path),
                        path: ws.path.clone(),
                    })
                    .collect();
                self.active_index = *active_index;
            }
            UiEvent::ActiveIndexChanged {
                active_index,
                theme,
            } => {
                self.active_index = *active_index;
                self.theme = *theme;
            }
            UiEvent::ThemeChanged(theme) => self.theme = *theme,
            UiEvent::DividerVisibility(visible) => self.divider_visible = *visible,
            UiEvent::LayoutApplied {
                profile,
                top_bar,
                divider,
            } => {
                self.profile = *profile;
                self.top_bar = Some(*top_bar);
                self.divider = *divider;
            }
        }
    }
}

/// Snapshot shared between the UI bridge and the HTTP listener.
pub type SharedSnapshot = Arc<RwLock<UiSnapshot>>;

/// Fold every event from `rx` into `snapshot` until the sender goes away.
///
/// Blocks; run it on its own thread.
pub fn run_bridge(rx: mpsc::Receiver<UiEvent>, snapshot: SharedSnapshot) {
    for event in rx {
        debug!("ui event: {:?}", event);
        snapshot.write().apply(&event);
    }
    debug!("ui bridge closed");
}
