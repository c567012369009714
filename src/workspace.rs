//! The per-directory workspace record.
//!
//! A [`Workspace`] binds a filesystem path to the terminal, editor and
//! (optional) git-GUI windows opened for it.  Window [`Handle`]s are
//! advisory: the processes behind them belong to the user and may go away
//! at any time, so an empty or stale handle simply means "re-resolve on
//! next access".

use crate::command::Role;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque platform window identifier for one managed window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Handle(String);

impl Handle {
    /// Wrap a raw identifier.  Returns `None` for an empty (or blank) id.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runtime identity of a workspace.
///
/// Not persisted.  Outcomes of queued window jobs are matched back to
/// their workspace by id, so a workspace that was closed (or moved) in the
/// meantime is never updated by mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WorkspaceId(pub u64);

/// One managed directory and its window bindings.
///
/// Serialized with the camelCase field names used in the persisted
/// `workspaces` array.  Missing fields fall back to their defaults so
/// partial records (e.g. `{"path": "..."}`) load fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Workspace {
    #[serde(skip)]
    pub id: WorkspaceId,
    pub path: String,
    pub focused_app: Role,
    #[serde(rename = "terminalFullScreen")]
    pub terminal_fullscreen: bool,
    #[serde(rename = "editorFullScreen")]
    pub editor_fullscreen: bool,
    #[serde(with = "opt_handle")]
    pub terminal_window_handle: Option<Handle>,
    #[serde(with = "opt_handle")]
    pub editor_window_handle: Option<Handle>,
    #[serde(with = "opt_handle")]
    pub gitgui_window_handle: Option<Handle>,
    pub gitgui_initialized: bool,
    pub gitgui_visible: bool,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            id: WorkspaceId::default(),
            path: String::new(),
            focused_app: Role::Terminal,
            terminal_fullscreen: false,
            editor_fullscreen: false,
            terminal_window_handle: None,
            editor_window_handle: None,
            gitgui_window_handle: None,
            gitgui_initialized: false,
            gitgui_visible: false,
        }
    }
}

impl Workspace {
    /// A fresh workspace for `path`: terminal focused, nothing fullscreen,
    /// no handles.
    pub fn new(id: WorkspaceId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn handle(&self, role: Role) -> Option<&Handle> {
        match role {
            Role::Terminal => self.terminal_window_handle.as_ref(),
            Role::Editor => self.editor_window_handle.as_ref(),
            Role::GitGui => self.gitgui_window_handle.as_ref(),
        }
    }

    pub fn set_handle(&mut self, role: Role, handle: Option<Handle>) {
        match role {
            Role::Terminal => self.terminal_window_handle = handle,
            Role::Editor => self.editor_window_handle = handle,
            Role::GitGui => self.gitgui_window_handle = handle,
        }
    }

    /// Fullscreen flag of `role`.  The git GUI has no fullscreen state and
    /// always reports `false`.
    pub fn fullscreen(&self, role: Role) -> bool {
        match role {
            Role::Terminal => self.terminal_fullscreen,
            Role::Editor => self.editor_fullscreen,
            Role::GitGui => false,
        }
    }

    /// Set the fullscreen flag of `role`.  Returns `false` (and does
    /// nothing) for roles without a fullscreen state.
    pub fn set_fullscreen(&mut self, role: Role, fullscreen: bool) -> bool {
        match role {
            Role::Terminal => self.terminal_fullscreen = fullscreen,
            Role::Editor => self.editor_fullscreen = fullscreen,
            Role::GitGui => return false,
        }
        true
    }

    /// Whether the 1px divider between the panes should be shown.
    ///
    /// Only the focused role's fullscreen flag is consulted; the git GUI
    /// covers both panes, so it hides the divider too.
    pub fn divider_visible(&self) -> bool {
        match self.focused_app {
            Role::GitGui => false,
            role => !self.fullscreen(role),
        }
    }
}

/// Serde glue: `Option<Handle>` as a plain string, `""` meaning `None`.
mod opt_handle {
    use super::*;

    pub fn serialize<S: Serializer>(h: &Option<Handle>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(h.as_ref().map(Handle::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Handle>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(d)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => Handle::new(s),
            // Older records stored numeric window ids.
            Some(serde_json::Value::Number(n)) => Handle::new(n.to_string()),
            _ => None,
        })
    }
}
