//! Commands and shared vocabulary types.
//!
//! This module defines the vocabulary that all components share:
//! [`Command`] describes every action the tab manager can perform, and
//! [`Direction`] / [`Role`] / [`Theme`] / [`MonitorInfo`] provide the
//! supporting data types.
//!
//! The hotkey daemon posts bare command strings (e.g. `"right"`,
//! `"toggleFullScreen"`); anything that is not a known command name is
//! treated as the path of a new workspace.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction for tab navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// A kind of managed external window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Terminal,
    Editor,
    #[serde(rename = "gitgui")]
    GitGui,
}

impl Role {
    /// Roles that are part of the fixed two-pane layout.
    pub const PANES: [Role; 2] = [Role::Terminal, Role::Editor];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Terminal => write!(f, "terminal"),
            Role::Editor => write!(f, "editor"),
            Role::GitGui => write!(f, "gitgui"),
        }
    }
}

/// UI colour theme, persisted alongside the workspaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
        }
    }
}

/// Every action the tab manager can perform.
///
/// Commands are produced by [`CommandSource`](crate::traits::CommandSource)
/// implementations and consumed by the [`TabManager`](crate::tabs::TabManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Move to the previous / next workspace, wrapping at both ends.
    Go(Direction),

    /// Close the active workspace and its windows.
    Close,

    /// Append a fresh workspace for the active workspace's path.
    Duplicate,

    /// Flip the fullscreen flag of the focused role.
    ToggleFullscreen,

    /// Force the focused role into fullscreen.
    ToFullscreen,

    /// Force the focused role out of fullscreen.
    ToCompactScreen,

    /// Bring up the git GUI for the active workspace, launching it if needed.
    ToggleGitGui,

    /// Record which role has logical focus in the active workspace.
    Focus(Role),

    /// No managed window has focus; hide the divider.
    Defocus,

    /// Re-resolve the display profile and re-place every managed window.
    ApplyDisplayLayout,

    /// Switch the UI theme.
    SetTheme(Theme),

    /// Open a new workspace rooted at the given path.
    CreateWorkspace(String),
}

/// Error from parsing a control-surface payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The payload was empty or whitespace only.
    #[error("empty command payload")]
    Empty,
    /// Neither a known command name nor something that looks like a path.
    #[error("unknown command {0:?}")]
    NotAPath(String),
}

/// Whether `payload` can name a directory: absolute, `~`-relative or a
/// drive-letter path (`C:\x`, `d:/x`).
fn looks_like_path(payload: &str) -> bool {
    if payload.starts_with('/') || payload == "~" || payload.starts_with("~/") {
        return true;
    }
    let mut chars = payload.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(d), Some(':'), Some('\\' | '/')) if d.is_ascii_alphabetic()
    )
}

impl Command {
    /// Parse a raw control-surface payload.
    ///
    /// Command names are matched exactly (after trimming surrounding
    /// whitespace).  Any other payload that looks like a path becomes
    /// [`Command::CreateWorkspace`]; the rest is rejected.
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        let payload = payload.trim();
        let cmd = match payload {
            "" => return Err(CommandError::Empty),
            "left" => Command::Go(Direction::Left),
            "right" => Command::Go(Direction::Right),
            "close" => Command::Close,
            "duplicate" => Command::Duplicate,
            "toggleFullScreen" => Command::ToggleFullscreen,
            "toFullscreen" => Command::ToFullscreen,
            "toCompactScreen" => Command::ToCompactScreen,
            "toggleGitKraken" | "toggleGitGui" | "toggleLazygit" => Command::ToggleGitGui,
            "setKittyMainFocused" | "setTerminalFocused" => Command::Focus(Role::Terminal),
            "setVscodeFocused" | "setEditorFocused" => Command::Focus(Role::Editor),
            "setKittyLazygitFocused" | "setGitGuiFocused" => Command::Focus(Role::GitGui),
            "setDefocused" => Command::Defocus,
            "winPos" | "resetWindows" | "reposition" => Command::ApplyDisplayLayout,
            "activateDarkMode" => Command::SetTheme(Theme::Dark),
            "activateLightMode" => Command::SetTheme(Theme::Light),
            path if looks_like_path(path) => Command::CreateWorkspace(path.to_string()),
            other => return Err(CommandError::NotAPath(other.to_string())),
        };
        Ok(cmd)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

/// Static information about a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    /// Output name (e.g. `"eDP-1"`).
    pub name: String,
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// X position on the virtual desktop (pixels).
    pub x: i32,
    /// Y position on the virtual desktop (pixels).
    pub y: i32,
    /// Whether this is the primary display.
    #[serde(default)]
    pub primary: bool,
}
