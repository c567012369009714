//! Client for the window helper.
//!
//! The helper is a small local HTTP service with access to the platform's
//! window APIs.  Every request is a JSON object POSTed to its root with a
//! `"command"` tag; answers are JSON (or empty).

use super::DesktopError;
use crate::command::Role;
use crate::layout::PixelRect;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One request to the helper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum HelperRequest<'a> {
    SetPosition {
        role: Role,
        window: &'a str,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        #[serde(rename = "frontmostOnly")]
        frontmost_only: bool,
    },
    Focus {
        role: Role,
        window: &'a str,
    },
    Close {
        role: Role,
        window: &'a str,
    },
    /// Ask whether a window exists.  Answers `{"found": bool}`.
    Find {
        role: Role,
        window: &'a str,
    },
    /// Ask for the title of the window with input focus.  Answers
    /// `{"title": "..."}`.
    Frontmost,
}

impl<'a> HelperRequest<'a> {
    pub fn set_position(role: Role, window: &'a str, rect: PixelRect, frontmost_only: bool) -> Self {
        HelperRequest::SetPosition {
            role,
            window,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            frontmost_only,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FindReply {
    #[serde(default)]
    found: bool,
}

#[derive(Debug, Deserialize)]
struct FrontmostReply {
    #[serde(default)]
    title: Option<String>,
}

/// Substrings that identify which managed role a window title belongs to.
/// Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleMarkers {
    pub terminal: Vec<String>,
    pub editor: Vec<String>,
    pub gitgui: Vec<String>,
}

impl Default for TitleMarkers {
    fn default() -> Self {
        Self {
            terminal: vec!["kitty".into()],
            editor: vec!["Visual Studio Code".into()],
            gitgui: vec!["GitKraken".into(), "lazygit".into()],
        }
    }
}

/// Map a window title to a managed role.
///
/// Git-GUI markers are checked first since a terminal git client carries
/// the terminal's name in its title as well.
pub fn classify_title(title: &str, markers: &TitleMarkers) -> Option<Role> {
    let title = title.to_lowercase();
    let hit = |list: &[String]| list.iter().any(|m| !m.is_empty() && title.contains(&m.to_lowercase()));
    if hit(&markers.gitgui) {
        Some(Role::GitGui)
    } else if hit(&markers.editor) {
        Some(Role::Editor)
    } else if hit(&markers.terminal) {
        Some(Role::Terminal)
    } else {
        None
    }
}

/// Blocking JSON client for the helper.
#[derive(Clone)]
pub struct HelperClient {
    agent: ureq::Agent,
    url: String,
}

impl HelperClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.into(),
        }
    }

    /// Send `req` and return the raw reply body.
    pub fn send(&self, req: &HelperRequest<'_>) -> Result<String, DesktopError> {
        let body = serde_json::to_string(req).map_err(|e| DesktopError::Helper(e.to_string()))?;
        debug!("helper <- {}", body);
        let response = self
            .agent
            .post(&self.url)
            .header("Content-Type", "application/json")
            .send(body.as_bytes())
            .map_err(|e| DesktopError::Helper(e.to_string()))?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| DesktopError::Helper(e.to_string()))
    }

    pub fn find(&self, role: Role, window: &str) -> Result<bool, DesktopError> {
        let reply = self.send(&HelperRequest::Find { role, window })?;
        let reply: FindReply =
            serde_json::from_str(&reply).map_err(|e| DesktopError::Helper(format!("find reply: {}", e)))?;
        Ok(reply.found)
    }

    pub fn frontmost_title(&self) -> Result<Option<String>, DesktopError> {
        let reply = self.send(&HelperRequest::Frontmost)?;
        if reply.trim().is_empty() {
            return Ok(None);
        }
        let reply: FrontmostReply = serde_json::from_str(&reply)
            .map_err(|e| DesktopError::Helper(format!("frontmost reply: {}", e)))?;
        Ok(reply.title.filter(|t| !t.is_empty()))
    }
}
