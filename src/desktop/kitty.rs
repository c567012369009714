//! The terminal role, driven through kitty's remote control protocol.
//!
//! A managed terminal is a kitty OS window.  Its handle is the OS window's
//! `platform_window_id` (the id the window helper knows it by); kitty's own
//! window ids are looked up from `kitty @ ls` whenever a command needs them.

use super::process;
use super::DesktopError;
use log::debug;
use serde::Deserialize;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

/// Subset of one entry of `kitty @ ls`.
#[derive(Debug, Clone, Deserialize)]
pub struct OsWindowJson {
    #[serde(default)]
    pub platform_window_id: Option<u64>,
    #[serde(default)]
    pub tabs: Vec<TabJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TabJson {
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub windows: Vec<WindowJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowJson {
    pub id: u64,
    #[serde(default)]
    pub cwd: String,
    #[serde(default)]
    pub is_active: bool,
}

impl OsWindowJson {
    fn active_tab(&self) -> Option<&TabJson> {
        self.tabs.iter().find(|t| t.is_active).or_else(|| self.tabs.first())
    }

    fn active_window(&self) -> Option<&WindowJson> {
        let tab = self.active_tab()?;
        tab.windows
            .iter()
            .find(|w| w.is_active)
            .or_else(|| tab.windows.first())
    }

    fn window_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.tabs.iter().flat_map(|t| t.windows.iter().map(|w| w.id))
    }
}

pub fn parse_ls(json: &str) -> Result<Vec<OsWindowJson>, DesktopError> {
    serde_json::from_str(json).map_err(|e| DesktopError::Parse {
        program: "kitty @ ls".into(),
        detail: e.to_string(),
    })
}

/// The OS window that contains kitty window `window_id`.
pub fn platform_id_of(list: &[OsWindowJson], window_id: u64) -> Option<u64> {
    list.iter()
        .find(|os| os.window_ids().any(|id| id == window_id))
        .and_then(|os| os.platform_window_id)
}

/// The kitty window to focus inside OS window `platform_id`: the active
/// window of the active tab.
pub fn focus_target(list: &[OsWindowJson], platform_id: u64) -> Option<u64> {
    list.iter()
        .find(|os| os.platform_window_id == Some(platform_id))
        .and_then(OsWindowJson::active_window)
        .map(|w| w.id)
}

/// Every kitty window inside OS window `platform_id`.
pub fn windows_of(list: &[OsWindowJson], platform_id: u64) -> Vec<u64> {
    list.iter()
        .filter(|os| os.platform_window_id == Some(platform_id))
        .flat_map(|os| os.window_ids())
        .collect()
}

/// The OS window whose active window sits in `cwd`.
pub fn platform_id_for_cwd(list: &[OsWindowJson], cwd: &str) -> Option<u64> {
    let cwd = cwd.trim_end_matches('/');
    list.iter()
        .find(|os| {
            os.active_window()
                .is_some_and(|w| w.cwd.trim_end_matches('/') == cwd)
        })
        .and_then(|os| os.platform_window_id)
}

/// Remote-control client for one kitty instance.
#[derive(Debug, Clone)]
pub struct Kitty {
    bin: String,
    socket: String,
    timeout: Duration,
}

impl Kitty {
    pub fn new(bin: impl Into<String>, socket: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            socket: socket.into(),
            timeout,
        }
    }

    fn remote(&self, args: &[&str]) -> Result<String, DesktopError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("@").arg("--to").arg(&self.socket).args(args);
        process::run(&mut cmd, self.timeout)
    }

    pub fn ls(&self) -> Result<Vec<OsWindowJson>, DesktopError> {
        parse_ls(&self.remote(&["ls"])?)
    }

    /// Open a new OS window in `cwd` and return its platform window id.
    ///
    /// The platform id shows up in `ls` only once the window is mapped, so
    /// this polls for up to `settle`.
    pub fn launch(&self, cwd: &str, settle: Duration) -> Result<u64, DesktopError> {
        let cwd_arg = format!("--cwd={}", cwd);
        let out = self.remote(&["launch", "--type=os-window", &cwd_arg])?;
        let window_id: u64 = out.trim().parse().map_err(|_| DesktopError::Parse {
            program: "kitty @ launch".into(),
            detail: format!("expected a window id, got {:?}", out),
        })?;
        debug!("kitty launched window {} in {}", window_id, cwd);

        let deadline = Instant::now() + settle;
        loop {
            if let Some(pid) = platform_id_of(&self.ls()?, window_id) {
                return Ok(pid);
            }
            if Instant::now() >= deadline {
                return Err(DesktopError::Parse {
                    program: "kitty @ ls".into(),
                    detail: format!("window {} has no platform window id", window_id),
                });
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    /// Focus the active window of OS window `platform_id`.  `Ok(false)`
    /// if no such OS window exists.
    pub fn focus(&self, platform_id: u64) -> Result<bool, DesktopError> {
        let Some(id) = focus_target(&self.ls()?, platform_id) else {
            return Ok(false);
        };
        self.remote(&["focus-window", "--match", &format!("id:{}", id)])?;
        Ok(true)
    }

    /// Close every window of OS window `platform_id`.
    pub fn close(&self, platform_id: u64) -> Result<(), DesktopError> {
        for id in windows_of(&self.ls()?, platform_id) {
            self.remote(&["close-window", "--match", &format!("id:{}", id)])?;
        }
        Ok(())
    }

    pub fn find_by_cwd(&self, cwd: &str) -> Result<Option<u64>, DesktopError> {
        Ok(platform_id_for_cwd(&self.ls()?, cwd))
    }
}
