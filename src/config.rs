//! Application configuration.
//!
//! The configuration is loaded from `$XDG_CONFIG_HOME/deskswitch/config.json`.
//! Every section is optional, so `{}` is a valid file and anything left out
//! falls back to the compiled-in defaults.  Unknown keys are ignored.
//!
//! # Example
//!
//! ```json
//! {
//!   "server": { "bind": "127.0.0.1:57321" },
//!   "placement": { "settle_ms": 150 },
//!   "display": {
//!     "external_signatures": [{ "width": 2048, "height": 1152 }]
//!   },
//!   "desktop": { "editor_bin": "codium" },
//!   "git_gui_path_rules": ["expand_home", "mount_to_drive"]
//! }
//! ```

use crate::desktop::DesktopConfig;
use crate::layout::{DisplaySignature, LayoutTable};
use crate::path::{PathRule, PathTransform};
use crate::tabs::TabSettings;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loopback control surface.
    pub server: ServerConfig,

    /// Window-job serialization.
    pub placement: PlacementConfig,

    /// Monitor classification and hotplug polling.
    pub display: DisplayConfig,

    /// Pane rectangles for both display profiles, as screen fractions.
    pub layout: LayoutTable,

    /// Terminal, editor, git GUI and window-helper settings.
    pub desktop: DesktopConfig,

    /// Rewrites applied to a workspace path before the git GUI sees it.
    pub git_gui_path_rules: Vec<PathRule>,

    /// Where workspaces are persisted.  Defaults to
    /// `<config dir>/deskswitch/state.json`.
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            placement: PlacementConfig::default(),
            display: DisplayConfig::default(),
            layout: LayoutTable::default(),
            desktop: DesktopConfig::default(),
            git_gui_path_rules: vec![PathRule::ExpandHome],
            state_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 57321)),
        }
    }
}

/// All durations are in **milliseconds**.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Pause after every window job before the next one starts.
    pub settle_ms: u64,
    /// How long a command waits for earlier jobs to report new handles.
    pub sync_timeout_ms: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            sync_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Primary-display sizes that count as an external dock.
    pub external_signatures: Vec<DisplaySignature>,
    /// How often the monitor set is checked for changes (ms).  `0`
    /// disables the watcher.
    pub poll_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            external_signatures: vec![
                DisplaySignature {
                    width: 2048,
                    height: 1152,
                },
                DisplaySignature {
                    width: 2560,
                    height: 1440,
                },
            ],
            poll_interval_ms: 2000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// The state file, falling back to `<config_dir>/state.json`.
    pub fn state_path(&self, config_dir: &Path) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| config_dir.join("state.json"))
    }

    pub fn tab_settings(&self) -> TabSettings {
        TabSettings {
            layout: self.layout.clone(),
            settle: Duration::from_millis(self.placement.settle_ms),
            sync_timeout: Duration::from_millis(self.placement.sync_timeout_ms),
            git_gui_paths: PathTransform::with_user_home(self.git_gui_path_rules.clone()),
        }
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
