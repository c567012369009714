//! Concrete desktop backends.
//!
//! [`DesktopController`] is the production
//! [`WindowController`](crate::traits::WindowController):
//!
//! * the terminal is a kitty OS window driven over kitty remote control,
//!   addressed by its platform window id;
//! * the editor is started through its CLI and addressed by its window
//!   title, which shows the home-shortened workspace path;
//! * the git GUI is started from a configurable command template and
//!   addressed as `gitgui:<path>`;
//! * moving, focusing and closing non-terminal windows, and the frontmost
//!   probe, go through the window helper.
//!
//! Displays are enumerated with `xrandr` ([`XrandrDisplays`]) and watched
//! for changes by [`DisplayWatcher`].
//!
//! Nothing outside this module should reference these tools directly.

pub mod display;
pub mod helper;
pub mod kitty;
pub mod process;

pub use display::{DisplayWatcher, XrandrDisplays};

use crate::command::Role;
use crate::layout::PixelRect;
use crate::path::{PathRule, PathTransform};
use crate::traits::{PlacementOptions, WindowController};
use crate::workspace::Handle;
use helper::{classify_title, HelperClient, HelperRequest, TitleMarkers};
use kitty::Kitty;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::process::Command;
use std::thread;
use std::time::Duration;

const GIT_GUI_PREFIX: &str = "gitgui:";

/// Errors from the desktop tools.
#[derive(Debug, thiserror::Error)]
pub enum DesktopError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from {program}: {detail}")]
    Parse { program: String, detail: String },
    #[error("window helper: {0}")]
    Helper(String),
    #[error("no {role} window {handle}")]
    StaleHandle { role: Role, handle: String },
    #[error("invalid git gui command {0:?}")]
    Template(String),
}

/// Backend settings.  All durations are in **milliseconds**.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopConfig {
    pub kitty_bin: String,
    /// Remote-control address of the managed kitty instance.
    pub kitty_socket: String,
    pub editor_bin: String,
    /// Git GUI launch command; `{path}` is replaced by the (rewritten)
    /// workspace path.  Split on whitespace before substitution, so paths
    /// with spaces stay one argument.
    pub git_gui_command: String,
    pub helper_url: String,
    /// Upper bound for every tool invocation and helper request.
    pub timeout_ms: u64,
    /// How long a freshly launched window gets to appear.
    pub launch_settle_ms: u64,
    pub xrandr_bin: String,
    pub title_markers: TitleMarkers,
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            kitty_bin: "kitty".into(),
            kitty_socket: "unix:/tmp/kitty_main".into(),
            editor_bin: "code".into(),
            git_gui_command: "gitkraken -p {path}".into(),
            helper_url: "http://127.0.0.1:57320".into(),
            timeout_ms: 3000,
            launch_settle_ms: 1000,
            xrandr_bin: "xrandr".into(),
            title_markers: TitleMarkers::default(),
        }
    }
}

impl DesktopConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }
}

/// Build the git GUI argv from `template`.
pub fn git_gui_argv(template: &str, path: &str) -> Result<Vec<String>, DesktopError> {
    let argv: Vec<String> = template
        .split_whitespace()
        .map(|arg| arg.replace("{path}", path))
        .collect();
    if argv.is_empty() || !template.contains("{path}") {
        return Err(DesktopError::Template(template.to_string()));
    }
    Ok(argv)
}

/// The production [`WindowController`].
pub struct DesktopController {
    config: DesktopConfig,
    kitty: Kitty,
    helper: HelperClient,
    titles: PathTransform,
}

impl DesktopController {
    pub fn new(config: DesktopConfig) -> Self {
        let kitty = Kitty::new(&config.kitty_bin, &config.kitty_socket, config.timeout());
        let helper = HelperClient::new(&config.helper_url, config.timeout());
        Self {
            kitty,
            helper,
            titles: PathTransform::with_user_home(vec![PathRule::ShortenHome]),
            config,
        }
    }

    /// Window title the editor shows for `path`.
    fn editor_title(&self, path: &str) -> String {
        self.titles.apply(path)
    }

    fn git_gui_handle(path: &str) -> Option<Handle> {
        Handle::new(format!("{}{}", GIT_GUI_PREFIX, path))
    }

    fn terminal_id(role: Role, handle: &Handle) -> Result<u64, DesktopError> {
        handle.as_str().parse().map_err(|_| DesktopError::StaleHandle {
            role,
            handle: handle.to_string(),
        })
    }

    fn stale(role: Role, handle: &Handle) -> DesktopError {
        DesktopError::StaleHandle {
            role,
            handle: handle.to_string(),
        }
    }
}

impl WindowController for DesktopController {
    type Error = DesktopError;

    fn resolve_handle(&self, role: Role, path: &str) -> Result<Option<Handle>, DesktopError> {
        match role {
            Role::Terminal => Ok(self
                .kitty
                .find_by_cwd(path)?
                .and_then(|id| Handle::new(id.to_string()))),
            Role::Editor => {
                let title = self.editor_title(path);
                Ok(if self.helper.find(role, &title)? {
                    Handle::new(title)
                } else {
                    None
                })
            }
            Role::GitGui => {
                let Some(handle) = Self::git_gui_handle(path) else {
                    return Ok(None);
                };
                Ok(self.helper.find(role, handle.as_str())?.then_some(handle))
            }
        }
    }

    fn focus(&self, role: Role, handle: &Handle) -> Result<(), DesktopError> {
        match role {
            Role::Terminal => {
                if self.kitty.focus(Self::terminal_id(role, handle)?)? {
                    Ok(())
                } else {
                    Err(Self::stale(role, handle))
                }
            }
            Role::Editor | Role::GitGui => {
                if !self.helper.find(role, handle.as_str())? {
                    return Err(Self::stale(role, handle));
                }
                self.helper
                    .send(&HelperRequest::Focus {
                        role,
                        window: handle.as_str(),
                    })
                    .map(|_| ())
            }
        }
    }

    fn reposition(
        &self,
        role: Role,
        handle: &Handle,
        rect: PixelRect,
        opts: PlacementOptions,
    ) -> Result<(), DesktopError> {
        debug!("place {} {} at {:?}", role, handle, rect);
        self.helper
            .send(&HelperRequest::set_position(
                role,
                handle.as_str(),
                rect,
                opts.frontmost_only,
            ))
            .map(|_| ())
    }

    fn launch(&self, role: Role, path: &str) -> Result<Handle, DesktopError> {
        info!("launch {} at {}", role, path);
        let handle = match role {
            Role::Terminal => {
                let id = self.kitty.launch(path, self.config.launch_settle())?;
                Handle::new(id.to_string())
            }
            Role::Editor => {
                process::run(
                    Command::new(&self.config.editor_bin).arg(path),
                    self.config.timeout(),
                )?;
                thread::sleep(self.config.launch_settle());
                Handle::new(self.editor_title(path))
            }
            Role::GitGui => {
                let argv = git_gui_argv(&self.config.git_gui_command, path)?;
                process::spawn_detached(Command::new(&argv[0]).args(&argv[1..]))?;
                thread::sleep(self.config.launch_settle());
                Self::git_gui_handle(path)
            }
        };
        handle.ok_or_else(|| DesktopError::Parse {
            program: role.to_string(),
            detail: format!("no window handle for {}", path),
        })
    }

    fn close(&self, role: Role, handle: &Handle) -> Result<(), DesktopError> {
        match role {
            Role::Terminal => self.kitty.close(Self::terminal_id(role, handle)?),
            Role::Editor | Role::GitGui => self
                .helper
                .send(&HelperRequest::Close {
                    role,
                    window: handle.as_str(),
                })
                .map(|_| ()),
        }
    }

    fn probe_frontmost_role(&self) -> Result<Option<Role>, DesktopError> {
        let title = self.helper.frontmost_title()?;
        Ok(title.and_then(|t| classify_title(&t, &self.config.title_markers)))
    }
}
