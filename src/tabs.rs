//! The tab manager: the workspace state machine.
//!
//! [`TabManager`] owns the ordered workspace list and the active index and
//! reacts to [`Command`]s.  Every transition mutates state synchronously,
//! persists it, notifies the UI and then queues the window work (focus,
//! launch, reposition, close) on the [`PlacementQueue`].  Window jobs never
//! touch the workspace list directly: anything they learn (a new window
//! handle, a freshly launched git GUI) comes back as an [`Outcome`] and is
//! applied by [`TabManager::sync`] before the next command is handled.

use crate::command::{Command, Direction, Role, Theme};
use crate::layout::{top_bar_bounds, DisplayResolver, DisplayState, LayoutTable, Pane, PixelRect};
use crate::path::{PathRule, PathTransform};
use crate::placement::{PlacementQueue, Ticket};
use crate::store::{StoreError, WorkspaceStore};
use crate::traits::{DisplaySource, KeyValueStore, PlacementOptions, WindowController};
use crate::ui::UiEvent;
use crate::workspace::{Handle, Workspace, WorkspaceId};
use log::{debug, error, info, warn};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Precondition violations.  Window failures never show up here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TabError {
    #[error("no workspaces are open")]
    NoWorkspaces,
    #[error("workspace path is empty")]
    EmptyPath,
    #[error("{0} has no fullscreen state")]
    NoFullscreenFor(Role),
}

/// What a window job reports back to the tab manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `role` of `workspace` now lives behind `handle`.
    Rebind {
        workspace: WorkspaceId,
        role: Role,
        handle: Handle,
    },
    /// The window behind `role`'s handle is gone.
    Unbind { workspace: WorkspaceId, role: Role },
    /// The git GUI of `workspace` was brought up, launching it if
    /// `launched` is set.
    GitGuiShown {
        workspace: WorkspaceId,
        launched: bool,
    },
}

/// Tunables for a [`TabManager`].
#[derive(Debug, Clone)]
pub struct TabSettings {
    pub layout: LayoutTable,
    /// Pause between two window jobs.
    pub settle: Duration,
    /// Upper bound on how long a command waits for earlier jobs to report.
    pub sync_timeout: Duration,
    /// Applied to the workspace path before launching the git GUI.
    pub git_gui_paths: PathTransform,
}

impl Default for TabSettings {
    fn default() -> Self {
        Self {
            layout: LayoutTable::default(),
            settle: Duration::from_millis(100),
            sync_timeout: Duration::from_millis(5000),
            git_gui_paths: PathTransform::with_user_home(vec![PathRule::ExpandHome]),
        }
    }
}

/// The workspace state machine.
///
/// Generic over the window controller, the display source and the
/// persistence backend, so tests can drive it with recording doubles.
pub struct TabManager<W: WindowController, D: DisplaySource, K: KeyValueStore> {
    workspaces: Vec<Workspace>,
    active_index: usize,
    theme: Theme,
    next_id: u64,
    store: WorkspaceStore<K>,
    queue: PlacementQueue<W>,
    display: DisplayResolver<D>,
    layout: LayoutTable,
    git_gui_paths: PathTransform,
    sync_timeout: Duration,
    pending: Vec<Ticket>,
    outcome_tx: mpsc::Sender<Outcome>,
    outcome_rx: mpsc::Receiver<Outcome>,
    ui_tx: Option<mpsc::Sender<UiEvent>>,
}

impl<W: WindowController, D: DisplaySource, K: KeyValueStore> TabManager<W, D, K> {
    /// Restore state from `store` and take ownership of `controller`.
    ///
    /// A store that cannot be read is logged and treated as empty.
    pub fn new(
        controller: W,
        display: DisplayResolver<D>,
        store: WorkspaceStore<K>,
        settings: TabSettings,
    ) -> Self {
        let state = match store.load() {
            Ok(state) => state,
            Err(e) => {
                error!("failed to load saved workspaces, starting empty: {}", e);
                Default::default()
            }
        };
        let workspaces: Vec<Workspace> = state
            .workspaces
            .into_iter()
            .zip(1..)
            .map(|(mut ws, id)| {
                ws.id = WorkspaceId(id);
                ws
            })
            .collect();
        info!(
            "restored {} workspace(s), active index {}",
            workspaces.len(),
            state.active_index
        );
        let (outcome_tx, outcome_rx) = mpsc::channel();
        Self {
            next_id: workspaces.len() as u64 + 1,
            workspaces,
            active_index: state.active_index,
            theme: state.theme,
            store,
            queue: PlacementQueue::new(controller, settings.settle),
            display,
            layout: settings.layout,
            git_gui_paths: settings.git_gui_paths,
            sync_timeout: settings.sync_timeout,
            pending: Vec::new(),
            outcome_tx,
            outcome_rx,
            ui_tx: None,
        }
    }

    /// Attach the UI notification channel.
    pub fn set_ui(&mut self, tx: mpsc::Sender<UiEvent>) {
        self.ui_tx = Some(tx);
    }

    /// Send the full state once so a freshly started UI can draw its tabs.
    pub fn announce(&self) {
        self.notify_workspaces();
        self.notify_active();
    }

    pub fn workspaces(&self) -> &[Workspace] {
        &self.workspaces
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active(&self) -> Option<&Workspace> {
        self.workspaces.get(self.active_index)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Process a single [`Command`].
    ///
    /// Outcomes of earlier window jobs are applied first, so a handle
    /// re-bound by command *n* is visible to command *n + 1*.
    pub fn handle(&mut self, cmd: Command) -> Result<(), TabError> {
        self.sync();
        match cmd {
            Command::Go(Direction::Right) => self.next_workspace(),
            Command::Go(Direction::Left) => self.prev_workspace(),
            Command::Close => self.close_active_workspace(),
            Command::Duplicate => self.duplicate_active_workspace(),
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::ToFullscreen => self.to_fullscreen(),
            Command::ToCompactScreen => self.to_compact_screen(),
            Command::ToggleGitGui => self.toggle_git_gui(),
            Command::Focus(role) => self.set_focused_app(role),
            Command::Defocus => {
                self.notify(UiEvent::DividerVisibility(false));
                Ok(())
            }
            Command::ApplyDisplayLayout => {
                self.apply_display_layout();
                Ok(())
            }
            Command::SetTheme(theme) => {
                self.set_theme(theme);
                Ok(())
            }
            Command::CreateWorkspace(path) => self.create_workspace(&path),
        }
    }

    //  Transitions

    pub fn create_workspace(&mut self, path: &str) -> Result<(), TabError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(TabError::EmptyPath);
        }
        info!("create workspace {}", path);
        let ws = Workspace::new(self.allocate_id(), path);
        self.workspaces.push(ws.clone());
        self.active_index = self.workspaces.len() - 1;
        self.persist_workspaces();
        self.persist_active_index();
        self.notify_workspaces();
        self.notify_active();
        self.notify(UiEvent::DividerVisibility(ws.divider_visible()));

        let display = self.display.resolve();
        for role in pane_order(ws.focused_app) {
            let rect = self.pixel_rect(&display, role, false);
            self.enqueue_launch(&ws, role, rect);
        }
        Ok(())
    }

    pub fn next_workspace(&mut self) -> Result<(), TabError> {
        self.step(1)
    }

    pub fn prev_workspace(&mut self) -> Result<(), TabError> {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> Result<(), TabError> {
        let len = self.workspaces.len();
        if len == 0 {
            return Err(TabError::NoWorkspaces);
        }
        if let Some(outgoing) = self.workspaces.get_mut(self.active_index) {
            outgoing.gitgui_initialized = false;
            outgoing.gitgui_visible = false;
        }
        self.active_index = (self.active_index as isize + delta).rem_euclid(len as isize) as usize;
        info!("active workspace {} of {}", self.active_index, len);
        self.persist_workspaces();
        self.persist_active_index();
        self.notify_active();
        self.refocus_active();
        Ok(())
    }

    pub fn close_active_workspace(&mut self) -> Result<(), TabError> {
        if self.workspaces.is_empty() {
            return Err(TabError::NoWorkspaces);
        }
        let index = self.active_index.min(self.workspaces.len() - 1);
        let closed = self.workspaces.remove(index);
        info!("close workspace {}", closed.path);

        let mut roles = vec![Role::Terminal, Role::Editor];
        if closed.gitgui_initialized {
            roles.push(Role::GitGui);
        }
        for role in roles {
            self.enqueue_close(&closed, role);
        }

        if self.active_index >= self.workspaces.len() {
            self.active_index = self.workspaces.len().saturating_sub(1);
        }
        self.persist_workspaces();
        self.persist_active_index();
        self.notify_workspaces();
        self.notify_active();
        if !self.workspaces.is_empty() {
            self.refocus_active();
        }
        Ok(())
    }

    /// Append a fresh workspace for the active path.  The active index
    /// stays where it is.
    pub fn duplicate_active_workspace(&mut self) -> Result<(), TabError> {
        let path = self
            .active()
            .map(|ws| ws.path.clone())
            .ok_or(TabError::NoWorkspaces)?;
        info!("duplicate workspace {}", path);
        let ws = Workspace::new(self.allocate_id(), path);
        self.workspaces.push(ws);
        self.persist_workspaces();
        self.notify_workspaces();
        Ok(())
    }

    pub fn toggle_fullscreen(&mut self) -> Result<(), TabError> {
        let ws = self.active().ok_or(TabError::NoWorkspaces)?;
        let role = ws.focused_app;
        let target = !ws.fullscreen(role);
        self.set_active_fullscreen(role, target)
    }

    pub fn to_fullscreen(&mut self) -> Result<(), TabError> {
        let Some(ws) = self.active() else {
            debug!("toFullscreen without workspaces");
            return Ok(());
        };
        let role = ws.focused_app;
        self.set_active_fullscreen(role, true)
    }

    /// Force the focused pane out of fullscreen and re-place it.
    pub fn to_compact_screen(&mut self) -> Result<(), TabError> {
        let Some(ws) = self.active() else {
            debug!("toCompactScreen without workspaces");
            return Ok(());
        };
        let role = ws.focused_app;
        if Pane::for_role(role).is_none() {
            debug!("toCompactScreen while {} is focused", role);
            return Ok(());
        }
        self.set_active_fullscreen(role, false)
    }

    fn set_active_fullscreen(&mut self, role: Role, fullscreen: bool) -> Result<(), TabError> {
        let index = self.active_index;
        let Some(ws) = self.workspaces.get_mut(index) else {
            return Err(TabError::NoWorkspaces);
        };
        if !ws.set_fullscreen(role, fullscreen) {
            return Err(TabError::NoFullscreenFor(role));
        }
        let ws = ws.clone();
        info!("{} fullscreen {}", role, fullscreen);
        self.persist_workspaces();
        self.notify(UiEvent::DividerVisibility(ws.divider_visible()));

        let display = self.display.resolve();
        let rect = self.pixel_rect(&display, role, fullscreen);
        self.enqueue_reposition(&ws, role, rect, PlacementOptions { frontmost_only: true });
        Ok(())
    }

    /// Record which role has logical focus in the active workspace.
    pub fn set_focused_app(&mut self, role: Role) -> Result<(), TabError> {
        let index = self.active_index;
        let Some(ws) = self.workspaces.get_mut(index) else {
            debug!("focus {} without workspaces", role);
            return Ok(());
        };
        ws.focused_app = role;
        ws.gitgui_visible = role == Role::GitGui;
        let visible = ws.divider_visible();
        debug!("focused app {}", role);
        self.persist_workspaces();
        self.notify(UiEvent::DividerVisibility(visible));
        Ok(())
    }

    /// Bring up the git GUI for the active workspace.
    ///
    /// The frontmost probe runs on the placement queue like every other
    /// window call; if the git GUI is already frontmost nothing happens.
    pub fn toggle_git_gui(&mut self) -> Result<(), TabError> {
        let ws = self.active().ok_or(TabError::NoWorkspaces)?.clone();
        let launch_path = self.git_gui_paths.apply(&ws.path);
        let tx = self.outcome_tx.clone();
        let ticket = self.queue.enqueue("toggle gitgui", move |ctl: &W| {
            git_gui_job(ctl, &ws, &launch_path, &tx)
        });
        self.pending.push(ticket);
        Ok(())
    }

    /// Re-resolve the display profile and re-place the active workspace's
    /// panes and the top bar.
    pub fn apply_display_layout(&mut self) {
        let display = self.display.resolve();
        info!("apply {} display layout", display.profile);
        let profile = self.layout.profile(display.profile);
        let top_bar = top_bar_bounds(&display.monitors, &display.screen, profile);
        let divider = profile.divider.map(|d| d.to_pixels(&display.screen));
        self.notify(UiEvent::LayoutApplied {
            profile: display.profile,
            top_bar,
            divider,
        });

        let Some(ws) = self.active().cloned() else {
            return;
        };
        for role in pane_order(ws.focused_app) {
            let rect = self.pixel_rect(&display, role, ws.fullscreen(role));
            self.enqueue_reposition(&ws, role, rect, PlacementOptions::default());
        }
        self.notify(UiEvent::DividerVisibility(ws.divider_visible()));
    }

    pub fn set_theme(&mut self, theme: Theme) {
        info!("theme {}", theme);
        self.theme = theme;
        persist("theme", || self.store.save_theme(theme));
        self.notify(UiEvent::ThemeChanged(theme));
    }

    //  Outcomes

    /// Wait for outstanding window jobs (bounded by the sync timeout) and
    /// apply what they reported.  Later outcomes win.
    pub fn sync(&mut self) {
        if !self.pending.is_empty() {
            let deadline = Instant::now() + self.sync_timeout;
            let mut unfinished = Vec::new();
            for ticket in self.pending.drain(..) {
                let left = deadline.saturating_duration_since(Instant::now());
                if !ticket.wait_timeout(left) {
                    unfinished.push(ticket);
                }
            }
            if !unfinished.is_empty() {
                warn!(
                    "{} window job(s) still running after {:?}",
                    unfinished.len(),
                    self.sync_timeout
                );
            }
            self.pending = unfinished;
        }
        self.apply_outcomes();
    }

    /// Apply whatever finished jobs have reported so far without waiting.
    /// Called by the main loop while idle.
    pub fn poll(&mut self) {
        self.pending.retain(|t| !t.is_done());
        self.apply_outcomes();
    }

    fn apply_outcomes(&mut self) {
        let outcomes: Vec<Outcome> = self.outcome_rx.try_iter().collect();
        let mut changed = false;
        for outcome in outcomes {
            changed |= self.apply_outcome(outcome);
        }
        if changed {
            self.persist_workspaces();
            self.notify_workspaces();
        }
    }

    /// Block until every queued window job has run, then [`sync`](Self::sync).
    pub fn flush(&mut self) {
        self.queue.flush();
        self.sync();
    }

    fn apply_outcome(&mut self, outcome: Outcome) -> bool {
        match outcome {
            Outcome::Rebind {
                workspace,
                role,
                handle,
            } => match self.workspace_mut(workspace) {
                Some(ws) => {
                    debug!("rebind {} of {} to {}", role, ws.path, handle);
                    ws.set_handle(role, Some(handle));
                    true
                }
                None => {
                    debug!("dropping {} handle for closed workspace", role);
                    false
                }
            },
            Outcome::Unbind { workspace, role } => match self.workspace_mut(workspace) {
                Some(ws) if ws.handle(role).is_some() => {
                    debug!("forget stale {} handle of {}", role, ws.path);
                    ws.set_handle(role, None);
                    true
                }
                _ => false,
            },
            Outcome::GitGuiShown {
                workspace,
                launched,
            } => match self.workspace_mut(workspace) {
                Some(ws) => {
                    if launched {
                        ws.gitgui_initialized = true;
                    }
                    ws.gitgui_visible = true;
                    true
                }
                None => false,
            },
        }
    }

    fn workspace_mut(&mut self, id: WorkspaceId) -> Option<&mut Workspace> {
        self.workspaces.iter_mut().find(|ws| ws.id == id)
    }

    //  Window jobs

    /// Focus (or bring back) both panes of the active workspace and put
    /// them where the layout says.
    fn refocus_active(&mut self) {
        let Some(ws) = self.active().cloned() else {
            return;
        };
        self.notify(UiEvent::DividerVisibility(ws.divider_visible()));
        let display = self.display.resolve();
        for role in pane_order(ws.focused_app) {
            let rect = self.pixel_rect(&display, role, ws.fullscreen(role));
            let handle = ws.handle(role).cloned();
            let path = ws.path.clone();
            let id = ws.id;
            let tx = self.outcome_tx.clone();
            let ticket = self
                .queue
                .enqueue(format!("refocus {}", role), move |ctl: &W| {
                    refocus_job(ctl, id, role, handle, &path, rect, &tx)
                });
            self.pending.push(ticket);
        }
    }

    fn enqueue_launch(&mut self, ws: &Workspace, role: Role, rect: PixelRect) {
        let path = ws.path.clone();
        let id = ws.id;
        let tx = self.outcome_tx.clone();
        let ticket = self.queue.enqueue(format!("launch {}", role), move |ctl: &W| -> Result<(), W::Error> {
            let handle = launch_and_bind(ctl, &tx, id, role, &path)?;
            ctl.reposition(role, &handle, rect, PlacementOptions::default())
        });
        self.pending.push(ticket);
    }

    fn enqueue_reposition(&mut self, ws: &Workspace, role: Role, rect: PixelRect, opts: PlacementOptions) {
        let handle = ws.handle(role).cloned();
        let path = ws.path.clone();
        let id = ws.id;
        let tx = self.outcome_tx.clone();
        let ticket = self
            .queue
            .enqueue(format!("reposition {}", role), move |ctl: &W| -> Result<(), W::Error> {
                let handle = match handle {
                    Some(h) => h,
                    None => match ctl.resolve_handle(role, &path)? {
                        Some(h) => {
                            rebind(&tx, id, role, &h);
                            h
                        }
                        None => {
                            debug!("no {} window for {}, nothing to place", role, path);
                            return Ok(());
                        }
                    },
                };
                ctl.reposition(role, &handle, rect, opts)
            });
        self.pending.push(ticket);
    }

    /// Close the window recorded for `role`.  Without a recorded handle
    /// nothing is closed: a lookup by path could hit a sibling workspace
    /// on the same directory.
    fn enqueue_close(&self, ws: &Workspace, role: Role) {
        let Some(handle) = ws.handle(role).cloned() else {
            debug!("no {} window recorded for {}, nothing to close", role, ws.path);
            return;
        };
        self.queue
            .enqueue(format!("close {}", role), move |ctl: &W| ctl.close(role, &handle));
    }

    fn pixel_rect(&self, display: &DisplayState, role: Role, fullscreen: bool) -> PixelRect {
        let pane = Pane::for_role(role).unwrap_or(Pane::Terminal);
        self.layout
            .rect_for(display.profile, pane, fullscreen)
            .to_pixels(&display.screen)
    }

    //  Persistence and notifications

    fn persist_workspaces(&mut self) {
        persist("workspaces", || self.store.save(&self.workspaces));
    }

    fn persist_active_index(&mut self) {
        let index = self.active_index;
        persist("active index", || self.store.save_active_index(index));
    }

    fn notify(&self, event: UiEvent) {
        if let Some(tx) = &self.ui_tx {
            let _ = tx.send(event);
        }
    }

    fn notify_workspaces(&self) {
        self.notify(UiEvent::WorkspacesChanged {
            workspaces: self.workspaces.clone(),
            active_index: self.active_index,
        });
    }

    fn notify_active(&self) {
        self.notify(UiEvent::ActiveIndexChanged {
            active_index: self.active_index,
            theme: self.theme,
        });
    }

    fn allocate_id(&mut self) -> WorkspaceId {
        let id = WorkspaceId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Panes in the order they are handled: the focused one last, so it ends
/// up on top.
fn pane_order(focused: Role) -> [Role; 2] {
    match focused {
        Role::Editor => [Role::Terminal, Role::Editor],
        _ => [Role::Editor, Role::Terminal],
    }
}

/// Write with one retry.  In-memory state stays authoritative either way.
fn persist(what: &str, mut write: impl FnMut() -> Result<(), StoreError>) {
    if let Err(first) = write() {
        warn!("saving {} failed, retrying: {}", what, first);
        if let Err(e) = write() {
            error!("saving {} failed again, keeping in-memory state: {}", what, e);
        }
    }
}

fn rebind(tx: &mpsc::Sender<Outcome>, workspace: WorkspaceId, role: Role, handle: &Handle) {
    let _ = tx.send(Outcome::Rebind {
        workspace,
        role,
        handle: handle.clone(),
    });
}

fn unbind(tx: &mpsc::Sender<Outcome>, workspace: WorkspaceId, role: Role) {
    let _ = tx.send(Outcome::Unbind { workspace, role });
}

fn launch_and_bind<W: WindowController>(
    ctl: &W,
    tx: &mpsc::Sender<Outcome>,
    workspace: WorkspaceId,
    role: Role,
    path: &str,
) -> Result<Handle, W::Error> {
    let h = ctl.launch(role, path)?;
    rebind(tx, workspace, role, &h);
    Ok(h)
}

/// Focus one pane, bringing its window back if needed, then place it.
///
/// A missing handle is first looked up by path.  Whichever window we end
/// up with gets one focus attempt; if that fails the stale handle is
/// dropped and exactly one launch follows.
fn refocus_job<W: WindowController>(
    ctl: &W,
    workspace: WorkspaceId,
    role: Role,
    handle: Option<Handle>,
    path: &str,
    rect: PixelRect,
    tx: &mpsc::Sender<Outcome>,
) -> Result<(), W::Error> {
    let (candidate, recorded) = match handle {
        Some(h) => (Some(h), true),
        None => (ctl.resolve_handle(role, path)?, false),
    };
    let handle = match candidate {
        Some(h) => match ctl.focus(role, &h) {
            Ok(()) => {
                if !recorded {
                    rebind(tx, workspace, role, &h);
                }
                h
            }
            Err(e) => {
                warn!("focus {} {} failed, relaunching at {}: {}", role, h, path, e);
                if recorded {
                    unbind(tx, workspace, role);
                }
                launch_and_bind(ctl, tx, workspace, role, path)?
            }
        },
        None => launch_and_bind(ctl, tx, workspace, role, path)?,
    };
    ctl.reposition(role, &handle, rect, PlacementOptions::default())
}

fn git_gui_job<W: WindowController>(
    ctl: &W,
    ws: &Workspace,
    launch_path: &str,
    tx: &mpsc::Sender<Outcome>,
) -> Result<(), W::Error> {
    if ctl.probe_frontmost_role()? == Some(Role::GitGui) {
        debug!("git gui already frontmost");
        return Ok(());
    }
    let focused = match (ws.gitgui_initialized, ws.handle(Role::GitGui)) {
        (true, Some(h)) => match ctl.focus(Role::GitGui, h) {
            Ok(()) => true,
            Err(e) => {
                warn!("focus gitgui {} failed, relaunching: {}", h, e);
                unbind(tx, ws.id, Role::GitGui);
                false
            }
        },
        _ => false,
    };
    let launched = !focused;
    if launched {
        launch_and_bind(ctl, tx, ws.id, Role::GitGui, launch_path)?;
    }
    let _ = tx.send(Outcome::GitGuiShown {
        workspace: ws.id,
        launched,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MonitorInfo;
    use crate::layout::{DisplayProfile, Screen};
    use crate::store::MemoryStore;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    //  Test doubles

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Resolve(Role, String),
        Focus(Role, String),
        Reposition(Role, String, PixelRect),
        Launch(Role, String),
        Close(Role, String),
        Probe,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct FakeError(String);

    #[derive(Default)]
    struct Script {
        calls: Vec<Call>,
        /// Handles whose next focus call fails (once each).
        fail_focus_once: HashSet<String>,
        fail_launch: bool,
        resolvable: Option<String>,
        frontmost: Option<Role>,
        launches: u32,
    }

    #[derive(Clone, Default)]
    struct RecordingController {
        script: Arc<Mutex<Script>>,
    }

    impl RecordingController {
        fn calls(&self) -> Vec<Call> {
            self.script.lock().unwrap().calls.clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }
    }

    impl WindowController for RecordingController {
        type Error = FakeError;

        fn resolve_handle(&self, role: Role, path: &str) -> Result<Option<Handle>, FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Resolve(role, path.into()));
            Ok(s.resolvable.clone().and_then(Handle::new))
        }

        fn focus(&self, role: Role, handle: &Handle) -> Result<(), FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Focus(role, handle.to_string()));
            if s.fail_focus_once.remove(handle.as_str()) {
                return Err(FakeError(format!("window {} is gone", handle)));
            }
            Ok(())
        }

        fn reposition(
            &self,
            role: Role,
            handle: &Handle,
            rect: PixelRect,
            _opts: PlacementOptions,
        ) -> Result<(), FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Reposition(role, handle.to_string(), rect));
            Ok(())
        }

        fn launch(&self, role: Role, path: &str) -> Result<Handle, FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Launch(role, path.into()));
            if s.fail_launch {
                return Err(FakeError("launch failed".into()));
            }
            s.launches += 1;
            Handle::new(format!("{}-{}", role, s.launches))
                .ok_or_else(|| FakeError("blank handle".into()))
        }

        fn close(&self, role: Role, handle: &Handle) -> Result<(), FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Close(role, handle.to_string()));
            Ok(())
        }

        fn probe_frontmost_role(&self) -> Result<Option<Role>, FakeError> {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Probe);
            Ok(s.frontmost)
        }
    }

    #[derive(Clone, Default)]
    struct StaticDisplays {
        monitors: Arc<Mutex<Vec<MonitorInfo>>>,
    }

    impl DisplaySource for StaticDisplays {
        type Error = FakeError;

        fn monitors(&self) -> Result<Vec<MonitorInfo>, FakeError> {
            Ok(self.monitors.lock().unwrap().clone())
        }
    }

    fn laptop() -> MonitorInfo {
        MonitorInfo {
            name: "eDP-1".into(),
            width: 1920,
            height: 1080,
            x: 0,
            y: 0,
            primary: true,
        }
    }

    type Mgr = TabManager<RecordingController, StaticDisplays, MemoryStore>;

    struct Harness {
        mgr: Mgr,
        ctl: RecordingController,
        displays: StaticDisplays,
        ui: mpsc::Receiver<UiEvent>,
    }

    fn settings() -> TabSettings {
        TabSettings {
            layout: LayoutTable::default(),
            settle: Duration::ZERO,
            sync_timeout: Duration::from_secs(5),
            git_gui_paths: PathTransform::new(vec![PathRule::ExpandHome], Some("/home/user".into())),
        }
    }

    fn harness_with(store: WorkspaceStore<MemoryStore>) -> Harness {
        let ctl = RecordingController::default();
        let displays = StaticDisplays::default();
        displays.monitors.lock().unwrap().push(laptop());
        let resolver = DisplayResolver::new(displays.clone(), Vec::new());
        let mut mgr = TabManager::new(ctl.clone(), resolver, store, settings());
        let (tx, ui) = mpsc::channel();
        mgr.set_ui(tx);
        Harness {
            mgr,
            ctl,
            displays,
            ui,
        }
    }

    fn harness() -> Harness {
        harness_with(WorkspaceStore::new(MemoryStore::new()))
    }

    /// A harness with `paths` open, every pane bound to a handle named
    /// after its workspace, the log cleared and the first one active.
    fn harness_open(paths: &[&str]) -> Harness {
        let mut h = harness();
        for p in paths {
            h.mgr.create_workspace(p).unwrap();
        }
        h.mgr.flush();
        for (i, ws) in h.mgr.workspaces.iter_mut().enumerate() {
            ws.terminal_window_handle = Handle::new(format!("t{}", i));
            ws.editor_window_handle = Handle::new(format!("e{}", i));
        }
        h.mgr.active_index = 0;
        {
            let mut s = h.ctl.script.lock().unwrap();
            s.calls.clear();
            s.launches = 0;
        }
        while h.ui.try_recv().is_ok() {}
        h
    }

    fn events(h: &Harness) -> Vec<UiEvent> {
        h.ui.try_iter().collect()
    }

    fn expected_rect(role: Role, fullscreen: bool) -> PixelRect {
        let pane = Pane::for_role(role).unwrap();
        LayoutTable::default()
            .rect_for(DisplayProfile::Internal, pane, fullscreen)
            .to_pixels(&Screen::from(&laptop()))
    }

    //  Create / duplicate

    #[test]
    fn create_appends_and_activates() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.create_workspace("/home/user/proj").unwrap();
        h.mgr.flush();

        assert_eq!(h.mgr.workspaces().len(), 3);
        assert_eq!(h.mgr.active_index(), 2);
        let ws = &h.mgr.workspaces()[2];
        assert_eq!(ws.path, "/home/user/proj");
        assert_eq!(ws.focused_app, Role::Terminal);
        assert!(!ws.terminal_fullscreen);
        assert!(!ws.editor_fullscreen);
    }

    #[test]
    fn create_launches_both_panes_compact() {
        let mut h = harness();
        h.mgr.create_workspace("/p").unwrap();
        h.mgr.flush();

        let calls = h.ctl.calls();
        assert_eq!(
            calls,
            vec![
                Call::Launch(Role::Editor, "/p".into()),
                Call::Reposition(Role::Editor, "editor-1".into(), expected_rect(Role::Editor, false)),
                Call::Launch(Role::Terminal, "/p".into()),
                Call::Reposition(
                    Role::Terminal,
                    "terminal-2".into(),
                    expected_rect(Role::Terminal, false)
                ),
            ]
        );
        let ws = h.mgr.active().unwrap();
        assert_eq!(ws.editor_window_handle, Handle::new("editor-1"));
        assert_eq!(ws.terminal_window_handle, Handle::new("terminal-2"));
    }

    #[test]
    fn create_rejects_empty_path() {
        let mut h = harness();
        assert_eq!(h.mgr.create_workspace("  "), Err(TabError::EmptyPath));
        assert!(h.mgr.workspaces().is_empty());
    }

    #[test]
    fn create_persists_before_notifying() {
        let mut h = harness();
        h.mgr.create_workspace("/p").unwrap();
        let saved = h.mgr.store.load().unwrap();
        assert_eq!(saved.workspaces.len(), 1);
        assert_eq!(saved.active_index, 0);
        let evs = events(&h);
        assert!(matches!(
            evs.first(),
            Some(UiEvent::WorkspacesChanged { active_index: 0, .. })
        ));
    }

    #[test]
    fn duplicate_copies_path_only() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[0].editor_fullscreen = true;
        h.mgr.duplicate_active_workspace().unwrap();

        assert_eq!(h.mgr.workspaces().len(), 3);
        assert_eq!(h.mgr.active_index(), 0);
        let dup = &h.mgr.workspaces()[2];
        assert_eq!(dup.path, "/a");
        assert!(!dup.editor_fullscreen);
        assert!(dup.terminal_window_handle.is_none());
        assert_ne!(dup.id, h.mgr.workspaces()[0].id);
        h.mgr.flush();
        assert!(h.ctl.calls().is_empty());
    }

    //  Navigation

    #[test]
    fn navigation_wraps_both_ways() {
        let mut h = harness_open(&["/a", "/b", "/c"]);
        h.mgr.handle(Command::Go(Direction::Right)).unwrap();
        assert_eq!(h.mgr.active_index(), 1);
        h.mgr.handle(Command::Go(Direction::Right)).unwrap();
        assert_eq!(h.mgr.active_index(), 2);
        h.mgr.handle(Command::Go(Direction::Right)).unwrap();
        assert_eq!(h.mgr.active_index(), 0);
        h.mgr.handle(Command::Go(Direction::Left)).unwrap();
        assert_eq!(h.mgr.active_index(), 2);
    }

    #[test]
    fn next_then_prev_round_trips() {
        for len in 1..=4 {
            let paths: Vec<String> = (0..len).map(|i| format!("/w{}", i)).collect();
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            for start in 0..len {
                let mut h = harness_open(&refs);
                h.mgr.active_index = start;
                h.mgr.next_workspace().unwrap();
                h.mgr.prev_workspace().unwrap();
                assert_eq!(h.mgr.active_index(), start, "len {} start {}", len, start);
                h.mgr.prev_workspace().unwrap();
                h.mgr.next_workspace().unwrap();
                assert_eq!(h.mgr.active_index(), start, "len {} start {}", len, start);
            }
        }
    }

    #[test]
    fn navigation_on_empty_list_fails() {
        let mut h = harness();
        assert_eq!(h.mgr.next_workspace(), Err(TabError::NoWorkspaces));
        assert_eq!(h.mgr.prev_workspace(), Err(TabError::NoWorkspaces));
    }

    #[test]
    fn navigation_refocuses_focused_pane_last() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[1].focused_app = Role::Editor;
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();

        assert_eq!(
            h.ctl.calls(),
            vec![
                Call::Focus(Role::Terminal, "t1".into()),
                Call::Reposition(Role::Terminal, "t1".into(), expected_rect(Role::Terminal, false)),
                Call::Focus(Role::Editor, "e1".into()),
                Call::Reposition(Role::Editor, "e1".into(), expected_rect(Role::Editor, false)),
            ]
        );
    }

    #[test]
    fn single_workspace_navigation_still_refocuses() {
        let mut h = harness_open(&["/a"]);
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();
        assert_eq!(h.mgr.active_index(), 0);
        assert_eq!(h.ctl.count(|c| matches!(c, Call::Focus(..))), 2);
    }

    #[test]
    fn navigation_clears_outgoing_git_gui() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[0].gitgui_initialized = true;
        h.mgr.workspaces[0].gitgui_visible = true;
        h.mgr.next_workspace().unwrap();
        assert!(!h.mgr.workspaces()[0].gitgui_initialized);
        assert!(!h.mgr.workspaces()[0].gitgui_visible);
    }

    #[test]
    fn stale_handle_relaunches_exactly_once() {
        let mut h = harness_open(&["/a", "/b"]);
        h.ctl.script.lock().unwrap().fail_focus_once.insert("t1".into());
        h.mgr.handle(Command::Go(Direction::Right)).unwrap();
        // The next command syncs first, so the new handle is visible to it.
        h.mgr.handle(Command::Defocus).unwrap();

        let launches: Vec<Call> = h
            .ctl
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Launch(..)))
            .collect();
        assert_eq!(launches, vec![Call::Launch(Role::Terminal, "/b".into())]);
        assert_eq!(
            h.mgr.workspaces()[1].terminal_window_handle,
            Handle::new("terminal-1")
        );
        let saved = h.mgr.store.load().unwrap();
        assert_eq!(saved.workspaces[1].terminal_window_handle, Handle::new("terminal-1"));
    }

    #[test]
    fn failed_relaunch_does_not_loop() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[1].focused_app = Role::Editor;
        {
            let mut s = h.ctl.script.lock().unwrap();
            s.fail_focus_once.insert("t1".into());
            s.fail_launch = true;
        }
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();
        assert_eq!(h.ctl.count(|c| matches!(c, Call::Launch(..))), 1);
        assert_eq!(h.mgr.workspaces()[1].terminal_window_handle, None);
        let saved = h.mgr.store.load().unwrap();
        assert_eq!(saved.workspaces[1].terminal_window_handle, None);
        // The editor job still runs after the terminal job failed.
        assert!(h.ctl.calls().contains(&Call::Focus(Role::Editor, "e1".into())));
    }

    #[test]
    fn missing_handle_is_resolved_before_launching() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[1].terminal_window_handle = None;
        h.ctl.script.lock().unwrap().resolvable = Some("found".into());
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();

        assert_eq!(h.ctl.count(|c| matches!(c, Call::Launch(..))), 0);
        assert!(h.ctl.calls().contains(&Call::Focus(Role::Terminal, "found".into())));
        assert_eq!(h.mgr.workspaces()[1].terminal_window_handle, Handle::new("found"));
    }

    #[test]
    fn resolved_window_that_cannot_be_focused_is_relaunched_once() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[1].terminal_window_handle = None;
        {
            let mut s = h.ctl.script.lock().unwrap();
            s.resolvable = Some("found".into());
            s.fail_focus_once.insert("found".into());
        }
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();

        let launches: Vec<Call> = h
            .ctl
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Launch(..)))
            .collect();
        assert_eq!(launches, vec![Call::Launch(Role::Terminal, "/b".into())]);
        assert_eq!(
            h.mgr.workspaces()[1].terminal_window_handle,
            Handle::new("terminal-1")
        );
    }

    #[test]
    fn stale_handle_is_cleared_before_relaunch() {
        let mut h = harness_open(&["/a", "/b"]);
        h.ctl.script.lock().unwrap().fail_focus_once.insert("t1".into());
        h.ctl.script.lock().unwrap().fail_launch = true;
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();

        // Next visit looks the window up instead of focusing the dead id.
        h.ctl.script.lock().unwrap().calls.clear();
        h.ctl.script.lock().unwrap().fail_launch = false;
        h.mgr.prev_workspace().unwrap();
        h.mgr.next_workspace().unwrap();
        h.mgr.flush();
        let calls = h.ctl.calls();
        assert!(!calls.contains(&Call::Focus(Role::Terminal, "t1".into())));
        assert!(calls.contains(&Call::Resolve(Role::Terminal, "/b".into())));
    }

    #[test]
    fn resolved_handle_from_placement_is_kept() {
        let mut h = harness_open(&["/a"]);
        h.mgr.workspaces[0].terminal_window_handle = None;
        h.ctl.script.lock().unwrap().resolvable = Some("found".into());
        h.mgr.toggle_fullscreen().unwrap();
        h.mgr.flush();

        assert_eq!(h.mgr.workspaces()[0].terminal_window_handle, Handle::new("found"));
        assert!(h
            .ctl
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Reposition(Role::Terminal, name, _) if name == "found")));
    }

    #[test]
    fn rebind_for_closed_workspace_is_dropped() {
        let mut h = harness_open(&["/a", "/b"]);
        let gone = h.mgr.workspaces[1].id;
        h.mgr
            .outcome_tx
            .send(Outcome::Rebind {
                workspace: gone,
                role: Role::Terminal,
                handle: Handle::new("late").unwrap(),
            })
            .unwrap();
        h.mgr.workspaces.remove(1);
        h.mgr.sync();
        assert!(h
            .mgr
            .workspaces()
            .iter()
            .all(|ws| ws.terminal_window_handle != Handle::new("late")));
    }

    #[test]
    fn later_rebind_wins() {
        let mut h = harness_open(&["/a"]);
        let id = h.mgr.workspaces[0].id;
        for name in ["first", "second"] {
            h.mgr
                .outcome_tx
                .send(Outcome::Rebind {
                    workspace: id,
                    role: Role::Editor,
                    handle: Handle::new(name).unwrap(),
                })
                .unwrap();
        }
        h.mgr.sync();
        assert_eq!(h.mgr.workspaces()[0].editor_window_handle, Handle::new("second"));
    }

    #[test]
    fn idle_poll_applies_finished_rebinds() {
        let mut h = harness_open(&["/a", "/b"]);
        h.mgr.workspaces[1].terminal_window_handle = None;
        h.mgr.next_workspace().unwrap();
        h.mgr.queue.flush();
        h.mgr.poll();

        assert!(h.mgr.pending.is_empty());
        assert_eq!(
            h.mgr.workspaces()[1].terminal_window_handle,
            Handle::new("terminal-1")
        );
        assert!(events(&h)
            .iter()
            .any(|e| matches!(e, UiEvent::WorkspacesChanged { .. })));
    }

    //  Close

    #[test]
    fn close_last_remaining_workspace() {
        let mut h = harness_open(&["/a"]);
        h.mgr.handle(Command::Close).unwrap();
        h.mgr.flush();

        assert!(h.mgr.workspaces().is_empty());
        assert_eq!(h.mgr.active_index(), 0);
        assert_eq!(h.ctl.count(|c| matches!(c, Call::Focus(..))), 0);
        assert_eq!(h.ctl.count(|c| matches!(c, Call::Close(..))), 2);
    }

    #[test]
    fn close_clamps_index_and_keeps_it_valid() {
        for len in 1..=4usize {
            for start in 0..len {
                let paths: Vec<String> = (0..len).map(|i| format!("/w{}", i)).collect();
                let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
                let mut h = harness_open(&refs);
                h.mgr.active_index = start;
                h.mgr.close_active_workspace().unwrap();
                assert_eq!(h.mgr.workspaces().len(), len - 1);
                if len == 1 {
                    assert_eq!(h.mgr.active_index(), 0);
                } else {
                    assert!(h.mgr.active_index() <= len - 2);
                }
            }
        }
    }

    #[test]
    fn close_closes_windows_and_refocuses_next() {
        let mut h = harness_open(&["/a", "/b", "/c"]);
        h.mgr.active_index = 2;
        h.mgr.workspaces[2].gitgui_initialized = true;
        h.mgr.workspaces[2].gitgui_window_handle = Handle::new("g2");
        h.mgr.close_active_workspace().unwrap();
        h.mgr.flush();

        assert_eq!(h.mgr.active_index(), 1);
        let calls = h.ctl.calls();
        assert_eq!(
            &calls[..3],
            &[
                Call::Close(Role::Terminal, "t2".into()),
                Call::Close(Role::Editor, "e2".into()),
                Call::Close(Role::GitGui, "g2".into()),
            ]
        );
        assert!(calls.contains(&Call::Focus(Role::Terminal, "t1".into())));
        assert!(calls.contains(&Call::Focus(Role::Editor, "e1".into())));
    }

    #[test]
    fn close_without_handles_leaves_sibling_windows_alone() {
        let mut h = harness_open(&["/a"]);
        h.mgr.duplicate_active_workspace().unwrap();
        h.mgr.active_index = 1;
        h.ctl.script.lock().unwrap().resolvable = Some("t0".into());
        h.mgr.close_active_workspace().unwrap();
        h.mgr.flush();

        let calls = h.ctl.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Close(..))).count(), 0);
        assert_eq!(h.mgr.workspaces().len(), 1);
        assert_eq!(h.mgr.workspaces()[0].terminal_window_handle, Handle::new("t0"));
    }

    #[test]
    fn close_on_empty_list_fails() {
        let mut h = harness();
        assert_eq!(h.mgr.close_active_workspace(), Err(TabError::NoWorkspaces));
    }

    //  Fullscreen

    #[test]
    fn double_toggle_restores_flag_with_two_placements() {
        let mut h = harness_open(&["/a"]);
        h.mgr.handle(Command::ToggleFullscreen).unwrap();
        assert!(h.mgr.active().unwrap().terminal_fullscreen);
        h.mgr.handle(Command::ToggleFullscreen).unwrap();
        assert!(!h.mgr.active().unwrap().terminal_fullscreen);
        h.mgr.flush();

        assert_eq!(
            h.ctl.calls(),
            vec![
                Call::Reposition(Role::Terminal, "t0".into(), expected_rect(Role::Terminal, true)),
                Call::Reposition(Role::Terminal, "t0".into(), expected_rect(Role::Terminal, false)),
            ]
        );
    }

    #[test]
    fn toggle_follows_focused_role_and_divider() {
        let mut h = harness_open(&["/a"]);
        h.mgr.set_focused_app(Role::Editor).unwrap();
        h.mgr.toggle_fullscreen().unwrap();
        let ws = h.mgr.active().unwrap();
        assert!(ws.editor_fullscreen);
        assert!(!ws.terminal_fullscreen);
        let evs = events(&h);
        assert_eq!(evs.last(), Some(&UiEvent::DividerVisibility(false)));
    }

    #[test]
    fn toggle_with_git_gui_focused_is_rejected() {
        let mut h = harness_open(&["/a"]);
        h.mgr.set_focused_app(Role::GitGui).unwrap();
        assert_eq!(
            h.mgr.toggle_fullscreen(),
            Err(TabError::NoFullscreenFor(Role::GitGui))
        );
    }

    #[test]
    fn compact_is_idempotent() {
        let mut h = harness_open(&["/a"]);
        h.mgr.to_fullscreen().unwrap();
        h.mgr.to_compact_screen().unwrap();
        h.mgr.to_compact_screen().unwrap();
        h.mgr.flush();
        assert!(!h.mgr.active().unwrap().terminal_fullscreen);
        assert_eq!(h.ctl.count(|c| matches!(c, Call::Reposition(..))), 3);
    }

    #[test]
    fn fullscreen_ops_without_workspaces() {
        let mut h = harness();
        assert_eq!(h.mgr.toggle_fullscreen(), Err(TabError::NoWorkspaces));
        assert_eq!(h.mgr.to_compact_screen(), Ok(()));
        assert_eq!(h.mgr.to_fullscreen(), Ok(()));
    }

    //  Focus, git GUI, layout, theme

    #[test]
    fn focused_app_drives_divider() {
        let mut h = harness_open(&["/a"]);
        h.mgr.workspaces[0].terminal_fullscreen = true;
        h.mgr.set_focused_app(Role::Editor).unwrap();
        h.mgr.set_focused_app(Role::Terminal).unwrap();
        h.mgr.set_focused_app(Role::GitGui).unwrap();
        h.mgr.handle(Command::Defocus).unwrap();
        let divider: Vec<bool> = events(&h)
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::DividerVisibility(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(divider, vec![true, false, false, false]);
        assert!(h.mgr.active().unwrap().gitgui_visible);
    }

    #[test]
    fn git_gui_launches_once_with_expanded_path() {
        let mut h = harness_open(&["~/proj"]);
        h.mgr.handle(Command::ToggleGitGui).unwrap();
        h.mgr.handle(Command::ToggleGitGui).unwrap();
        h.mgr.flush();

        assert_eq!(
            h.ctl.calls(),
            vec![
                Call::Probe,
                Call::Launch(Role::GitGui, "/home/user/proj".into()),
                Call::Probe,
                Call::Focus(Role::GitGui, "gitgui-1".into()),
            ]
        );
        let ws = h.mgr.active().unwrap();
        assert!(ws.gitgui_initialized);
        assert!(ws.gitgui_visible);
    }

    #[test]
    fn git_gui_frontmost_is_a_no_op() {
        let mut h = harness_open(&["/a"]);
        h.ctl.script.lock().unwrap().frontmost = Some(Role::GitGui);
        h.mgr.toggle_git_gui().unwrap();
        h.mgr.flush();
        assert_eq!(h.ctl.calls(), vec![Call::Probe]);
        assert!(!h.mgr.active().unwrap().gitgui_initialized);
    }

    #[test]
    fn display_change_replaces_panes_with_new_profile() {
        let mut h = harness_open(&["/a"]);
        h.mgr.workspaces[0].editor_fullscreen = true;
        h.displays.monitors.lock().unwrap().push(MonitorInfo {
            name: "HDMI-1".into(),
            width: 2560,
            height: 1440,
            x: 1920,
            y: 0,
            primary: false,
        });
        h.mgr.handle(Command::ApplyDisplayLayout).unwrap();
        h.mgr.flush();

        let table = LayoutTable::default();
        let screen = Screen::from(&laptop());
        let ext = |pane, fs| table.rect_for(DisplayProfile::External, pane, fs).to_pixels(&screen);
        assert_eq!(
            h.ctl.calls(),
            vec![
                Call::Reposition(Role::Editor, "e0".into(), ext(Pane::Editor, true)),
                Call::Reposition(Role::Terminal, "t0".into(), ext(Pane::Terminal, false)),
            ]
        );
        let layout = events(&h).into_iter().find_map(|e| match e {
            UiEvent::LayoutApplied { profile, top_bar, .. } => Some((profile, top_bar)),
            _ => None,
        });
        let (profile, top_bar) = layout.unwrap();
        assert_eq!(profile, DisplayProfile::External);
        assert!(top_bar.width > 1920);
    }

    #[test]
    fn display_layout_without_workspaces_only_moves_the_bar() {
        let mut h = harness();
        h.mgr.apply_display_layout();
        h.mgr.flush();
        assert!(h.ctl.calls().is_empty());
        assert!(events(&h)
            .iter()
            .any(|e| matches!(e, UiEvent::LayoutApplied { .. })));
    }

    #[test]
    fn theme_is_persisted_and_announced() {
        let mut h = harness();
        h.mgr.handle(Command::SetTheme(Theme::Dark)).unwrap();
        assert_eq!(h.mgr.theme(), Theme::Dark);
        assert_eq!(h.mgr.store.load().unwrap().theme, Theme::Dark);
        assert_eq!(events(&h), vec![UiEvent::ThemeChanged(Theme::Dark)]);
    }

    //  Restore

    #[test]
    fn restores_saved_state_and_announces_it() {
        let mut store = WorkspaceStore::new(MemoryStore::new());
        store
            .save(&[
                Workspace::new(WorkspaceId(0), "/x"),
                Workspace::new(WorkspaceId(0), "/y"),
            ])
            .unwrap();
        store.save_active_index(1).unwrap();
        store.save_theme(Theme::Dark).unwrap();

        let h = harness_with(store);
        assert_eq!(h.mgr.workspaces().len(), 2);
        assert_eq!(h.mgr.active_index(), 1);
        assert_eq!(h.mgr.theme(), Theme::Dark);
        assert_ne!(h.mgr.workspaces()[0].id, h.mgr.workspaces()[1].id);

        h.mgr.announce();
        let evs = events(&h);
        assert_eq!(evs.len(), 2);
        assert!(matches!(evs[0], UiEvent::WorkspacesChanged { active_index: 1, .. }));
        assert_eq!(
            evs[1],
            UiEvent::ActiveIndexChanged {
                active_index: 1,
                theme: Theme::Dark
            }
        );
    }

    //  Persistence retry

    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: u32,
        attempts: u32,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    impl KeyValueStore for FlakyStore {
        type Error = DiskFull;

        fn get(&self, key: &str) -> Result<Option<serde_json::Value>, DiskFull> {
            Ok(self.inner.get(key).unwrap_or(None))
        }

        fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), DiskFull> {
            self.attempts += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(DiskFull);
            }
            let _ = self.inner.set(key, value);
            Ok(())
        }
    }

    #[test]
    fn persistence_is_retried_once() {
        let mut store = WorkspaceStore::new(FlakyStore {
            failures_left: 1,
            ..Default::default()
        });
        persist("theme", || store.save_theme(Theme::Dark));
        assert_eq!(store.backend().attempts, 2);
        assert_eq!(store.load().unwrap().theme, Theme::Dark);

        store.backend_mut().failures_left = 5;
        store.backend_mut().attempts = 0;
        persist("theme", || store.save_theme(Theme::Light));
        assert_eq!(store.backend().attempts, 2);
        assert_eq!(store.load().unwrap().theme, Theme::Dark);
    }
}
