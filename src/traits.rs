//! Core traits that decouple deskswitch from any specific window tooling,
//! display query, persistence backend or transport mechanism.
//!
//! Every concrete backend (kitty remote control plus a window helper,
//! `xrandr`, a JSON file, an HTTP listener, a test harness, …) implements
//! one of these traits.  The [`TabManager`](crate::tabs::TabManager) only
//! depends on these abstractions.

use crate::command::{Command, MonitorInfo, Role};
use crate::layout::PixelRect;
use crate::workspace::Handle;
use std::sync::mpsc;

/// Extra knobs for a single placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementOptions {
    /// Only move the window if it is the frontmost window of its
    /// application.
    pub frontmost_only: bool,
}

/// The capability surface the tab manager needs from the desktop.
///
/// Implementations shell out to OS tools or talk to a window-manager
/// helper; none of their errors ever escapes the placement queue.  Every
/// call is expected to be bounded in time (a few seconds at most).
pub trait WindowController: Send + 'static {
    /// The error type produced by this controller.
    type Error: std::error::Error + Send + 'static;

    /// Look for an existing window of `role` that belongs to `path_hint`.
    fn resolve_handle(&self, role: Role, path_hint: &str) -> Result<Option<Handle>, Self::Error>;

    /// Give keyboard focus to the window behind `handle`.
    ///
    /// Fails when the handle is stale (the window is gone).
    fn focus(&self, role: Role, handle: &Handle) -> Result<(), Self::Error>;

    /// Move and resize the window behind `handle` to `rect`.
    fn reposition(
        &self,
        role: Role,
        handle: &Handle,
        rect: PixelRect,
        opts: PlacementOptions,
    ) -> Result<(), Self::Error>;

    /// Open a new window of `role` rooted at `path` and return its handle.
    fn launch(&self, role: Role, path: &str) -> Result<Handle, Self::Error>;

    /// Close the window behind `handle`.
    fn close(&self, role: Role, handle: &Handle) -> Result<(), Self::Error>;

    /// Which managed role owns the window that currently has OS input
    /// focus, if any.
    fn probe_frontmost_role(&self) -> Result<Option<Role>, Self::Error>;
}

/// Source of the current monitor configuration.
pub trait DisplaySource {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Return the currently attached monitors.
    fn monitors(&self) -> Result<Vec<MonitorInfo>, Self::Error>;
}

/// A durable key-value map holding JSON values.
pub trait KeyValueStore {
    /// The error type produced by this store.
    type Error: std::error::Error + Send + 'static;

    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, Self::Error>;

    /// Durably store `value` under `key`.
    fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), Self::Error>;
}

//  Command Source

/// A source of [`Command`]s.
///
/// Implementations listen on some transport (a loopback HTTP endpoint, a
/// monitor-hotplug poller, an in-memory channel) and forward parsed
/// commands into the provided [`mpsc::Sender`].
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    ///
    /// This method blocks the calling thread.  To run multiple sources
    /// concurrently, spawn each one on its own thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error>;
}
