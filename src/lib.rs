//! **deskswitch**: a tabbed workspace switcher for development desktops.
//!
//! A *workspace* is a project directory with three managed external
//! windows: a terminal, a code editor and (on demand) a git GUI.  The user
//! switches between workspaces like browser tabs; the windows of the active
//! workspace are brought to the front and placed into a fixed two-pane
//! layout that depends on whether an external display is attached.
//!
//! # Architecture
//!
//! The crate is organised around a few core traits:
//!
//! * [`traits::WindowController`] abstracts launching, focusing, placing
//!   and closing external windows.
//! * [`traits::DisplaySource`] abstracts the monitor query.
//! * [`traits::KeyValueStore`] abstracts persistence.
//! * [`traits::CommandSource`] abstracts the transport that delivers
//!   user intent (an HTTP endpoint, a hotplug poller, …).
//!
//! [`tabs::TabManager`] owns the workspace list and runs every window call
//! through a FIFO [`placement::PlacementQueue`] on a worker thread.
//! Concrete backends live in [`desktop`] (kitty, editor CLI, window helper,
//! xrandr), [`store`] (JSON file) and [`ipc`] (HTTP listener).

pub mod command;
pub mod config;
pub mod desktop;
pub mod ipc;
pub mod layout;
pub mod path;
pub mod placement;
pub mod store;
pub mod tabs;
pub mod traits;
pub mod ui;
pub mod workspace;
