//! Control surface for the hotkey daemon.
//!
//! External tools (key-bind helpers, scripts) POST command strings to a
//! loopback HTTP endpoint.

pub mod listener;
