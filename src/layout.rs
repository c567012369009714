//! Display profiles and the static window layout table.
//!
//! Geometry is stored as fractions of the primary screen ([`LayoutRect`])
//! and converted to absolute pixels ([`PixelRect`]) with the live screen
//! size when a placement is issued.  Which preset applies is decided by
//! the [`DisplayResolver`], which is re-run on every placement-relevant
//! transition because monitors come and go at runtime.

use crate::command::{MonitorInfo, Role};
use crate::traits::DisplaySource;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named layout preset chosen from the current monitor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayProfile {
    /// Laptop panel only.
    #[default]
    Internal,
    /// External monitor(s) or a docked display.
    External,
}

impl fmt::Display for DisplayProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayProfile::Internal => write!(f, "internal"),
            DisplayProfile::External => write!(f, "external"),
        }
    }
}

/// A rectangle in fractions of the screen (`0.0..=1.0` on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl LayoutRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert to absolute pixels on `screen`.
    ///
    /// Width and height never collapse below one pixel, so the divider
    /// (a zero-width fraction) still maps to a visible line.
    pub fn to_pixels(&self, screen: &Screen) -> PixelRect {
        let w = screen.width as f64;
        let h = screen.height as f64;
        PixelRect {
            x: screen.x + (self.x * w).floor() as i32,
            y: screen.y + (self.y * h).floor() as i32,
            width: ((self.width * w).floor() as u32).max(1),
            height: ((self.height * h).floor() as u32).max(1),
        }
    }
}

/// A rectangle in absolute desktop pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// The screen area layout fractions are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Screen {
    /// Fallback used when no monitor information is available at all.
    pub const FALLBACK: Screen = Screen {
        x: 0,
        y: 0,
        width: 1920,
        height: 1080,
    };
}

impl From<&MonitorInfo> for Screen {
    fn from(m: &MonitorInfo) -> Self {
        Self {
            x: m.x,
            y: m.y,
            width: m.width,
            height: m.height,
        }
    }
}

/// The two panes that have layout presets.  The git GUI is launched
/// wherever the application itself decides and is never placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Terminal,
    Editor,
}

impl Pane {
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Terminal => Some(Pane::Terminal),
            Role::Editor => Some(Pane::Editor),
            Role::GitGui => None,
        }
    }
}

/// Rectangles for one display profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileLayout {
    pub terminal: LayoutRect,
    pub terminal_fullscreen: LayoutRect,
    pub editor: LayoutRect,
    pub editor_fullscreen: LayoutRect,
    /// Cosmetic separator between the panes; passed through to the UI.
    #[serde(default)]
    pub divider: Option<LayoutRect>,
    /// Height of the top bar as a fraction of the screen height.
    pub top_bar_height: f64,
    /// Horizontal inset of the top bar on each side, as a fraction of the
    /// spanned width.
    #[serde(default)]
    pub top_bar_inset: f64,
}

impl ProfileLayout {
    fn rect(&self, pane: Pane, fullscreen: bool) -> LayoutRect {
        match (pane, fullscreen) {
            (Pane::Terminal, false) => self.terminal,
            (Pane::Terminal, true) => self.terminal_fullscreen,
            (Pane::Editor, false) => self.editor,
            (Pane::Editor, true) => self.editor_fullscreen,
        }
    }
}

/// Static mapping `(profile, pane, fullscreen) -> rectangle`.
///
/// Every combination is present by construction, so lookups cannot fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutTable {
    pub internal: ProfileLayout,
    pub external: ProfileLayout,
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self {
            internal: ProfileLayout {
                terminal: LayoutRect::new(0.0, 0.05, 0.3125, 0.95),
                terminal_fullscreen: LayoutRect::new(0.0, 0.05, 1.0, 0.95),
                editor: LayoutRect::new(0.3125, 0.05, 0.6875, 0.95),
                editor_fullscreen: LayoutRect::new(0.0, 0.05, 1.0, 0.95),
                divider: Some(LayoutRect::new(0.3125, 0.05, 0.0, 0.95)),
                top_bar_height: 0.02,
                top_bar_inset: 0.0,
            },
            external: ProfileLayout {
                terminal: LayoutRect::new(0.05, 0.035, 0.335, 0.93),
                terminal_fullscreen: LayoutRect::new(0.05, 0.035, 0.9, 0.93),
                editor: LayoutRect::new(0.385, 0.035, 0.565, 0.93),
                editor_fullscreen: LayoutRect::new(0.05, 0.035, 0.9, 0.93),
                divider: Some(LayoutRect::new(0.385, 0.035, 0.0, 0.93)),
                top_bar_height: 0.02,
                top_bar_inset: 0.01,
            },
        }
    }
}

impl LayoutTable {
    pub fn profile(&self, profile: DisplayProfile) -> &ProfileLayout {
        match profile {
            DisplayProfile::Internal => &self.internal,
            DisplayProfile::External => &self.external,
        }
    }

    /// Target rectangle for `pane` under `profile`.
    pub fn rect_for(&self, profile: DisplayProfile, pane: Pane, fullscreen: bool) -> LayoutRect {
        self.profile(profile).rect(pane, fullscreen)
    }

    pub fn divider(&self, profile: DisplayProfile) -> Option<LayoutRect> {
        self.profile(profile).divider
    }
}

/// Bounds of the top bar: spans the bounding width of every monitor,
/// inset on both sides by the profile's `top_bar_inset`.
pub fn top_bar_bounds(monitors: &[MonitorInfo], primary: &Screen, layout: &ProfileLayout) -> PixelRect {
    let (left, right) = monitors
        .iter()
        .map(|m| (m.x, m.x + m.width as i32))
        .fold(None, |acc: Option<(i32, i32)>, (l, r)| match acc {
            None => Some((l, r)),
            Some((al, ar)) => Some((al.min(l), ar.max(r))),
        })
        .unwrap_or((primary.x, primary.x + primary.width as i32));
    let span = (right - left).max(1) as f64;
    let inset = (span * layout.top_bar_inset).floor();
    PixelRect {
        x: left + inset as i32,
        y: primary.y + (primary.height as f64 * layout.top_bar_inset).floor() as i32,
        width: ((span - 2.0 * inset) as u32).max(1),
        height: ((primary.height as f64 * layout.top_bar_height).floor() as u32).max(1),
    }
}

/// A primary-display size that identifies a docked external monitor even
/// when it is the only display attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySignature {
    pub width: u32,
    pub height: u32,
}

/// Result of one profile resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub profile: DisplayProfile,
    /// Screen the layout fractions are relative to (the primary monitor).
    pub screen: Screen,
    pub monitors: Vec<MonitorInfo>,
}

/// Decide the profile for a monitor set.
///
/// More than one monitor, or a primary matching one of the
/// `signatures`, is `external`; anything else (including no monitors at
/// all) is `internal`.
pub fn classify(monitors: &[MonitorInfo], signatures: &[DisplaySignature]) -> DisplayProfile {
    if monitors.len() > 1 {
        return DisplayProfile::External;
    }
    match primary_monitor(monitors) {
        Some(p)
            if signatures
                .iter()
                .any(|s| s.width == p.width && s.height == p.height) =>
        {
            DisplayProfile::External
        }
        _ => DisplayProfile::Internal,
    }
}

/// The monitor flagged primary, or the first one.
pub fn primary_monitor(monitors: &[MonitorInfo]) -> Option<&MonitorInfo> {
    monitors.iter().find(|m| m.primary).or_else(|| monitors.first())
}

/// Resolves the current [`DisplayProfile`] from a [`DisplaySource`].
///
/// Never cached across calls.  When the source fails, the last-known
/// state is returned instead.
pub struct DisplayResolver<D: DisplaySource> {
    source: D,
    signatures: Vec<DisplaySignature>,
    last: DisplayState,
}

impl<D: DisplaySource> DisplayResolver<D> {
    pub fn new(source: D, signatures: Vec<DisplaySignature>) -> Self {
        Self {
            source,
            signatures,
            last: DisplayState {
                profile: DisplayProfile::Internal,
                screen: Screen::FALLBACK,
                monitors: Vec::new(),
            },
        }
    }

    /// Query the monitors and classify them.
    pub fn resolve(&mut self) -> DisplayState {
        match self.source.monitors() {
            Ok(monitors) => {
                let profile = classify(&monitors, &self.signatures);
                let screen = primary_monitor(&monitors)
                    .map(Screen::from)
                    .unwrap_or(Screen::FALLBACK);
                debug!("display profile {} ({} monitor(s))", profile, monitors.len());
                self.last = DisplayState {
                    profile,
                    screen,
                    monitors,
                };
            }
            Err(e) => {
                warn!("monitor query failed, keeping {} profile: {}", self.last.profile, e);
            }
        }
        self.last.clone()
    }

    /// The state returned by the most recent [`resolve`](Self::resolve).
    pub fn last(&self) -> &DisplayState {
        &self.last
    }
}
