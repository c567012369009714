//! Path rewriting for external tools.
//!
//! Different tools see the same directory under different names: window
//! titles show `~/proj`, a shell hands over `~/proj` that a GUI cannot
//! open, and a native app on a mounted Windows drive wants `C:\proj`.
//! Each rewrite is one [`PathRule`]; a [`PathTransform`] applies an ordered
//! list of them.  A rule that does not match leaves the path untouched.

use serde::{Deserialize, Serialize};

/// One rewrite rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRule {
    /// `~` and `~/x` become `$HOME` and `$HOME/x`.
    ExpandHome,
    /// `$HOME/x` becomes `~/x`.  `$HOME` itself is left alone.
    ShortenHome,
    /// `/mnt/c/x/y` becomes `C:\x\y`.
    MountToDrive,
    /// `C:\x\y` (or `C:/x/y`) becomes `/mnt/c/x/y`.
    DriveToMount,
}

/// An ordered list of [`PathRule`]s bound to a home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTransform {
    rules: Vec<PathRule>,
    home: Option<String>,
}

impl PathTransform {
    pub fn new(rules: Vec<PathRule>, home: Option<String>) -> Self {
        let home = home
            .map(|h| h.trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty());
        Self { rules, home }
    }

    /// Bind `rules` to the current user's home directory.
    pub fn with_user_home(rules: Vec<PathRule>) -> Self {
        let home = dirs::home_dir().map(|p| p.to_string_lossy().into_owned());
        Self::new(rules, home)
    }

    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// Run every rule in order over `path`.
    pub fn apply(&self, path: &str) -> String {
        self.rules
            .iter()
            .fold(path.to_string(), |p, rule| self.apply_rule(*rule, &p))
    }

    fn apply_rule(&self, rule: PathRule, path: &str) -> String {
        let rewritten = match rule {
            PathRule::ExpandHome => self.home.as_deref().and_then(|h| expand_home(path, h)),
            PathRule::ShortenHome => self.home.as_deref().and_then(|h| shorten_home(path, h)),
            PathRule::MountToDrive => mount_to_drive(path),
            PathRule::DriveToMount => drive_to_mount(path),
        };
        rewritten.unwrap_or_else(|| path.to_string())
    }
}

fn expand_home(path: &str, home: &str) -> Option<String> {
    if path == "~" {
        return Some(home.to_string());
    }
    path.strip_prefix("~/").map(|rest| format!("{}/{}", home, rest))
}

fn shorten_home(path: &str, home: &str) -> Option<String> {
    path.strip_prefix(home)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| format!("~/{}", rest))
}

fn mount_to_drive(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/mnt/")?;
    let mut chars = rest.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    let tail = chars.as_str();
    if !(tail.is_empty() || tail.starts_with('/')) {
        return None;
    }
    let tail = tail.trim_start_matches('/').replace('/', "\\");
    Some(format!("{}:\\{}", letter.to_ascii_uppercase(), tail))
}

fn drive_to_mount(path: &str) -> Option<String> {
    let mut chars = path.chars();
    let letter = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    let tail = chars.as_str().strip_prefix(':')?;
    if !(tail.is_empty() || tail.starts_with('\\') || tail.starts_with('/')) {
        return None;
    }
    let tail = tail.trim_start_matches(['\\', '/']).replace('\\', "/");
    let mut out = format!("/mnt/{}", letter.to_ascii_lowercase());
    if !tail.is_empty() {
        out.push('/');
        out.push_str(&tail);
    }
    Some(out)
}
