//! Monitor enumeration and hotplug detection.

use super::process;
use super::DesktopError;
use crate::command::{Command, MonitorInfo};
use crate::traits::{CommandSource, DisplaySource};
use log::{debug, info, warn};
use std::process::Command as Process;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// A poll this much later than scheduled counts as a wake-up.
const RESUME_GAP: Duration = Duration::from_secs(5);

/// [`DisplaySource`] backed by `xrandr --listmonitors`.
#[derive(Debug, Clone)]
pub struct XrandrDisplays {
    bin: String,
    timeout: Duration,
}

impl XrandrDisplays {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

impl DisplaySource for XrandrDisplays {
    type Error = DesktopError;

    fn monitors(&self) -> Result<Vec<MonitorInfo>, DesktopError> {
        let out = process::run(Process::new(&self.bin).arg("--listmonitors"), self.timeout)?;
        parse_listmonitors(&out)
    }
}

/// Parse the output of `xrandr --listmonitors`:
///
/// ```text
/// Monitors: 2
///  0: +*eDP-1 1920/344x1080/194+0+0  eDP-1
///  1: +HDMI-1 2560/597x1440/336+1920+0  HDMI-1
/// ```
pub fn parse_listmonitors(out: &str) -> Result<Vec<MonitorInfo>, DesktopError> {
    let bad = |line: &str| DesktopError::Parse {
        program: "xrandr --listmonitors".into(),
        detail: format!("unexpected line {:?}", line),
    };
    let mut monitors = Vec::new();
    for line in out.lines().map(str::trim) {
        if line.is_empty() || line.starts_with("Monitors:") {
            continue;
        }
        let mut fields = line.split_whitespace();
        let _index = fields.next();
        let flags_name = fields.next().ok_or_else(|| bad(line))?;
        let geometry = fields.next().ok_or_else(|| bad(line))?;
        let primary = flags_name.contains('*');
        let name = flags_name.trim_start_matches(['+', '*']).to_string();
        let (width, height, x, y) = parse_geometry(geometry).ok_or_else(|| bad(line))?;
        monitors.push(MonitorInfo {
            name,
            width,
            height,
            x,
            y,
            primary,
        });
    }
    Ok(monitors)
}

/// `1920/344x1080/194+0+0` -> `(1920, 1080, 0, 0)`.  Negative offsets
/// are printed as `+-2560`.
fn parse_geometry(geometry: &str) -> Option<(u32, u32, i32, i32)> {
    let (w, rest) = geometry.split_once('x')?;
    let (h, offsets) = rest.split_once('+')?;
    let (x, y) = offsets.split_once('+')?;
    let width = w.split('/').next()?.parse().ok()?;
    let height = h.split('/').next()?.parse().ok()?;
    Some((width, height, x.parse().ok()?, y.parse().ok()?))
}

/// Polls a [`DisplaySource`] and asks for a relayout whenever the monitor
/// set changes.
///
/// A poll that comes in much later than scheduled means the machine was
/// asleep, which also triggers a relayout.
///
/// A std channel only reports a dropped receiver on send, so with a stable
/// monitor set a closed sink goes unnoticed.  Pass a stop channel through
/// [`DisplayWatcher::with_stop`] to end the watcher between polls: it exits
/// as soon as the matching sender is dropped.
pub struct DisplayWatcher<D: DisplaySource + Send> {
    source: D,
    interval: Duration,
    stop: Option<mpsc::Receiver<()>>,
}

impl<D: DisplaySource + Send> DisplayWatcher<D> {
    pub fn new(source: D, interval: Duration) -> Self {
        Self {
            source,
            interval,
            stop: None,
        }
    }

    pub fn with_stop(mut self, stop: mpsc::Receiver<()>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Sleep for one interval.  Returns `false` once the stop channel is
    /// signalled or disconnected.
    fn wait(&self) -> bool {
        match &self.stop {
            None => {
                thread::sleep(self.interval);
                true
            }
            Some(stop) => matches!(
                stop.recv_timeout(self.interval),
                Err(mpsc::RecvTimeoutError::Timeout)
            ),
        }
    }
}

impl<D: DisplaySource + Send> CommandSource for DisplayWatcher<D> {
    type Error = DesktopError;

    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), DesktopError> {
        info!("watching displays every {:?}", self.interval);
        let mut last: Option<Vec<MonitorInfo>> = None;
        let mut last_poll = Instant::now();
        loop {
            if !self.wait() {
                debug!("display watcher stopped");
                return Ok(());
            }
            let resumed = last_poll.elapsed() > self.interval + RESUME_GAP;
            last_poll = Instant::now();

            let current = match self.source.monitors() {
                Ok(m) => m,
                Err(e) => {
                    warn!("display poll failed: {}", e);
                    continue;
                }
            };
            let changed = last.as_ref().is_some_and(|prev| *prev != current);
            if changed || resumed {
                info!(
                    "{}, requesting relayout",
                    if changed { "monitor set changed" } else { "resumed from sleep" }
                );
                if sink.send(Command::ApplyDisplayLayout).is_err() {
                    debug!("command channel closed, display watcher exiting");
                    return Ok(());
                }
            }
            last = Some(current);
        }
    }
}
