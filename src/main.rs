//! Entry point for the **deskswitch** daemon.
//!
//! Spawns the HTTP control surface and the display watcher on background
//! threads and processes incoming commands on the main thread.  Window
//! jobs run on the placement worker owned by the
//! [`TabManager`](deskswitch::tabs::TabManager).

use deskswitch::command::Command;
use deskswitch::config::Config;
use deskswitch::desktop::{DesktopController, DisplayWatcher, XrandrDisplays};
use deskswitch::ipc::listener::HttpListener;
use deskswitch::layout::DisplayResolver;
use deskswitch::store::{JsonFileStore, WorkspaceStore};
use deskswitch::tabs::TabManager;
use deskswitch::traits::{CommandSource, DisplaySource, KeyValueStore, WindowController};
use deskswitch::ui::{self, SharedSnapshot};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How often finished window jobs are picked up while no command arrives.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Resolve the config directory (`$XDG_CONFIG_HOME/deskswitch`).
fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("deskswitch")
}

/// Try to load the config from `<config dir>/config.json`, falling back to
/// compiled-in defaults.
fn load_config(dir: &Path) -> Config {
    let path = dir.join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let dir = config_dir();
    let config = load_config(&dir);

    let state_path = config.state_path(&dir);
    let kv = match JsonFileStore::open(&state_path) {
        Ok(kv) => kv,
        Err(e) => {
            error!("cannot open state file {}: {}", state_path.display(), e);
            std::process::exit(1);
        }
    };
    info!("state file {}", state_path.display());

    let controller = DesktopController::new(config.desktop.clone());
    let displays = DisplayResolver::new(
        XrandrDisplays::new(&config.desktop.xrandr_bin, config.desktop.timeout()),
        config.display.external_signatures.clone(),
    );
    let mut manager = TabManager::new(
        controller,
        displays,
        WorkspaceStore::new(kv),
        config.tab_settings(),
    );

    let snapshot = SharedSnapshot::default();
    let (ui_tx, ui_rx) = mpsc::channel();
    {
        let snapshot = snapshot.clone();
        thread::spawn(move || ui::run_bridge(ui_rx, snapshot));
    }
    manager.set_ui(ui_tx);
    manager.announce();
    manager.apply_display_layout();

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    spawn_command_sources(&config, snapshot, cmd_tx);

    run_event_loop(manager, cmd_rx);
}

//  Event loop

fn run_event_loop<W, D, K>(mut manager: TabManager<W, D, K>, cmd_rx: mpsc::Receiver<Command>)
where
    W: WindowController,
    D: DisplaySource,
    K: KeyValueStore,
{
    info!("deskswitch running");
    loop {
        match cmd_rx.recv_timeout(IDLE_POLL) {
            Ok(cmd) => {
                if let Err(e) = manager.handle(cmd.clone()) {
                    warn!("{:?}: {}", cmd, e);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => manager.poll(),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("all command sources closed, exiting");
    manager.flush();
}

//  Helpers

fn spawn_command_sources(config: &Config, snapshot: SharedSnapshot, tx: mpsc::Sender<Command>) {
    let mut listener = match HttpListener::bind(config.server.bind, snapshot) {
        Ok(l) => l,
        Err(e) => {
            error!("cannot listen on {}: {}", config.server.bind, e);
            std::process::exit(1);
        }
    };
    // The watcher rarely sends, so it stops together with the listener.
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    {
        let tx = tx.clone();
        thread::spawn(move || {
            if let Err(e) = listener.run(tx) {
                error!("http listener error: {}", e);
            }
            drop(stop_tx);
        });
    }

    if config.display.poll_interval_ms > 0 {
        let source = XrandrDisplays::new(&config.desktop.xrandr_bin, config.desktop.timeout());
        let interval = Duration::from_millis(config.display.poll_interval_ms);
        thread::spawn(move || {
            let mut watcher = DisplayWatcher::new(source, interval).with_stop(stop_rx);
            if let Err(e) = watcher.run(tx) {
                error!("display watcher error: {}", e);
            }
        });
    } else {
        info!("display watcher disabled");
        drop(tx);
    }
}
