//! Loopback HTTP [`CommandSource`] implementation.
//!
//! The hotkey daemon POSTs a bare command name (or a workspace path) as the
//! request body:
//!
//! ```text
//! POST /            body: right
//! POST /            body: toggleFullScreen
//! POST /            body: /home/user/proj
//! GET  /state       -> the current UiSnapshot as JSON
//! ```
//!
//! The server runs on a single-threaded tokio runtime owned by the
//! listener thread, so the rest of the daemon stays synchronous.

use crate::command::Command;
use crate::traits::CommandSource;
use crate::ui::{SharedSnapshot, UiSnapshot};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use log::{debug, info, warn};
use std::net::{SocketAddr, TcpListener};
use std::sync::{mpsc, Arc};
use tokio::sync::Notify;

/// Reply body for an accepted command.
pub const ACCEPTED: &str = "Request processed";

/// A [`CommandSource`] serving the control surface over HTTP.
pub struct HttpListener {
    listener: Option<TcpListener>,
    snapshot: SharedSnapshot,
}

/// Errors produced by the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum HttpListenerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listener already ran")]
    AlreadyRunning,
}

#[derive(Clone)]
struct AppState {
    sink: mpsc::Sender<Command>,
    snapshot: SharedSnapshot,
    closed: Arc<Notify>,
}

impl HttpListener {
    /// Bind `addr` right away so a port conflict shows up at startup.
    pub fn bind(addr: SocketAddr, snapshot: SharedSnapshot) -> Result<Self, HttpListenerError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self::from_std(listener, snapshot))
    }

    pub fn from_std(listener: TcpListener, snapshot: SharedSnapshot) -> Self {
        Self {
            listener: Some(listener),
            snapshot,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HttpListenerError> {
        match &self.listener {
            Some(l) => Ok(l.local_addr()?),
            None => Err(HttpListenerError::AlreadyRunning),
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(post_command))
        .route("/state", get(get_state))
        .with_state(state)
}

async fn post_command(State(state): State<AppState>, body: String) -> (StatusCode, &'static str) {
    let cmd = match Command::parse(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!("rejected payload {:?}: {}", body, e);
            return (StatusCode::BAD_REQUEST, "unknown command");
        }
    };
    debug!("received {:?}", cmd);
    if state.sink.send(cmd).is_err() {
        info!("sink closed, shutting down");
        state.closed.notify_one();
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down");
    }
    (StatusCode::OK, ACCEPTED)
}

async fn get_state(State(state): State<AppState>) -> Json<UiSnapshot> {
    Json(state.snapshot.read().clone())
}

impl CommandSource for HttpListener {
    type Error = HttpListenerError;

    /// Serve until the command channel closes.
    ///
    /// This method **blocks**.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Command>) -> Result<(), Self::Error> {
        let std_listener = self.listener.take().ok_or(HttpListenerError::AlreadyRunning)?;
        std_listener.set_nonblocking(true)?;
        info!("listening on http://{}", std_listener.local_addr()?);

        let closed = Arc::new(Notify::new());
        let state = AppState {
            sink,
            snapshot: self.snapshot.clone(),
            closed: closed.clone(),
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(std_listener)?;
            axum::serve(listener, router(state))
                .with_graceful_shutdown(async move { closed.notified().await })
                .await?;
            Ok::<_, HttpListenerError>(())
        })
    }
}

//  Tests
