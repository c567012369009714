//! Strictly sequential execution of window operations.
//!
//! OS-level window moves are fire-and-forget: the helper acknowledges a
//! request before the window manager has applied it, and a second move
//! issued too early silently clobbers the first.  [`PlacementQueue`] owns
//! the target (normally the [`WindowController`](crate::traits::WindowController))
//! on a single worker thread and runs queued jobs one at a time, in
//! submission order, with a settle delay after each.
//!
//! A job that fails (or panics) is logged and the queue moves on.  There is
//! no priority and no cancellation.

use log::{debug, error, warn};
use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Op<T> = Box<dyn FnOnce(&T) -> Result<(), String> + Send>;

struct Job<T> {
    label: String,
    op: Op<T>,
    done: mpsc::Sender<()>,
}

/// Completion signal for one queued job.
///
/// Resolves once the job has finished, whether it succeeded or not.  If
/// the queue shut down before running the job the ticket resolves
/// immediately.
#[derive(Debug)]
pub struct Ticket {
    rx: mpsc::Receiver<()>,
}

impl Ticket {
    /// Block until the job has finished.
    pub fn wait(self) {
        let _ = self.rx.recv();
    }

    /// Block for at most `timeout`.  Returns `true` if the job finished in
    /// time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        !matches!(
            self.rx.recv_timeout(timeout),
            Err(mpsc::RecvTimeoutError::Timeout)
        )
    }

    /// Non-blocking check.
    pub fn is_done(&self) -> bool {
        !matches!(self.rx.try_recv(), Err(mpsc::TryRecvError::Empty))
    }
}

/// Single-consumer FIFO of jobs against a `T`.
pub struct PlacementQueue<T> {
    tx: Option<mpsc::Sender<Job<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> PlacementQueue<T> {
    /// Move `target` onto a new worker thread.  `settle` is the pause
    /// after every job before the next one may start.
    pub fn new(target: T, settle: Duration) -> Self {
        let (tx, rx) = mpsc::channel::<Job<T>>();
        let worker = thread::Builder::new()
            .name("placement".into())
            .spawn(move || run_worker(target, rx, settle));
        match worker {
            Ok(worker) => Self {
                tx: Some(tx),
                worker: Some(worker),
            },
            Err(e) => {
                error!("failed to spawn placement worker: {}", e);
                Self {
                    tx: None,
                    worker: None,
                }
            }
        }
    }

    /// Append `op` to the queue.
    ///
    /// `label` only shows up in logs.
    pub fn enqueue<F, E>(&self, label: impl Into<String>, op: F) -> Ticket
    where
        F: FnOnce(&T) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        let (done, rx) = mpsc::channel();
        let label = label.into();
        let job = Job {
            label: label.clone(),
            op: Box::new(move |t: &T| op(t).map_err(|e| e.to_string())),
            done,
        };
        match &self.tx {
            Some(tx) => {
                if tx.send(job).is_err() {
                    warn!("placement worker gone, dropping {:?}", label);
                }
            }
            None => warn!("placement worker not running, dropping {:?}", label),
        }
        Ticket { rx }
    }

    /// Block until every job queued so far has run.
    pub fn flush(&self) {
        self.enqueue("flush", |_: &T| Ok::<(), String>(())).wait();
    }
}

impl<T> Drop for PlacementQueue<T> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker<T>(target: T, rx: mpsc::Receiver<Job<T>>, settle: Duration) {
    for job in rx {
        debug!("placement job {:?} started", job.label);
        let op = job.op;
        match catch_unwind(AssertUnwindSafe(|| op(&target))) {
            Ok(Ok(())) => debug!("placement job {:?} done", job.label),
            Ok(Err(e)) => warn!("placement job {:?} failed: {}", job.label, e),
            Err(_) => error!("placement job {:?} panicked", job.label),
        }
        let _ = job.done.send(());
        if !settle.is_zero() {
            thread::sleep(settle);
        }
    }
    debug!("placement queue closed");
}
