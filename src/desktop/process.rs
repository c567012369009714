//! Running external programs with a hard deadline.

use super::DesktopError;
use log::debug;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL: Duration = Duration::from_millis(10);

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().into_owned()
}

/// Run `cmd` to completion and return its trimmed stdout.
///
/// The child is killed once `timeout` has passed.  A non-zero exit status
/// is an error carrying the child's stderr.
pub fn run(cmd: &mut Command, timeout: Duration) -> Result<String, DesktopError> {
    let program = program_name(cmd);
    debug!("run {:?}", cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DesktopError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Drain both pipes on their own threads so a chatty child cannot fill
    // a pipe and stall before it exits.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DesktopError::Timeout { program, timeout });
            }
            Ok(None) => thread::sleep(POLL),
            Err(source) => return Err(DesktopError::Spawn { program, source }),
        }
    };

    let out = stdout.map(collect).unwrap_or_default();
    let err = stderr.map(collect).unwrap_or_default();
    if !status.success() {
        return Err(DesktopError::Failed {
            program,
            status: status.to_string(),
            stderr: err.trim().to_string(),
        });
    }
    Ok(out.trim().to_string())
}

/// Start `cmd` without waiting for it.  The child is left running.
pub fn spawn_detached(cmd: &mut Command) -> Result<(), DesktopError> {
    let program = program_name(cmd);
    debug!("spawn {:?}", cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|source| DesktopError::Spawn { program, source })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
