//! Bounded execution of external processes.
//!
//! Every external stage (command translator, toolchain, produced executable)
//! goes through [`run_captured`]: stdout and stderr share one pipe so the
//! captured text keeps the order the child wrote it in, the pipe is drained on
//! a helper thread, and the child is killed once its deadline passes.

use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::errors::{HarnessError, Stage};

/// How often a running child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Attempts at exec'ing a file another process still has open for writing.
const BUSY_SPAWN_ATTEMPTS: u32 = 5;

/// Combined stdout+stderr of a finished process.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub text: String,
    pub status: ExitStatus,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Kills and reaps a child that is still running when dropped.
struct ChildGuard {
    child: Child,
    finished: bool,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Run `command` to completion, capturing combined output, within `limit`.
pub fn run_captured(
    mut command: Command,
    stage: Stage,
    limit: Duration,
) -> Result<CapturedOutput, HarnessError> {
    let program = PathBuf::from(command.get_program());
    let spawn_failed = |source| HarnessError::Spawn {
        stage,
        program: program.clone(),
        source,
    };

    let (mut reader, writer) = std::io::pipe().map_err(spawn_failed)?;
    let stderr_writer = writer.try_clone().map_err(spawn_failed)?;
    command
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer);

    debug!(%stage, command = ?command, "spawning");
    let child = spawn_when_not_busy(&mut command).map_err(spawn_failed)?;
    // The command still holds the parent's write ends; the reader only sees
    // EOF once they are closed.
    drop(command);
    let mut guard = ChildGuard {
        child,
        finished: false,
    };

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = reader.read_to_end(&mut bytes);
        let _ = tx.send(bytes);
    });

    // A limit too large to represent as an instant means no deadline.
    let deadline = Instant::now().checked_add(limit);
    let status = loop {
        match guard.child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => return Err(spawn_failed(source)),
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!(%stage, program = %program.display(), limit_secs = limit.as_secs_f64(), "deadline exceeded, killing process");
            return Err(HarnessError::Timeout { stage, limit });
        }
        thread::sleep(POLL_INTERVAL);
    };
    guard.finished = true;

    // A grandchild may keep the pipe open after the child exits; give the
    // reader whatever time is left rather than blocking forever.
    let received = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            rx.recv_timeout(remaining.max(POLL_INTERVAL)).ok()
        }
        None => rx.recv().ok(),
    };
    let bytes = received.ok_or(HarnessError::Timeout { stage, limit })?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    debug!(%stage, code = ?status.code(), bytes = bytes.len(), "process finished");

    Ok(CapturedOutput { text, status })
}

/// Spawn, waiting briefly while the executable is still open for writing.
///
/// A freshly linked artifact can be briefly held open by a forked but not yet
/// exec'd sibling; this is not a retry of the stage itself.
fn spawn_when_not_busy(command: &mut Command) -> std::io::Result<Child> {
    let mut attempt = 1;
    loop {
        match command.spawn() {
            Err(e) if e.kind() == ErrorKind::ExecutableFileBusy && attempt < BUSY_SPAWN_ATTEMPTS => {
                debug!(attempt, "executable busy, waiting");
                attempt += 1;
                thread::sleep(POLL_INTERVAL * attempt);
            }
            result => return result,
        }
    }
}
