//! Coordinator-side handle for one worker process.
//!
//! Pairs the child process with its channel endpoint. The handle owns both:
//! dropping it kills and reaps the process, so no path out of the pool can
//! leak a zombie.

use std::os::fd::{AsFd, BorrowedFd};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PreforkError, Result};
use crate::ipc::{LineReader, LineWriter};
use crate::protocol::{Assignment, Message};
use crate::termination;
use crate::worker::WORKER_FLAG;

/// Handle to a worker subprocess and its channel.
pub struct WorkerHandle {
    id: usize,
    child: Child,
    reader: LineReader<ChildStdout>,
    reaped: bool,
}

/// Spawn a worker and hand it its assignment.
///
/// The worker is the current executable re-run in worker mode for
/// `task_name`. The assignment is written as a single line to the child's
/// stdin and the write end is closed immediately; everything after that flows
/// worker to coordinator only.
pub fn spawn_worker<A: Serialize>(
    id: usize,
    task_name: &str,
    assignment: &Assignment<A>,
) -> Result<WorkerHandle> {
    let exe = std::env::current_exe()
        .map_err(|e| PreforkError::Worker(format!("cannot locate current executable: {e}")))?;

    let mut child = Command::new(exe)
        .arg(WORKER_FLAG)
        .arg(task_name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| PreforkError::Worker(format!("failed to spawn worker {id}: {e}")))?;

    let handoff = serde_json::to_string(assignment)?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| PreforkError::Worker(format!("worker {id}: stdin not captured")))?;

    let mut writer = LineWriter::new(stdin);
    if let Err(e) = writer.write_line(&handoff) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(PreforkError::Worker(format!(
            "worker {id}: failed to deliver assignment: {e}"
        )));
    }
    drop(writer); // close the write end; the worker needs nothing further

    let handle = WorkerHandle::from_child(id, child)?;
    tracing::debug!(worker_id = id, task = task_name, "spawned worker");
    Ok(handle)
}

impl WorkerHandle {
    /// Wrap a spawned child, taking ownership of its stdout channel.
    fn from_child(id: usize, mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PreforkError::Worker(format!("worker {id}: stdout not captured")))?;

        Ok(Self {
            id,
            child,
            reader: LineReader::new(stdout),
            reaped: false,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Receive the next message, or `None` when the worker closed the channel.
    pub fn recv<O: DeserializeOwned>(&mut self) -> Result<Option<Message<O>>> {
        match self.reader.read_line() {
            Ok(Some(line)) => Message::from_line(line).map(Some).map_err(|e| {
                PreforkError::Protocol(format!("worker {}: unrecognized message: {e}", self.id))
            }),
            Ok(None) => Ok(None), // EOF
            Err(e) => Err(PreforkError::Worker(format!(
                "worker {}: channel read failed: {e}",
                self.id
            ))),
        }
    }

    /// Whether a received-but-unparsed line is pending in the reader.
    pub fn has_buffered(&self) -> bool {
        self.reader.has_buffered()
    }

    /// The channel's read end, for readiness polling.
    pub fn channel_fd(&self) -> BorrowedFd<'_> {
        self.reader.get_ref().as_fd()
    }

    /// Force-terminate the worker (SIGKILL). Best effort; does not reap.
    pub fn terminate(&mut self) {
        if !self.reaped {
            tracing::debug!(worker_id = self.id, "terminating worker");
            let _ = self.child.kill();
        }
    }

    /// Wait for the worker to exit and reap it.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        let status = self.child.wait().map_err(|e| {
            PreforkError::Worker(format!("worker {}: wait failed: {e}", self.id))
        })?;
        self.reaped = true;
        Ok(status)
    }

    /// Reap a worker whose channel closed without a terminal message and
    /// translate its exit status into the failure it implies.
    pub fn abnormal_exit_error(&mut self) -> PreforkError {
        match self.wait() {
            Ok(status) => {
                let reason = termination::classify(status);
                tracing::warn!(worker_id = self.id, reason = %reason, "worker died without completing");
                reason.into_error()
            }
            Err(e) => e,
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }
}
