//! Wire protocol for worker channels.
//!
//! Messages are JSON-serialized and newline-delimited. The stream is one
//! direction only (worker to coordinator); the coordinator's half of the
//! channel carries exactly one [`Assignment`] at spawn time and is then
//! closed.

use crate::error::PreforkError;
use serde::{Deserialize, Serialize};

/// Message from worker to coordinator.
///
/// Within one channel the order is FIFO and mirrors the worker's processing
/// order: zero or more `Result`/`Log` messages, then exactly one terminal
/// message, then the channel closes. A worker still emits `Complete` after
/// `Exception`; the coordinator treats `Exception` as the true terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message<O> {
    /// One task finished successfully.
    Result { value: O },

    /// A task failed; the worker abandons the rest of its group.
    Exception { fault: TaskFault },

    /// The worker's task loop is finished.
    Complete,

    /// A log record captured inside the worker, forwarded for the
    /// coordinator's logging subsystem to filter and format.
    Log { record: LogRecord },
}

impl<O: Serialize> Message<O> {
    /// Serialize to a JSON line (no trailing newline; the writer adds it).
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<O> Message<O>
where
    O: serde::de::DeserializeOwned,
{
    /// Deserialize from a JSON line.
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// Classifies a transmitted task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The worker lost access to an input resource (fault-signal derived or
    /// reported by the task itself).
    InputFile,
    /// Any other task failure.
    Task,
}

/// A task failure in wire form.
///
/// Errors cannot cross a process boundary as Rust values, so the worker sends
/// kind + message and the coordinator reconstructs the matching
/// [`PreforkError`] variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFault {
    pub kind: FaultKind,
    pub message: String,
}

impl TaskFault {
    /// Capture an error for transmission.
    pub fn from_error(err: &PreforkError) -> Self {
        match err {
            PreforkError::InputFile(message) => Self {
                kind: FaultKind::InputFile,
                message: message.clone(),
            },
            PreforkError::Task(message) => Self {
                kind: FaultKind::Task,
                message: message.clone(),
            },
            other => Self {
                kind: FaultKind::Task,
                message: other.to_string(),
            },
        }
    }

    /// Reconstruct the coordinator-side error.
    pub fn into_error(self) -> PreforkError {
        match self.kind {
            FaultKind::InputFile => PreforkError::InputFile(self.message),
            FaultKind::Task => PreforkError::Task(self.message),
        }
    }
}

/// A structured log record forwarded from a worker.
///
/// Deliberately not pre-formatted: the coordinator applies its own level
/// rules and formatting, addressed by the record's original target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// The originating logger target (e.g. `"x.y"`).
    pub target: String,
    /// Severity name (`"ERROR"` through `"TRACE"`).
    pub level: String,
    /// The rendered message, including any structured fields.
    pub message: String,
}

/// The spawn-time handoff written to a worker's stdin.
///
/// Sent exactly once, before the worker's loop starts; it is not part of the
/// message stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment<A> {
    /// Minimum severity the worker forwards, matching the coordinator's own
    /// filter so both processes agree on what is worth transmitting.
    pub log_level: String,
    /// The argument tuples this worker owns, in execution order.
    pub args: Vec<A>,
}
