//! Error types for prefork.

use thiserror::Error;

/// Main error type for prefork.
#[derive(Error, Debug)]
pub enum PreforkError {
    /// A worker lost access to an input resource mid-task (surfaced from the
    /// platform fault signal, or reported explicitly by the task).
    #[error("{0}")]
    InputFile(String),

    /// A task failed inside a worker and was reported over the channel.
    #[error("task failed: {0}")]
    Task(String),

    /// A worker process misbehaved: failed to spawn, exited without signaling
    /// completion, or was killed by a signal.
    #[error("worker error: {0}")]
    Worker(String),

    /// The coordinator received a message it does not recognize. This
    /// indicates protocol corruption and is unrecoverable.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for prefork operations.
pub type Result<T> = std::result::Result<T, PreforkError>;
