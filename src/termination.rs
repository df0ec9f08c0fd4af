//! Wait-status analysis for worker subprocesses.
//!
//! A channel that hits EOF without a terminal message means the worker died
//! before its loop finished (initializer fault, panic, or a signal). The exit
//! status is the only evidence left, so it is classified here and translated
//! into the most specific error available.

use std::fmt;
use std::process::ExitStatus;

use crate::error::PreforkError;

/// Why a worker process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Killed by a signal.
    Signaled(i32),
    /// Took the storage fault signal (SIGBUS) without the in-worker handler
    /// getting a message out first.
    InputFault,
    /// No usable status information.
    Unknown,
}

/// Classify a worker's exit status.
pub fn classify(status: ExitStatus) -> TerminationReason {
    if let Some(code) = status.code() {
        return TerminationReason::Exited(code);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return if signal == libc::SIGBUS {
                TerminationReason::InputFault
            } else {
                TerminationReason::Signaled(signal)
            };
        }
    }

    TerminationReason::Unknown
}

impl TerminationReason {
    /// The error a worker dying this way (with no terminal message) implies.
    pub fn into_error(self) -> PreforkError {
        match self {
            Self::InputFault => {
                PreforkError::InputFile("worker lost access to an input file".into())
            }
            Self::Exited(code) => PreforkError::Worker(format!(
                "worker exited with status {code} before signaling completion"
            )),
            Self::Signaled(signal) => {
                PreforkError::Worker(format!("worker killed by signal {signal}"))
            }
            Self::Unknown => PreforkError::Worker("worker terminated for an unknown reason".into()),
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(signal) => write!(f, "killed by signal {signal}"),
            Self::InputFault => write!(f, "storage access fault (SIGBUS)"),
            Self::Unknown => write!(f, "unknown reason"),
        }
    }
}
