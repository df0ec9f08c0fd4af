//! Fault-signal translation inside workers.
//!
//! A worker touching an input file that disappears underneath it (truncated
//! mmap, yanked removable storage) takes SIGBUS, which would normally kill
//! the process with no explanation. The handler installed here converts the
//! fault into a regular `exception` message on the channel so the coordinator
//! can surface a recoverable error instead of an opaque crash.
//!
//! Everything in the handler must be async-signal-safe, so the message is
//! pre-serialized and written with raw `write(2)` before `_exit(2)`.

/// Exit code used when a fault signal terminates the worker.
pub const FAULT_EXIT_CODE: i32 = 70;

/// The `exception` line the handler emits. Must stay byte-identical to the
/// serialization of [`crate::protocol::Message::Exception`] carrying an
/// `input_file` fault; the unit test below pins this.
const FAULT_LINE: &[u8] =
    b"{\"type\":\"exception\",\"fault\":{\"kind\":\"input_file\",\"message\":\"worker lost access to an input file\"}}\n";

/// The message text carried by the fault line.
pub const FAULT_MESSAGE: &str = "worker lost access to an input file";

#[cfg(unix)]
extern "C" fn on_fault_signal(_signum: libc::c_int) {
    // Only write(2) and _exit(2) here; allocation or locking would deadlock.
    unsafe {
        libc::write(
            libc::STDOUT_FILENO,
            FAULT_LINE.as_ptr() as *const libc::c_void,
            FAULT_LINE.len(),
        );
        libc::_exit(FAULT_EXIT_CODE);
    }
}

/// Best-effort installation of the SIGBUS handler.
///
/// Failure to install is non-fatal: the worker simply crashes on a fault and
/// the coordinator falls back to wait-status analysis.
#[cfg(unix)]
pub fn install() {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(on_fault_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGBUS, &action);
    }
}

/// Platforms without SIGBUS: installation is silently skipped.
#[cfg(not(unix))]
pub fn install() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FaultKind, Message, TaskFault};

    #[test]
    fn test_fault_line_matches_protocol_serialization() {
        let msg = Message::<()>::Exception {
            fault: TaskFault {
                kind: FaultKind::InputFile,
                message: FAULT_MESSAGE.to_string(),
            },
        };
        let mut expected = msg.to_line().unwrap();
        expected.push('\n');
        assert_eq!(expected.as_bytes(), FAULT_LINE);
    }

    #[test]
    fn test_fault_line_parses_as_input_file_exception() {
        let line = std::str::from_utf8(FAULT_LINE).unwrap();
        match Message::<()>::from_line(line).unwrap() {
            Message::Exception { fault } => {
                assert_eq!(fault.kind, FaultKind::InputFile);
                assert_eq!(fault.message, FAULT_MESSAGE);
            }
            other => panic!("expected Exception, got {other:?}"),
        }
    }

    #[test]
    fn test_install_is_idempotent() {
        install();
        install();
    }
}
