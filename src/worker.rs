//! Worker subprocess entry point.
//!
//! Workers are obtained by re-executing the current binary with
//! [`WORKER_FLAG`] and the task's name. The host opts in by calling
//! [`run_if_worker`] for each of its tasks early in `main`, before any other
//! argument handling; a matching invocation never returns.

use std::io;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::{PreforkError, Result};
use crate::fault;
use crate::forward::{self, SharedWriter};
use crate::ipc::{LineReader, LineWriter};
use crate::protocol::{Assignment, Message, TaskFault};
use crate::task::Task;

/// Argv flag marking an internal worker invocation. The next argument is the
/// task name the invocation belongs to.
pub const WORKER_FLAG: &str = "--prefork-worker";

/// Divert into the worker loop if this process was spawned as a worker for
/// `task`; otherwise return immediately.
///
/// Call once per task the host registers. When the flag is present but names
/// a different task, this returns so a later call can claim the invocation.
pub fn run_if_worker<T: Task>(task: &T) {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == WORKER_FLAG {
            if args.next().as_deref() == Some(task.name()) {
                run_worker_main(task);
            }
            return;
        }
    }
}

/// Run the worker subprocess main function.
///
/// Reads the assignment from stdin, streams messages to stdout, and exits
/// the process when the loop finishes. Never returns.
pub fn run_worker_main<T: Task>(task: &T) -> ! {
    fault::install();

    match worker_loop(task, io::stdin(), io::stdout()) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            // Initializer and channel failures land here: no terminal message
            // was sent, so the coordinator sees an abnormal exit, not a clean
            // completion.
            eprintln!("prefork worker: {e}");
            std::process::exit(1);
        }
    }
}

fn worker_loop<T, R, W>(task: &T, input: R, output: W) -> Result<()>
where
    T: Task,
    R: io::Read,
    W: io::Write + Send + 'static,
{
    // The spawn-time handoff: exactly one assignment line on the input side.
    let mut reader = LineReader::new(input);
    let assignment: Assignment<T::Args> = match reader.read_line()? {
        Some(line) => serde_json::from_str(line)?,
        None => return Err(PreforkError::Worker("no assignment received".into())),
    };

    // All channel traffic, task results and forwarded log records alike,
    // goes through one shared writer.
    let writer: SharedWriter<W> = Arc::new(Mutex::new(LineWriter::new(output)));
    forward::install_in_worker(Arc::clone(&writer), &assignment.log_level);

    task.init()?;

    tracing::debug!(tasks = assignment.args.len(), "worker initialized");

    for args in assignment.args {
        match task.run(args) {
            Ok(value) => send(&writer, &Message::Result { value })?,
            Err(e) => {
                // Fail fast: report the fault and abandon the rest of the
                // group.
                send(
                    &writer,
                    &Message::<T::Output>::Exception {
                        fault: TaskFault::from_error(&e),
                    },
                )?;
                break;
            }
        }
    }

    send(&writer, &Message::<T::Output>::Complete)?;
    Ok(())
}

fn send<W, O>(writer: &SharedWriter<W>, message: &Message<O>) -> Result<()>
where
    W: io::Write,
    O: Serialize,
{
    let line = message.to_line()?;
    forward::send_line(writer, &line)?;
    Ok(())
}
