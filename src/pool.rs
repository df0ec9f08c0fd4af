//! The coordinator: spawns workers and multiplexes their channels.

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing_subscriber::filter::LevelFilter;

use crate::error::{PreforkError, Result};
use crate::forward;
use crate::partition::partition;
use crate::proc::{WorkerHandle, spawn_worker};
use crate::progress::ProgressSink;
use crate::protocol::{Assignment, Message};
use crate::task::Task;

/// How the executor schedules tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// Run every task on the caller's own thread, in input order. No
    /// partitioning, no channels, no processes; used when spawning offers no
    /// benefit.
    Sequential,
    /// Partition tasks across up to `workers` subprocesses.
    Processes {
        /// Worker count; values below 1 are treated as 1.
        workers: usize,
    },
}

/// Run `task` over every argument tuple in `task_args`.
///
/// `task_finished` is invoked once per completed task with the produced value
/// and the progress sink; the sink additionally receives one [`update`] per
/// result. On success every task has run exactly once. On failure the first
/// worker-reported error is returned after every worker process has been
/// terminated and reaped; results delivered before the failure stand, but no
/// further tasks run.
///
/// [`update`]: ProgressSink::update
pub fn execute<T, P, F>(
    task: &T,
    task_args: Vec<T::Args>,
    concurrency: Concurrency,
    mut progress: P,
    mut task_finished: F,
) -> Result<()>
where
    T: Task,
    P: ProgressSink,
    F: FnMut(T::Output, &mut P),
{
    let workers = match concurrency {
        Concurrency::Sequential => {
            for args in task_args {
                let value = task.run(args)?;
                task_finished(value, &mut progress);
                progress.update();
            }
            return Ok(());
        }
        Concurrency::Processes { workers } => workers.max(1),
    };

    let groups = partition(task_args, workers);
    if groups.is_empty() {
        return Ok(());
    }

    // Workers inherit the coordinator's current severity ceiling so both
    // sides agree on which records are worth transmitting.
    let log_level = LevelFilter::current().to_string();

    let mut active: Vec<WorkerHandle> = Vec::with_capacity(groups.len());
    for (id, args) in groups.into_iter().enumerate() {
        let assignment = Assignment {
            log_level: log_level.clone(),
            args,
        };
        // Drop of already-spawned handles kills and reaps them on error.
        active.push(spawn_worker(id, task.name(), &assignment)?);
    }

    tracing::debug!(workers = active.len(), "pool started");

    let mut done: Vec<WorkerHandle> = Vec::new();
    while !active.is_empty() {
        // Highest index first so swap_remove cannot displace a pending one.
        for idx in ready_indices(&active)?.into_iter().rev() {
            match active[idx].recv::<T::Output>() {
                Ok(Some(Message::Result { value })) => {
                    task_finished(value, &mut progress);
                    progress.update();
                }
                Ok(Some(Message::Log { record })) => forward::emit(&record),
                Ok(Some(Message::Complete)) => {
                    done.push(active.swap_remove(idx));
                }
                Ok(Some(Message::Exception { fault })) => {
                    // Terminal for this channel; the trailing `complete` the
                    // worker still sends is never read.
                    abort(&mut active, &mut done);
                    return Err(fault.into_error());
                }
                Ok(None) => {
                    // EOF without a terminal message: the worker died before
                    // finishing (initializer fault, crash, or kill).
                    let mut handle = active.swap_remove(idx);
                    let err = handle.abnormal_exit_error();
                    abort(&mut active, &mut done);
                    return Err(err);
                }
                Err(e) => {
                    abort(&mut active, &mut done);
                    return Err(e);
                }
            }
        }
    }

    // Every worker has completed; reap them all before returning.
    for mut handle in done {
        handle.wait()?;
    }

    Ok(())
}

/// Indices of channels with input available or closed.
///
/// Channels whose readers already hold buffered lines are served first:
/// bytes sitting in userspace never show up in `poll(2)`, so blocking while
/// any are pending could stall the pool.
fn ready_indices(active: &[WorkerHandle]) -> Result<Vec<usize>> {
    let buffered: Vec<usize> = active
        .iter()
        .enumerate()
        .filter(|(_, handle)| handle.has_buffered())
        .map(|(idx, _)| idx)
        .collect();
    if !buffered.is_empty() {
        return Ok(buffered);
    }

    let mut fds: Vec<PollFd> = active
        .iter()
        .map(|handle| PollFd::new(handle.channel_fd(), PollFlags::POLLIN))
        .collect();

    loop {
        match poll(&mut fds, PollTimeout::NONE) {
            Ok(_) => break,
            Err(Errno::EINTR) => continue, // retry on interrupt
            Err(e) => return Err(PreforkError::Worker(format!("poll failed: {e}"))),
        }
    }

    let ready = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
    Ok(fds
        .iter()
        .enumerate()
        .filter(|(_, fd)| fd.revents().is_some_and(|r| r.intersects(ready)))
        .map(|(idx, _)| idx)
        .collect())
}

/// Fail-fast teardown: force-terminate every worker, then reap them all.
///
/// Termination is deliberately pool-wide; one worker's fault aborts the whole
/// run, and in-flight tasks are not waited for.
fn abort(active: &mut Vec<WorkerHandle>, done: &mut Vec<WorkerHandle>) {
    tracing::warn!(
        running = active.len(),
        completed = done.len(),
        "aborting pool after worker failure"
    );
    for handle in active.iter_mut().chain(done.iter_mut()) {
        handle.terminate();
    }
    for mut handle in active.drain(..).chain(done.drain(..)) {
        let _ = handle.wait();
    }
}
