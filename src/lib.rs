//! Semaphore-free parallel task executor.
//!
//! Standard process-pool executors have idle workers pull tasks from a shared
//! queue, which needs a semaphore or lock to arbitrate access. Some
//! environments (restricted sandboxes, constrained mobile runtimes) do not
//! provide working semaphores, so this executor divides the full task list
//! among workers **before** any of them start. Workers never coordinate with
//! each other; each one talks only to the coordinator, over a dedicated
//! channel allocated at spawn time.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────┐
//!                     │   Coordinator   │
//!                     │ (multiplexed rx)│
//!                     └────────┬────────┘
//!                              │ one channel per worker
//!               ┌──────────────┼──────────────┐
//!               │              │              │
//!         ┌─────▼─────┐  ┌─────▼─────┐  ┌─────▼─────┐
//!         │ Worker 0  │  │ Worker 1  │  │ Worker N  │
//!         │ tasks     │  │ tasks     │  │ tasks     │
//!         │ 0,N+1,…   │  │ 1,N+2,…   │  │ N,2N+1,…  │
//!         └───────────┘  └───────────┘  └───────────┘
//! ```
//!
//! The trade-off is deliberate: no dynamic load balancing or work stealing,
//! in exchange for zero shared synchronization state. Round-robin assignment
//! spreads pre-sorted expensive tasks across workers to soften the imbalance.
//!
//! Workers are subprocesses obtained by re-executing the current binary, so
//! the host must call [`run_if_worker`] for each of its tasks at the top of
//! `main`. One worker fault aborts the entire run: every process is killed
//! and reaped, the error is returned, and results already delivered stand.

mod error;
mod fault;
mod forward;
mod ipc;
mod partition;
mod pool;
mod proc;
mod progress;
mod protocol;
mod task;
mod termination;
mod worker;

pub use error::{PreforkError, Result};
pub use partition::partition;
pub use pool::{Concurrency, execute};
pub use progress::{NullProgressSink, ProgressSink};
pub use protocol::{Assignment, FaultKind, LogRecord, Message, TaskFault};
pub use task::Task;
pub use termination::TerminationReason;
pub use worker::{WORKER_FLAG, run_if_worker, run_worker_main};
