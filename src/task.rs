//! The task abstraction executed by the pool.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A unit of work the executor can run.
///
/// The task itself is an opaque, shared identity: every worker runs the same
/// task definition, applied to the argument tuples assigned to it. Arguments
/// and outputs cross the process boundary, so both must be serializable.
///
/// Because workers are obtained by re-executing the current binary, the host
/// must route worker invocations back to the task via [`crate::run_if_worker`];
/// [`Task::name`] is the stable identity used for that routing.
pub trait Task {
    /// One invocation's argument tuple.
    type Args: Serialize + DeserializeOwned;
    /// The value produced by one successful invocation.
    type Output: Serialize + DeserializeOwned;

    /// Stable identity for this task, used to route worker invocations.
    fn name(&self) -> &str;

    /// One-time initializer, invoked inside each worker before any task runs.
    ///
    /// A failure here is not reported over the channel; the worker exits
    /// abnormally and the coordinator surfaces it as a worker error.
    fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Execute the task for one argument tuple.
    fn run(&self, args: Self::Args) -> Result<Self::Output>;
}
