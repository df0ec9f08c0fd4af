//! Progress reporting hooks.

/// Receives one update per completed task.
///
/// The sink is owned by the coordinator and only ever touched from the
/// coordinator's own thread; its lifetime brackets pool spawn through
/// teardown. The result callback also receives it, so hosts can annotate
/// their progress display with per-result detail.
pub trait ProgressSink {
    /// Record one completed task.
    fn update(&mut self);
}

/// Sink for hosts with no progress display available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn update(&mut self) {}
}
