use std::sync::Arc;

use scribe_model::TaskStatus;

/// Sink for gateway-level counters. Implemented by `scribe-prometheus`.
pub trait MetricsBackend: Send + Sync + 'static {
    /// A submission was accepted.
    fn task_submitted(&self);
    /// A monitor recorded a terminal status.
    fn task_finished(&self, status: TaskStatus);
    /// Current number of held admission slots.
    fn admission_in_use(&self, in_use: usize);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn task_submitted(&self) {}
    fn task_finished(&self, _status: TaskStatus) {}
    fn admission_in_use(&self, _in_use: usize) {}
}
