use std::time::Duration;

use scribe_model::DecodeParams;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bounded wait on the inbox before the shutdown token is re-checked.
    pub poll_interval: Duration,
    /// Jobs allowed to queue inside the transport before requesters are back-pressured.
    pub inbox_capacity: usize,
    /// Decoding parameters forwarded to the engine on every job.
    pub params: DecodeParams,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            inbox_capacity: 4096,
            params: DecodeParams::default(),
        }
    }
}
