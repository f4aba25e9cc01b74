/// Addresses of the worker's two endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Job channel: the worker listens, the gateway dials.
    pub job_addr: String,
    /// Control channel: the worker publishes, the gateway subscribes.
    pub control_addr: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            job_addr: "127.0.0.1:5555".to_string(),
            control_addr: "127.0.0.1:5556".to_string(),
        }
    }
}
