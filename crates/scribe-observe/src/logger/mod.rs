//! Subscriber setup for the agent binary.
//!
//! Task-scoped work runs inside spans that carry a `task_id` field: `monitor` on the
//! gateway, `handle` (target `scribe.worker`) on the worker. The text and JSON outputs
//! keep that field on every event emitted inside the span, and
//! [`LoggerConfig::span_events`] adds one line per closed span with its busy and idle time.
mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the process-wide subscriber for `cfg.format`.
///
/// Only the first call in a process succeeds; later ones report
/// [`LoggerError::AlreadyInitialized`].
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}
