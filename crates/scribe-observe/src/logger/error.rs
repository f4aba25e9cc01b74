use thiserror::Error;

/// Reasons the agent could not set up logging. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}', use text, json or journald")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global log subscriber is already installed")]
    AlreadyInitialized,
    #[error("log subscriber setup failed: {0}")]
    InitializationFailed(String),
    #[error("bad log filter directive '{0}'")]
    InvalidLogLevel(String),
}
