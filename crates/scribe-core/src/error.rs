use std::path::PathBuf;

use thiserror::Error;

use scribe_model::TaskId;
use scribe_transport::TransportError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("source audio not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("undefined task: {0}")]
    Undefined(TaskId),

    #[error("invalid dirname: {0}")]
    InvalidDirname(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("gateway is shutting down")]
    ShuttingDown,

    #[error("admission pool closed")]
    AdmissionClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}
