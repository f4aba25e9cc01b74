use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("spawn {program} failed: {reason}")]
    Spawn { program: String, reason: String },

    #[error("{program} exited unsuccessfully: {status}")]
    NonZeroExit { program: String, status: String },

    #[error("engine output is not a transcription: {0}")]
    EngineOutput(#[source] serde_json::Error),

    #[error("invalid audio path: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("job panicked: {0}")]
    Panicked(String),
}
