use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport channel closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("peer unreachable at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },
}

#[cfg(feature = "tcp")]
impl From<tokio_util::codec::LinesCodecError> for TransportError {
    fn from(e: tokio_util::codec::LinesCodecError) -> Self {
        match e {
            tokio_util::codec::LinesCodecError::Io(io) => TransportError::Io(io),
            other => TransportError::Codec(other.to_string()),
        }
    }
}
