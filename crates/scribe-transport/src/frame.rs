use serde::{Deserialize, Serialize, de::DeserializeOwned};

use scribe_model::{TaskId, TaskStatus};

use crate::error::TransportError;

/// Control topic announcing worker termination.
pub const TERMINATE: &str = "TERMINATE";

/// Job channel request: one audio file to transcribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Correlation id; echoed on every reply.
    pub id: TaskId,
    /// Resolved path of the source audio.
    pub path: String,
}

/// Job channel reply: one status token for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReply {
    pub id: TaskId,
    pub status: TaskStatus,
}

/// Control channel message. Subscribers filter by topic prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub topic: String,
    #[serde(default)]
    pub payload: String,
}

impl ControlFrame {
    pub fn terminate() -> Self {
        Self {
            topic: TERMINATE.to_string(),
            payload: String::new(),
        }
    }

    #[inline]
    pub fn matches(&self, prefix: &str) -> bool {
        self.topic.starts_with(prefix)
    }

    #[inline]
    pub fn is_terminate(&self) -> bool {
        self.topic == TERMINATE
    }
}

/// Encode a frame as a single line of JSON (no trailing newline).
pub fn encode<T: Serialize>(frame: &T) -> Result<String, TransportError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode one line into a frame.
///
/// Status tokens are a closed set: a reply carrying an unknown token is rejected here.
pub fn decode<T: DeserializeOwned>(line: &str) -> Result<T, TransportError> {
    Ok(serde_json::from_str(line.trim_end())?)
}
