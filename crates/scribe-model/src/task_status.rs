use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Latest known state of a transcription task.
///
/// Wire and persisted form is the lowercase token (`"pending"`, `"running"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted by the gateway, not yet acknowledged by the worker.
    Pending,
    /// Worker acknowledged the job and is transcribing it.
    Running,
    /// Worker produced every artifact.
    Completed,
    /// Worker hit a fault while processing the job.
    Failed,
    /// Gateway watchdog expired before a terminal reply arrived.
    Timeout,
    /// Worker announced termination while the task was in flight.
    Interrupted,
    /// Query-time sentinel for unknown identifiers. Never stored.
    Undefined,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status token: {0:?}")]
pub struct UnknownStatus(pub String);

impl TaskStatus {
    /// Returns `true` if the task will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed
                | TaskStatus::Failed
                | TaskStatus::Timeout
                | TaskStatus::Interrupted
        )
    }

    /// Returns `true` if the task is still tracked by a monitor.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
            TaskStatus::Interrupted => "interrupted",
            TaskStatus::Undefined => "undefined",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "timeout" => Ok(TaskStatus::Timeout),
            "interrupted" => Ok(TaskStatus::Interrupted),
            "undefined" => Ok(TaskStatus::Undefined),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
