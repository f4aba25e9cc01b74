use async_trait::async_trait;
use scribe_model::{TaskId, TaskStatus};

use crate::error::ApiError;

/// Transcription service API handler.
///
/// Abstracts the backend so the HTTP surface can be mounted over the bundled
/// [`GatewayAdapter`](crate::GatewayAdapter) or a custom implementation
/// (auth, rate limiting, a remote gateway).
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Submit `<workdir>/<dirname>` for transcription.
    async fn submit_transcription(&self, dirname: &str) -> Result<TaskId, ApiError>;

    /// Current status of a task; unknown ids are [`ApiError::TaskUndefined`].
    async fn task_status(&self, id: &TaskId) -> Result<TaskStatus, ApiError>;
}
