use std::sync::Arc;

use async_trait::async_trait;
use scribe_core::Gateway;
use scribe_model::{TaskId, TaskStatus};

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Bridges an in-process [`Gateway`] to [`ApiHandler`].
pub struct GatewayAdapter {
    gateway: Arc<Gateway>,
}

impl GatewayAdapter {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ApiHandler for GatewayAdapter {
    async fn submit_transcription(&self, dirname: &str) -> Result<TaskId, ApiError> {
        self.gateway.submit(dirname).await.map_err(ApiError::from)
    }

    async fn task_status(&self, id: &TaskId) -> Result<TaskStatus, ApiError> {
        self.gateway.query(id).map_err(ApiError::from)
    }
}
