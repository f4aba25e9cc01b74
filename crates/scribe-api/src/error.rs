use scribe_core::CoreError;
use scribe_model::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("task undefined: {0}")]
    TaskUndefined(TaskId),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(path) => ApiError::SourceNotFound(path.display().to_string()),
            CoreError::Undefined(id) => ApiError::TaskUndefined(id),
            CoreError::InvalidDirname(d) => ApiError::InvalidRequest(format!("dirname {d:?}")),
            e @ (CoreError::ShuttingDown | CoreError::AdmissionClosed) => {
                ApiError::Unavailable(e.to_string())
            }
            e => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};
        use scribe_model::TaskStatus;

        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SourceNotFound(_) | ApiError::TaskUndefined(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = match self {
            ApiError::TaskUndefined(id) => serde_json::json!({
                "task_id": id,
                "task_status": TaskStatus::Undefined,
            }),
            other => serde_json::json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
