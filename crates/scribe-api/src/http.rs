use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
};
use scribe_model::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// Text exposition of service metrics, mounted at `GET /metrics`.
pub trait MetricsRender: Send + Sync + 'static {
    fn render(&self) -> Result<String, ApiError>;
}

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    metrics: Option<Arc<dyn MetricsRender>>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRender>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /transcription - Submit a directory
    /// - GET /monitoring?task_id=.. - Task status
    /// - GET /monitoring/{task_id} - Task status
    /// - GET /metrics - Prometheus text format, only when metrics are attached
    pub fn router(self) -> Router {
        let router = Router::new()
            .route("/transcription", post(submit_transcription::<H>))
            .route("/monitoring", get(query_status::<H>))
            .route("/monitoring/{task_id}", get(path_status::<H>))
            .with_state(self.handler);

        match self.metrics {
            Some(metrics) => router.route(
                "/metrics",
                get(move || {
                    let metrics = metrics.clone();
                    async move { render_metrics(metrics.as_ref()) }
                }),
            ),
            None => router,
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SubmitRequest {
    dirname: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmitResponse {
    task_id: TaskId,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusQuery {
    task_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    task_id: TaskId,
    task_status: TaskStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /transcription
async fn submit_transcription<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if req.dirname.trim().is_empty() {
        return Err(ApiError::InvalidRequest("dirname is empty".into()));
    }
    let task_id = handler.submit_transcription(&req.dirname).await?;
    debug!(%task_id, dirname = %req.dirname, "transcription accepted");

    Ok(Json(SubmitResponse { task_id }))
}

/// GET /monitoring?task_id=..
async fn query_status<H>(
    State(handler): State<Arc<H>>,
    Query(q): Query<StatusQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    status_of(handler.as_ref(), TaskId::from(q.task_id)).await
}

/// GET /monitoring/{task_id}
async fn path_status<H>(
    State(handler): State<Arc<H>>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    status_of(handler.as_ref(), TaskId::from(task_id)).await
}

async fn status_of<H>(handler: &H, task_id: TaskId) -> Result<Json<StatusResponse>, ApiError>
where
    H: ApiHandler,
{
    let task_status = handler.task_status(&task_id).await?;
    Ok(Json(StatusResponse {
        task_id,
        task_status,
    }))
}

/// GET /metrics
fn render_metrics(metrics: &dyn MetricsRender) -> Result<impl IntoResponse + use<>, ApiError> {
    let body = metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
