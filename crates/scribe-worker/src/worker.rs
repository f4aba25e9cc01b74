use std::{any::Any, panic::AssertUnwindSafe, path::Path, sync::Arc};

use futures::FutureExt;
use scribe_model::TaskStatus;
use scribe_transport::{ControlFrame, Inbound, Publisher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{ArtifactPaths, Renderer, TranscriptionEngine, WorkerConfig, WorkerError};

/// Jobs finished by one `Worker::run`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub completed: usize,
    pub failed: usize,
}

pub struct Worker {
    engine: Arc<dyn TranscriptionEngine>,
    renderer: Arc<dyn Renderer>,
    cfg: WorkerConfig,
}

impl Worker {
    pub fn new(
        engine: Arc<dyn TranscriptionEngine>,
        renderer: Arc<dyn Renderer>,
        cfg: WorkerConfig,
    ) -> Self {
        Self {
            engine,
            renderer,
            cfg,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    /// Serves jobs one at a time until `shutdown` fires or the inbox closes.
    ///
    /// The running job is always finished. On exit a `TERMINATE` frame is
    /// published so requesters stop waiting on this worker.
    pub async fn run(
        &self,
        mut inbox: mpsc::Receiver<Inbound>,
        publisher: &dyn Publisher,
        shutdown: CancellationToken,
    ) -> WorkerReport {
        let mut report = WorkerReport::default();
        info!(
            target: "scribe.worker",
            engine = self.engine.name(),
            poll = ?self.cfg.poll_interval,
            "worker started"
        );

        loop {
            if shutdown.is_cancelled() {
                info!(target: "scribe.worker", "shutdown requested");
                break;
            }

            let job = match tokio::time::timeout(self.cfg.poll_interval, inbox.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    info!(target: "scribe.worker", "inbox closed");
                    break;
                }
                Err(_) => continue,
            };

            match self.handle(job).await {
                TaskStatus::Completed => report.completed += 1,
                _ => report.failed += 1,
            }
        }

        match publisher.publish(ControlFrame::terminate()).await {
            Ok(reached) => info!(target: "scribe.worker", reached, "termination published"),
            Err(e) => warn!(target: "scribe.worker", error = %e, "termination publish failed"),
        }
        info!(
            target: "scribe.worker",
            completed = report.completed,
            failed = report.failed,
            "worker stopped"
        );
        report
    }

    #[instrument(level = "info", target = "scribe.worker", skip_all, fields(task_id = %job.request.id))]
    async fn handle(&self, job: Inbound) -> TaskStatus {
        let Inbound { request, reply } = job;

        if let Err(e) = reply.send(TaskStatus::Running) {
            debug!(error = %e, "requester gone; processing anyway");
        }

        let audio = Path::new(&request.path);
        let status = match AssertUnwindSafe(self.process(audio)).catch_unwind().await {
            Ok(Ok(paths)) => {
                info!(video = %paths.captioned_video.display(), "job completed");
                TaskStatus::Completed
            }
            Ok(Err(e)) => {
                error!(error = %e, path = %request.path, "job failed");
                TaskStatus::Failed
            }
            Err(panic) => {
                let e = WorkerError::Panicked(panic_message(panic.as_ref()));
                error!(error = %e, path = %request.path, "job failed");
                TaskStatus::Failed
            }
        };

        if let Err(e) = reply.send(status) {
            debug!(error = %e, %status, "requester gone; final status dropped");
        }
        status
    }

    async fn process(&self, audio: &Path) -> Result<ArtifactPaths, WorkerError> {
        let paths = ArtifactPaths::beside(audio)?;

        let transcription = self.engine.transcribe(audio, &self.cfg.params).await?;
        debug!(segments = transcription.segments.len(), "transcribed");

        paths.write_documents(&transcription).await?;
        self.renderer.blank_video(audio, &paths.blank_video).await?;
        self.renderer
            .burn_captions(&paths.blank_video, &paths.captions, &paths.captioned_video)
            .await?;
        Ok(paths)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
