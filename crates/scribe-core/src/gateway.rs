use std::sync::Arc;

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, warn};

use scribe_model::{TaskId, TaskStatus};
use scribe_transport::{ControlFeed, JobClient};

use crate::{
    admission::AdmissionPool,
    config::GatewayConfig,
    error::CoreError,
    ledger::Ledger,
    metrics::MetricsHandle,
    monitor::{Monitor, MonitorContext},
};

/// Accepts submissions, answers status queries and owns the ledger lifecycle.
pub struct Gateway {
    cfg: GatewayConfig,
    ctx: MonitorContext,
    monitors: TaskTracker,
}

impl Gateway {
    /// Load the previous ledger snapshot (if any) and prepare the shared state.
    pub async fn startup(
        cfg: GatewayConfig,
        jobs: JobClient,
        feed: ControlFeed,
        metrics: MetricsHandle,
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        let ledger = Ledger::load(&cfg.ledger_path()).await?;

        let ctx = MonitorContext {
            ledger,
            jobs: Arc::new(jobs),
            feed,
            pool: AdmissionPool::new(cfg.admission_capacity),
            liveness: CancellationToken::new(),
            cfg: cfg.monitor.clone(),
            metrics,
        };
        info!(
            workdir = %cfg.workdir.display(),
            tasks = ctx.ledger.len(),
            capacity = cfg.admission_capacity,
            "gateway is ready"
        );

        Ok(Self {
            cfg,
            ctx,
            monitors: TaskTracker::new(),
        })
    }

    /// Clear liveness on Ctrl-C: monitors wind down, nothing is aborted forcefully.
    pub fn install_interrupt_handler(&self) {
        let liveness = self.ctx.liveness.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("interrupt received; stopping monitors");
                        liveness.cancel();
                    }
                    Err(e) => error!(error = %e, "failed to listen for interrupt"),
                },
                _ = liveness.cancelled() => {}
            }
        });
    }

    /// Accept a transcription request for `<workdir>/<dirname>/<source_file>`.
    ///
    /// Returns as soon as the task is recorded; the job itself is tracked by a background monitor.
    #[instrument(level = "debug", skip(self))]
    pub async fn submit(&self, dirname: &str) -> Result<TaskId, CoreError> {
        if self.ctx.liveness.is_cancelled() {
            return Err(CoreError::ShuttingDown);
        }

        let path = self.cfg.source_path(dirname)?;
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            warn!(path = %path.display(), "source audio missing");
            return Err(CoreError::NotFound(path));
        }

        let id = TaskId::generate();
        self.ctx.ledger.insert_pending(id.clone());
        self.ctx.metrics.task_submitted();

        let monitor = Monitor::new(id.clone(), path.clone(), self.ctx.clone());
        let task_id = id.clone();
        self.monitors.spawn(async move {
            // A panicking monitor must not take the gateway down; its slot is released on unwind.
            match tokio::spawn(monitor.run()).await {
                Ok(outcome) => debug!(%task_id, ?outcome, "monitor finished"),
                Err(e) => error!(%task_id, error = %e, "monitor faulted; ledger keeps its last value"),
            }
        });

        debug!(task_id = %id, path = %path.display(), "transcription scheduled");
        Ok(id)
    }

    /// Current status of a task. Unknown identifiers yield [`CoreError::Undefined`].
    pub fn query(&self, id: &TaskId) -> Result<TaskStatus, CoreError> {
        self.ctx
            .ledger
            .get(id)
            .ok_or_else(|| CoreError::Undefined(id.clone()))
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ctx.ledger
    }

    pub fn pool(&self) -> &AdmissionPool {
        &self.ctx.pool
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.cfg
    }

    /// Token cleared by the interrupt handler; cancelling it stops every monitor.
    pub fn liveness(&self) -> CancellationToken {
        self.ctx.liveness.clone()
    }

    /// Number of monitors that have not finished yet.
    pub fn active_monitors(&self) -> usize {
        self.monitors.len()
    }

    /// Stop monitors, release the job link and persist the ledger.
    ///
    /// Returns the number of persisted tasks.
    pub async fn shutdown(&self) -> Result<usize, CoreError> {
        debug!(
            liveness = !self.ctx.liveness.is_cancelled(),
            "gateway shutting down"
        );
        self.ctx.liveness.cancel();
        self.monitors.close();
        if tokio::time::timeout(self.cfg.drain_timeout, self.monitors.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.monitors.len(),
                "monitors did not drain in time"
            );
        }
        self.ctx.pool.close();
        self.ctx.jobs.close().await;

        self.ctx.ledger.persist(&self.cfg.ledger_path()).await
    }
}
