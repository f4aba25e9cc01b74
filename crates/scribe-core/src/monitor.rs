use std::{path::PathBuf, sync::Arc};

use tokio::{sync::broadcast::error::RecvError, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use scribe_model::{TaskId, TaskStatus};
use scribe_transport::{ControlFeed, JobClient, JobRequest, ReplyStream};

use crate::{
    admission::AdmissionPool, config::MonitorConfig, ledger::Ledger, metrics::MetricsHandle,
};

/// Why a monitor stopped without a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Liveness token cancelled; the ledger keeps its last value.
    Shutdown,
    /// The admission pool was closed while waiting for a slot.
    AdmissionClosed,
}

/// Terminal state of one monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Completed,
    Failed,
    Timeout,
    Interrupted,
    Aborted(AbortReason),
}

impl MonitorOutcome {
    /// Ledger value this outcome corresponds to; `None` for aborted monitors.
    pub fn status(&self) -> Option<TaskStatus> {
        match self {
            MonitorOutcome::Completed => Some(TaskStatus::Completed),
            MonitorOutcome::Failed => Some(TaskStatus::Failed),
            MonitorOutcome::Timeout => Some(TaskStatus::Timeout),
            MonitorOutcome::Interrupted => Some(TaskStatus::Interrupted),
            MonitorOutcome::Aborted(_) => None,
        }
    }

    fn from_terminal(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Completed => Some(MonitorOutcome::Completed),
            TaskStatus::Failed => Some(MonitorOutcome::Failed),
            TaskStatus::Timeout => Some(MonitorOutcome::Timeout),
            TaskStatus::Interrupted => Some(MonitorOutcome::Interrupted),
            TaskStatus::Pending | TaskStatus::Running | TaskStatus::Undefined => None,
        }
    }
}

/// Shared handles every monitor needs. Cheap to clone.
#[derive(Clone)]
pub struct MonitorContext {
    pub ledger: Ledger,
    pub jobs: Arc<JobClient>,
    pub feed: ControlFeed,
    pub pool: AdmissionPool,
    pub liveness: CancellationToken,
    pub cfg: MonitorConfig,
    pub metrics: MetricsHandle,
}

/// Per-task dispatch state machine.
///
/// `Dispatching -> Polling -> {Completed, Failed, Timeout, Interrupted, Aborted}`.
/// The worker is the only source of `Running`, `Completed` and `Failed`; the monitor
/// itself only ever writes `Timeout` or `Interrupted`, and never over a terminal value.
pub struct Monitor {
    id: TaskId,
    path: PathBuf,
    ctx: MonitorContext,
}

impl Monitor {
    pub fn new(id: TaskId, path: PathBuf, ctx: MonitorContext) -> Self {
        Self { id, path, ctx }
    }

    /// Hold an admission slot for the whole tracking run and release it on every exit path.
    #[instrument(level = "debug", name = "monitor", skip(self), fields(task_id = %self.id))]
    pub async fn run(self) -> MonitorOutcome {
        let slot = tokio::select! {
            slot = self.ctx.pool.acquire() => match slot {
                Ok(slot) => slot,
                Err(e) => {
                    warn!(error = %e, "no admission slot");
                    return MonitorOutcome::Aborted(AbortReason::AdmissionClosed);
                }
            },
            _ = self.ctx.liveness.cancelled() => {
                debug!("shutdown requested before admission");
                return MonitorOutcome::Aborted(AbortReason::Shutdown);
            }
        };
        self.ctx.metrics.admission_in_use(self.ctx.pool.in_use());

        let outcome = self.track().await;

        drop(slot);
        self.ctx.metrics.admission_in_use(self.ctx.pool.in_use());
        if let Some(status) = outcome.status() {
            self.ctx.metrics.task_finished(status);
        }
        debug!(?outcome, "monitor closed");
        outcome
    }

    async fn track(&self) -> MonitorOutcome {
        // Subscribe before dispatch so a termination racing the job is not missed.
        let mut control = self.ctx.feed.subscribe();
        let mut control_open = true;

        let request = JobRequest {
            id: self.id.clone(),
            path: self.path.to_string_lossy().into_owned(),
        };
        let mut acknowledged = false;
        let mut deadline = self.ctx.cfg.ack_timeout.map(|t| Instant::now() + t);

        // A job that could not be sent is settled like a lost link.
        let mut replies = match self.ctx.jobs.dispatch(request).await {
            Ok(replies) => {
                debug!(path = %self.path.display(), "job scheduled");
                Some(replies)
            }
            Err(e) => {
                error!(error = %e, "job dispatch failed; waiting for termination or the deadline");
                deadline.get_or_insert_with(|| Instant::now() + self.ctx.cfg.watchdog);
                None
            }
        };

        loop {
            if self.ctx.liveness.is_cancelled() {
                debug!("liveness lost; monitor drains");
                return MonitorOutcome::Aborted(AbortReason::Shutdown);
            }
            if let Some(at) = deadline
                && Instant::now() >= at
            {
                return self.expire(acknowledged);
            }

            tokio::select! {
                biased;
                next = next_reply(&mut replies), if replies.is_some() => match next {
                    Some(status) => {
                        if let Some(outcome) = self.on_reply(status, &mut acknowledged, &mut deadline) {
                            return outcome;
                        }
                    }
                    None => {
                        // Only a termination notice or the deadline can settle the task now.
                        warn!("job link lost before a terminal reply");
                        replies = None;
                        deadline.get_or_insert_with(|| Instant::now() + self.ctx.cfg.watchdog);
                    }
                },
                frame = control.recv(), if control_open => match frame {
                    Ok(frame) if frame.is_terminate() => return self.interrupt(),
                    Ok(frame) => trace!(topic = %frame.topic, "control frame ignored"),
                    Err(RecvError::Lagged(missed)) => warn!(missed, "control feed lagged"),
                    Err(RecvError::Closed) => control_open = false,
                },
                _ = self.ctx.liveness.cancelled() => {}
                _ = tokio::time::sleep(self.ctx.cfg.poll_interval) => {}
            }
        }
    }

    fn on_reply(
        &self,
        status: TaskStatus,
        acknowledged: &mut bool,
        deadline: &mut Option<Instant>,
    ) -> Option<MonitorOutcome> {
        match status {
            TaskStatus::Running => {
                self.ctx.ledger.set(&self.id, TaskStatus::Running);
                if !*acknowledged {
                    *acknowledged = true;
                    *deadline = Some(Instant::now() + self.ctx.cfg.watchdog);
                    debug!("running on the worker; watchdog armed");
                }
                None
            }
            TaskStatus::Completed => {
                self.ctx.ledger.set(&self.id, TaskStatus::Completed);
                debug!("task has finished");
                Some(MonitorOutcome::Completed)
            }
            TaskStatus::Failed => {
                self.ctx.ledger.set(&self.id, TaskStatus::Failed);
                warn!("worker reported failure");
                Some(MonitorOutcome::Failed)
            }
            TaskStatus::Pending
            | TaskStatus::Timeout
            | TaskStatus::Interrupted
            | TaskStatus::Undefined => {
                warn!(%status, "status is never emitted by the worker; ignored");
                None
            }
        }
    }

    fn expire(&self, acknowledged: bool) -> MonitorOutcome {
        match self.ctx.ledger.mark_unless_terminal(&self.id, TaskStatus::Timeout) {
            Ok(_) => {
                warn!(acknowledged, "watchdog expired; task timed out");
                MonitorOutcome::Timeout
            }
            Err(current) => MonitorOutcome::from_terminal(current)
                .unwrap_or(MonitorOutcome::Timeout),
        }
    }

    fn interrupt(&self) -> MonitorOutcome {
        match self
            .ctx
            .ledger
            .mark_unless_terminal(&self.id, TaskStatus::Interrupted)
        {
            Ok(_) => {
                warn!("task was interrupted by worker termination");
                MonitorOutcome::Interrupted
            }
            Err(current) => {
                debug!(%current, "termination arrived after a terminal status; kept");
                MonitorOutcome::from_terminal(current).unwrap_or(MonitorOutcome::Interrupted)
            }
        }
    }
}

async fn next_reply(replies: &mut Option<ReplyStream>) -> Option<TaskStatus> {
    match replies {
        Some(stream) => stream.recv().await,
        None => None,
    }
}
