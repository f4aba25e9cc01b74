use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, instrument};

use scribe_model::{TaskId, TaskStatus};

use crate::{
    demux::{Demux, LinkRoutes},
    error::TransportError,
    frame::{JobReply, JobRequest},
};

/// Establishes a job link to the worker.
///
/// The returned sender accepts requests for the lifetime of the link; replies read
/// from the link must be handed to `routes`, and `routes.disconnect()` called once
/// the link is gone. When the link dies the sender closes.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    async fn dial(
        &self,
        routes: Arc<LinkRoutes>,
    ) -> Result<mpsc::UnboundedSender<JobRequest>, TransportError>;

    /// Human-readable peer description for logs.
    fn peer(&self) -> String;
}

/// Gateway side of the job channel: one multiplexed link shared by every monitor.
pub struct JobClient {
    dialer: Arc<dyn Dialer>,
    demux: Arc<Demux>,
    link: Mutex<Option<Link>>,
}

struct Link {
    routes: Arc<LinkRoutes>,
    tx: mpsc::UnboundedSender<JobRequest>,
}

impl JobClient {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self {
            dialer,
            demux: Arc::new(Demux::new()),
            link: Mutex::new(None),
        }
    }

    /// Send a job and return the stream its replies will arrive on.
    ///
    /// The route is registered before the request leaves, so an immediate
    /// acknowledgment cannot be lost. The link is (re)dialed lazily.
    #[instrument(level = "debug", skip(self, request), fields(task_id = %request.id))]
    pub async fn dispatch(&self, request: JobRequest) -> Result<ReplyStream, TransportError> {
        let id = request.id.clone();
        let rx = self.demux.register(id.clone());
        let stream = ReplyStream {
            id,
            rx,
            demux: Arc::clone(&self.demux),
        };

        let mut link = self.link.lock().await;
        let (routes, sender) = match link.as_ref() {
            Some(current) if !current.tx.is_closed() => {
                (Arc::clone(&current.routes), current.tx.clone())
            }
            _ => {
                let routes = Arc::new(self.demux.open_link());
                debug!(peer = %self.dialer.peer(), link = routes.id(), "dialing job link");
                let tx = self.dialer.dial(Arc::clone(&routes)).await?;
                *link = Some(Link {
                    routes: Arc::clone(&routes),
                    tx: tx.clone(),
                });
                (routes, tx)
            }
        };
        drop(link);

        self.demux.bind(stream.id(), &routes);
        sender.send(request).map_err(|_| TransportError::Closed)?;
        Ok(stream)
    }

    /// Number of monitors currently waiting for replies.
    pub fn in_flight(&self) -> usize {
        self.demux.len()
    }

    /// Drop the current link; every pending route observes a closed stream.
    pub async fn close(&self) {
        self.link.lock().await.take();
        self.demux.disconnect();
    }
}

/// Replies for one dispatched job. Releases its route when dropped.
pub struct ReplyStream {
    id: TaskId,
    rx: mpsc::UnboundedReceiver<TaskStatus>,
    demux: Arc<Demux>,
}

impl ReplyStream {
    /// Next status for this job, or `None` once the link is gone.
    pub async fn recv(&mut self) -> Option<TaskStatus> {
        self.rx.recv().await
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        self.demux.release(&self.id);
    }
}

/// One job as seen by the worker, with the way back to its requester.
#[derive(Debug)]
pub struct Inbound {
    pub request: JobRequest,
    pub reply: ReplySink,
}

/// Worker-side handle used to emit status replies for one job.
#[derive(Debug, Clone)]
pub struct ReplySink {
    id: TaskId,
    tx: mpsc::UnboundedSender<JobReply>,
}

impl ReplySink {
    pub fn new(id: TaskId, tx: mpsc::UnboundedSender<JobReply>) -> Self {
        Self { id, tx }
    }

    /// Emit a status for this job. Fails only if the requester's link is gone.
    pub fn send(&self, status: TaskStatus) -> Result<(), TransportError> {
        self.tx
            .send(JobReply {
                id: self.id.clone(),
                status,
            })
            .map_err(|_| TransportError::Closed)
    }
}
