//! In-process transport: the gateway and the worker share one address space.
//!
//! Used by the `standalone` agent mode and by tests.
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{
    control::{ControlFeed, Publisher},
    demux::LinkRoutes,
    error::TransportError,
    frame::{ControlFrame, JobReply, JobRequest},
    job::{Dialer, Inbound, ReplySink},
};

/// Both ends of an in-process job channel and control channel.
pub struct InMemBus {
    /// Gateway side of the job channel.
    pub dialer: InMemDialer,
    /// Worker side of the job channel.
    pub inbox: mpsc::Receiver<Inbound>,
    /// Worker side of the control channel.
    pub publisher: InMemPublisher,
    /// Gateway side of the control channel.
    pub feed: ControlFeed,
}

/// Build a connected in-process bus. `inbox_capacity` bounds queued jobs.
pub fn bus(inbox_capacity: usize) -> InMemBus {
    let (tx, inbox) = mpsc::channel(inbox_capacity.max(1));
    let feed = ControlFeed::new();
    InMemBus {
        dialer: InMemDialer { inbox: tx },
        inbox,
        publisher: InMemPublisher { feed: feed.clone() },
        feed,
    }
}

#[derive(Clone)]
pub struct InMemDialer {
    inbox: mpsc::Sender<Inbound>,
}

#[async_trait]
impl Dialer for InMemDialer {
    async fn dial(
        &self,
        routes: Arc<LinkRoutes>,
    ) -> Result<mpsc::UnboundedSender<JobRequest>, TransportError> {
        if self.inbox.is_closed() {
            return Err(TransportError::Closed);
        }

        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<JobRequest>();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<JobReply>();
        let inbox = self.inbox.clone();

        tokio::spawn(async move {
            while let Some(request) = req_rx.recv().await {
                let reply = ReplySink::new(request.id.clone(), reply_tx.clone());
                if inbox.send(Inbound { request, reply }).await.is_err() {
                    trace!("worker inbox closed; in-memory job link ends");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                routes.route(reply);
            }
            routes.disconnect();
        });

        Ok(req_tx)
    }

    fn peer(&self) -> String {
        "in-memory".to_string()
    }
}

#[derive(Clone)]
pub struct InMemPublisher {
    feed: ControlFeed,
}

#[async_trait]
impl Publisher for InMemPublisher {
    async fn publish(&self, frame: ControlFrame) -> Result<usize, TransportError> {
        Ok(self.feed.deliver(frame))
    }
}

#[cfg(test)]
mod tests {
    use scribe_model::{TaskId, TaskStatus};

    use super::*;
    use crate::{demux::Demux, job::JobClient};

    #[tokio::test]
    async fn request_reaches_inbox_and_reply_returns() {
        let InMemBus {
            dialer, mut inbox, ..
        } = bus(8);
        let client = JobClient::new(Arc::new(dialer));

        let mut stream = client
            .dispatch(JobRequest {
                id: TaskId::from("t-1"),
                path: "/w/a/source.mp3".into(),
            })
            .await
            .unwrap();

        let job = inbox.recv().await.unwrap();
        assert_eq!(job.request.path, "/w/a/source.mp3");
        job.reply.send(TaskStatus::Running).unwrap();
        job.reply.send(TaskStatus::Completed).unwrap();

        assert_eq!(stream.recv().await, Some(TaskStatus::Running));
        assert_eq!(stream.recv().await, Some(TaskStatus::Completed));
    }

    #[tokio::test]
    async fn dial_fails_once_worker_is_gone() {
        let InMemBus { dialer, inbox, .. } = bus(1);
        drop(inbox);
        let routes = Arc::new(Arc::new(Demux::new()).open_link());
        let err = dialer.dial(routes).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn publisher_reaches_feed_subscribers() {
        let InMemBus {
            publisher, feed, ..
        } = bus(1);
        let mut rx = feed.subscribe();
        assert_eq!(publisher.publish(ControlFrame::terminate()).await.unwrap(), 1);
        assert!(rx.recv().await.unwrap().is_terminate());
    }
}
