//! Newline-delimited JSON transport over TCP.
//!
//! Every frame is one line produced by [`encode`](crate::encode). The worker binds both
//! endpoints; the gateway dials the job endpoint once and keeps a single control subscription.
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
};
use tokio_util::{
    codec::{Framed, FramedRead, FramedWrite, LinesCodec},
    sync::CancellationToken,
};
use tracing::{debug, info, trace, warn};

use crate::{
    control::{ControlFeed, Publisher},
    demux::LinkRoutes,
    error::TransportError,
    frame::{ControlFrame, JobReply, JobRequest, decode, encode},
    job::{Dialer, Inbound, ReplySink},
};

const MAX_LINE: usize = 64 * 1024;
const PUBLISH_TIMEOUT: Duration = Duration::from_millis(500);
const RECONNECT_MIN: Duration = Duration::from_millis(250);
const RECONNECT_MAX: Duration = Duration::from_secs(5);

#[inline]
fn codec() -> LinesCodec {
    LinesCodec::new_with_max_length(MAX_LINE)
}

// ============================================================================
// Job channel
// ============================================================================

/// Gateway side: dials the worker's job endpoint.
pub struct TcpDialer {
    addr: String,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(
        &self,
        routes: Arc<LinkRoutes>,
    ) -> Result<mpsc::UnboundedSender<JobRequest>, TransportError> {
        let stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|e| TransportError::Unreachable {
                    addr: self.addr.clone(),
                    reason: e.to_string(),
                })?;
        stream.set_nodelay(true)?;
        info!(addr = %self.addr, link = routes.id(), "job link established");

        let (mut sink, mut lines) = Framed::new(stream, codec()).split();
        let (tx, mut rx) = mpsc::unbounded_channel::<JobRequest>();
        let link = CancellationToken::new();

        let writer_link = link.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_link.cancelled() => break,
                    next = rx.recv() => {
                        let Some(request) = next else { break };
                        let line = match encode(&request) {
                            Ok(line) => line,
                            Err(e) => {
                                warn!(task_id = %request.id, error = %e, "unencodable job request dropped");
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(line).await {
                            warn!(error = %e, "job link write failed");
                            break;
                        }
                    }
                }
            }
            writer_link.cancel();
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = link.cancelled() => break,
                    next = lines.next() => match next {
                        Some(Ok(line)) => match decode::<JobReply>(&line) {
                            Ok(reply) => {
                                routes.route(reply);
                            }
                            Err(e) => warn!(error = %e, %line, "job reply rejected"),
                        },
                        Some(Err(e)) => {
                            warn!(error = %e, "job link read failed");
                            break;
                        }
                        None => {
                            debug!("job link closed by worker");
                            break;
                        }
                    }
                }
            }
            link.cancel();
            routes.disconnect();
        });

        Ok(tx)
    }

    fn peer(&self) -> String {
        self.addr.clone()
    }
}

/// Worker side: accepts job links and feeds every request into one shared inbox.
pub struct JobServer {
    listener: TcpListener,
}

impl JobServer {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept links until `cancel` fires.
    pub async fn serve(
        self,
        inbox: mpsc::Sender<Inbound>,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "job link accepted");
                        tokio::spawn(serve_link(stream, inbox.clone(), cancel.clone()));
                    }
                    Err(e) => warn!(error = %e, "job accept failed"),
                }
            }
        }
        debug!("job server stopped");
        Ok(())
    }
}

async fn serve_link(stream: TcpStream, inbox: mpsc::Sender<Inbound>, cancel: CancellationToken) {
    let (mut sink, mut lines) = Framed::new(stream, codec()).split();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<JobReply>();

    // Outlives the reader: queued jobs still hold reply sinks.
    tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            let line = match encode(&reply) {
                Ok(line) => line,
                Err(e) => {
                    warn!(task_id = %reply.id, error = %e, "unencodable reply dropped");
                    continue;
                }
            };
            if let Err(e) = sink.send(line).await {
                debug!(error = %e, "job link gone; dropping replies");
                break;
            }
        }
    });

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!(error = %e, "job link read failed");
                    break;
                }
                None => break,
            }
        };

        let request = match decode::<JobRequest>(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, %line, "job request rejected");
                continue;
            }
        };
        trace!(task_id = %request.id, "job queued");
        let reply = ReplySink::new(request.id.clone(), reply_tx.clone());
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = inbox.send(Inbound { request, reply }) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Control channel
// ============================================================================

type Subscribers = Arc<Mutex<HashMap<u64, FramedWrite<OwnedWriteHalf, LinesCodec>>>>;

/// Worker side: accepts subscribers and writes every published frame to each of them.
///
/// Each subscriber's read half is watched so a peer that hangs up is forgotten
/// without waiting for the next publish.
pub struct TcpPublisher {
    subscribers: Subscribers,
    local_addr: SocketAddr,
}

impl TcpPublisher {
    /// Bind and start accepting subscribers until `cancel` fires.
    pub async fn bind(addr: &str, cancel: CancellationToken) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let subscribers: Subscribers = Arc::new(Mutex::new(HashMap::new()));

        let accepted = Arc::clone(&subscribers);
        tokio::spawn(async move {
            let mut next_id = 0u64;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = listener.accept() => match next {
                        Ok((stream, peer)) => {
                            let id = next_id;
                            next_id += 1;
                            debug!(%peer, subscriber = id, "control subscriber attached");
                            let (read, write) = stream.into_split();
                            accepted.lock().await.insert(id, FramedWrite::new(write, codec()));
                            tokio::spawn(watch_subscriber(
                                id,
                                read,
                                Arc::clone(&accepted),
                                cancel.clone(),
                            ));
                        }
                        Err(e) => warn!(error = %e, "control accept failed"),
                    }
                }
            }
        });

        Ok(Self {
            subscribers,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of attached subscribers.
    pub async fn subscribers(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

/// Subscribers never write; end of input means the peer is gone.
async fn watch_subscriber(
    id: u64,
    read: OwnedReadHalf,
    subscribers: Subscribers,
    cancel: CancellationToken,
) {
    let mut incoming = FramedRead::new(read, codec());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = incoming.next() => match next {
                Some(Ok(line)) => trace!(subscriber = id, %line, "unexpected line from control subscriber"),
                Some(Err(e)) => {
                    debug!(subscriber = id, error = %e, "control subscriber read failed");
                    break;
                }
                None => break,
            }
        }
    }
    if subscribers.lock().await.remove(&id).is_some() {
        debug!(subscriber = id, "control subscriber detached");
    }
}

#[async_trait]
impl Publisher for TcpPublisher {
    async fn publish(&self, frame: ControlFrame) -> Result<usize, TransportError> {
        let line = encode(&frame)?;
        let mut subscribers = self.subscribers.lock().await;

        let mut alive = HashMap::with_capacity(subscribers.len());
        for (id, mut sink) in subscribers.drain() {
            match tokio::time::timeout(PUBLISH_TIMEOUT, sink.send(line.clone())).await {
                Ok(Ok(())) => {
                    alive.insert(id, sink);
                }
                Ok(Err(e)) => debug!(subscriber = id, error = %e, "control subscriber dropped"),
                Err(_) => debug!(subscriber = id, "control subscriber too slow; dropped"),
            }
        }
        *subscribers = alive;
        Ok(subscribers.len())
    }
}

/// Gateway side: one long-lived subscription feeding every monitor.
pub struct ControlSubscriber {
    addr: String,
    prefix: String,
}

impl ControlSubscriber {
    pub fn new(addr: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            prefix: prefix.into(),
        }
    }

    /// Keep a subscription attached (reconnecting with backoff) until `cancel` fires.
    pub async fn run(self, feed: ControlFeed, cancel: CancellationToken) {
        let mut delay = RECONNECT_MIN;
        while !cancel.is_cancelled() {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    delay = RECONNECT_MIN;
                    info!(addr = %self.addr, topic = %self.prefix, "control subscription attached");
                    if self.pump(stream, &feed, &cancel).await {
                        return;
                    }
                }
                Err(e) => trace!(addr = %self.addr, error = %e, "control endpoint not reachable"),
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(RECONNECT_MAX);
        }
    }

    /// Returns `true` when stopped by cancellation.
    async fn pump(&self, stream: TcpStream, feed: &ControlFeed, cancel: &CancellationToken) -> bool {
        let mut lines = FramedRead::new(stream, codec());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return true,
                next = lines.next() => match next {
                    Some(Ok(line)) => match decode::<ControlFrame>(&line) {
                        Ok(frame) if frame.matches(&self.prefix) => {
                            let reached = feed.deliver(frame);
                            debug!(reached, "control frame fanned out");
                        }
                        Ok(frame) => trace!(topic = %frame.topic, "control frame filtered"),
                        Err(e) => warn!(error = %e, "control frame rejected"),
                    },
                    Some(Err(e)) => {
                        warn!(error = %e, "control subscription read failed");
                        return false;
                    }
                    None => {
                        debug!("control subscription closed by worker");
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use scribe_model::{TaskId, TaskStatus};

    use super::*;
    use crate::{demux::Demux, frame::TERMINATE, job::JobClient};

    #[tokio::test]
    async fn job_roundtrip_over_tcp() {
        let cancel = CancellationToken::new();
        let server = JobServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (inbox_tx, mut inbox) = mpsc::channel(4);
        tokio::spawn(server.serve(inbox_tx, cancel.clone()));

        let client = JobClient::new(Arc::new(TcpDialer::new(addr)));
        let mut stream = client
            .dispatch(JobRequest {
                id: TaskId::from("t-1"),
                path: "/w/a/source.mp3".into(),
            })
            .await
            .unwrap();

        let job = inbox.recv().await.unwrap();
        assert_eq!(job.request.id, TaskId::from("t-1"));
        job.reply.send(TaskStatus::Running).unwrap();
        job.reply.send(TaskStatus::Failed).unwrap();

        assert_eq!(stream.recv().await, Some(TaskStatus::Running));
        assert_eq!(stream.recv().await, Some(TaskStatus::Failed));
        cancel.cancel();
    }

    #[tokio::test]
    async fn dial_to_closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let dialer = TcpDialer::new(addr);
        let routes = Arc::new(Arc::new(Demux::new()).open_link());
        let err = dialer.dial(routes).await.unwrap_err();
        assert!(matches!(err, TransportError::Unreachable { .. }));
    }

    #[tokio::test]
    async fn terminate_reaches_subscribed_feed() {
        let cancel = CancellationToken::new();
        let publisher = TcpPublisher::bind("127.0.0.1:0", cancel.clone())
            .await
            .unwrap();
        let feed = ControlFeed::new();
        let mut monitor = feed.subscribe();

        tokio::spawn(
            ControlSubscriber::new(publisher.local_addr().to_string(), TERMINATE)
                .run(feed.clone(), cancel.clone()),
        );

        // Publishing is best-effort; retry until the subscription handshake completes.
        let mut reached = 0;
        for _ in 0..100 {
            reached = publisher.publish(ControlFrame::terminate()).await.unwrap();
            if reached > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(reached, 1);

        let frame = tokio::time::timeout(Duration::from_secs(5), monitor.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.is_terminate());
        cancel.cancel();
    }

    async fn wait_for_subscribers(publisher: &TcpPublisher, expected: usize) {
        for _ in 0..250 {
            if publisher.subscribers().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "publisher holds {} subscribers, expected {expected}",
            publisher.subscribers().await
        );
    }

    #[tokio::test]
    async fn departed_subscribers_are_forgotten_without_publishing() {
        let cancel = CancellationToken::new();
        let publisher = TcpPublisher::bind("127.0.0.1:0", cancel.clone())
            .await
            .unwrap();

        let mut peers = Vec::new();
        for _ in 0..50 {
            peers.push(TcpStream::connect(publisher.local_addr()).await.unwrap());
        }
        wait_for_subscribers(&publisher, 50).await;

        drop(peers);
        wait_for_subscribers(&publisher, 0).await;

        assert_eq!(publisher.publish(ControlFrame::terminate()).await.unwrap(), 0);
        cancel.cancel();
    }
}
