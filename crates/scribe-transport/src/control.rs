use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{error::TransportError, frame::ControlFrame};

const FEED_CAPACITY: usize = 64;

/// Worker side of the control channel.
///
/// Delivery is best-effort: subscribers that are not attached at publish time miss the frame.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Publish a frame; returns how many subscribers it was handed to.
    async fn publish(&self, frame: ControlFrame) -> Result<usize, TransportError>;
}

/// Gateway-local fan-out of the single shared control subscription.
#[derive(Clone)]
pub struct ControlFeed {
    tx: broadcast::Sender<ControlFrame>,
}

impl ControlFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Attach a new monitor. Only frames published after this call are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlFrame> {
        self.tx.subscribe()
    }

    /// Push a frame to every attached monitor; returns the number reached.
    pub fn deliver(&self, frame: ControlFrame) -> usize {
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ControlFeed {
    fn default() -> Self {
        Self::new()
    }
}
