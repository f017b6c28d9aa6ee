//! # Broadcast Hub
//!
//! Republishes the executor's single-consumer result stream to any number
//! of subscribers. Each subscriber owns an independent bounded queue and
//! observes every result in emission order exactly once.
//!
//! Backpressure policy: uniform upstream. When any subscriber's queue is
//! full the hub waits for it, which in turn stalls the executor through its
//! own bounded channel. No result is ever dropped for a live subscriber; a
//! subscriber that hangs up early simply stops receiving.
//!
//! Subscriptions must be taken before [`Broadcast::spawn`]; the hub does
//! not support attaching mid-stream.

use super::OpResult;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct Broadcast {
    source: mpsc::Receiver<OpResult>,
    senders: Vec<mpsc::Sender<OpResult>>,
    capacity: usize,
}

impl Broadcast {
    /// Wrap the executor's output stream. `capacity` bounds each
    /// subscriber's queue.
    pub fn new(source: mpsc::Receiver<OpResult>, capacity: usize) -> Self {
        Self {
            source,
            senders: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a subscriber and return its result stream.
    pub fn subscribe(&mut self) -> mpsc::Receiver<OpResult> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.senders.push(tx);
        rx
    }

    /// Start pumping results to all subscribers.
    ///
    /// The task finishes when the source closes; dropping the subscriber
    /// senders then closes every subscription, so observers see the same
    /// end-of-stream the executor emitted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.pump())
    }

    async fn pump(mut self) {
        let mut delivered: u64 = 0;
        while let Some(result) = self.source.recv().await {
            for sender in &self.senders {
                // A closed subscription means that observer is done early;
                // the rest still get every result.
                let _ = sender.send(result.clone()).await;
            }
            delivered += 1;
        }
        debug!(
            "broadcast hub closed after {} results to {} subscribers",
            delivered,
            self.senders.len()
        );
    }
}
