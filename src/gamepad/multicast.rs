//! Single-writer broadcast with a one-slot replay cache.
//!
//! One producer task publishes values; any number of consumers subscribe and
//! see the identical sequence. A consumer that attaches after emission has
//! started is handed the most recent value immediately instead of waiting a
//! full tick, and attaching never causes the producer to publish again.

use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Fan-out channel with latest-value replay for late subscribers.
pub struct Multicast<T: Clone> {
    events: broadcast::Sender<T>,
    latest: watch::Sender<Option<T>>,
}

impl<T: Clone> Multicast<T> {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (latest, _) = watch::channel(None);
        Self { events, latest }
    }

    /// Store `value` in the replay slot and broadcast it to all live
    /// subscribers. Publishing with no subscribers attached is not an error.
    pub fn publish(&self, value: T) {
        self.latest.send_replace(Some(value.clone()));
        let _ = self.events.send(value);
    }

    /// Empty the replay slot. Subscribers attaching afterwards wait for the
    /// next published value instead of reading a stale one.
    pub fn clear(&self) {
        self.latest.send_replace(None);
        debug!("multicast replay slot cleared");
    }

    /// Attach a new consumer. The receiver yields the cached latest value
    /// first, if one exists, then live values in publish order.
    pub fn subscribe(&self) -> Replay<T> {
        let live = self.events.subscribe();
        let cached = self.latest.borrow().clone();
        Replay { cached, live }
    }
}

/// Receiving half of a [`Multicast`] subscription.
pub struct Replay<T: Clone> {
    cached: Option<T>,
    live: broadcast::Receiver<T>,
}

impl<T: Clone> Replay<T> {
    /// Wait for the next value: the replayed cache entry on the first call
    /// after attaching mid-stream, live values afterwards.
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        if let Some(value) = self.cached.take() {
            return Ok(value);
        }
        self.live.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Result<T, broadcast::error::TryRecvError> {
        if let Some(value) = self.cached.take() {
            return Ok(value);
        }
        self.live.try_recv()
    }
}
