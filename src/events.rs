// src/events.rs
// Bounded drop-oldest handoff of batch results to any number of consumers
//
// Built on tokio's broadcast channel: `publish` never waits, and a subscriber
// that falls more than `capacity` events behind skips the oldest ones.

use std::sync::{Arc, RwLock};

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::engine::BatchResult;

/// Largest buffer a channel is created with; larger requests are clamped
pub const MAX_CAPACITY: usize = 1 << 16;

/// Publisher side of the batch event pipeline. Cheap to clone.
#[derive(Clone)]
pub struct EventChannel {
    sender: Arc<RwLock<Option<broadcast::Sender<BatchResult>>>>,
}

impl EventChannel {
    /// Create a channel buffering up to `capacity` events per subscriber,
    /// clamped to `1..=MAX_CAPACITY`
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_CAPACITY));
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
        }
    }

    /// Publish without blocking; returns how many subscribers received it
    pub fn publish(&self, event: BatchResult) -> usize {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            // Err only means nobody is subscribed right now
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Start an independent sequence of every event published from now on.
    ///
    /// After [`close`](Self::close) the returned subscription is already ended.
    pub fn subscribe(&self) -> Subscription {
        let guard = self.sender.read().unwrap_or_else(|e| e.into_inner());
        Subscription {
            receiver: guard.as_ref().map(|sender| sender.subscribe()),
            dropped: 0,
        }
    }

    /// End every subscription once it has drained what is buffered
    pub fn close(&self) {
        let mut guard = self.sender.write().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            debug!("Event channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(0, |sender| sender.receiver_count())
    }
}

/// One consumer's view of the batch events
pub struct Subscription {
    receiver: Option<broadcast::Receiver<BatchResult>>,
    dropped: u64,
}

impl Subscription {
    /// Next event, or `None` once the engine has stopped and the buffer is drained
    pub async fn recv(&mut self) -> Option<BatchResult> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    self.dropped += n;
                    debug!("Subscriber lagged, skipped {} oldest events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
        self.receiver = None;
        None
    }

    /// Events this subscriber skipped because it fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_finished(&self) -> bool {
        self.receiver.is_none()
    }

    /// Consume the subscription as a stream of events
    pub fn into_stream(self) -> impl Stream<Item = BatchResult> {
        let mut subscription = self;
        async_stream::stream! {
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}
