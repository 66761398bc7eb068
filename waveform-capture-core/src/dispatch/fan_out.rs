use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

/// One ordered batch of samples produced by a single hardware callback.
///
/// A shared immutable view: fanning a chunk out to N consumers clones the
/// pointer, not the samples. Zero-length chunks are legal and mean the
/// hardware delivered nothing for that period.
pub type SampleChunk = Arc<[f32]>;

struct Outlet {
    sender: Sender<SampleChunk>,
}

/// Delivers each published chunk to every subscribed consumer without ever
/// waiting on one of them.
///
/// Delivery is fire-and-forget into a per-consumer queue: `publish` uses
/// `try_send`, counts a drop when a bounded queue is full, and prunes
/// consumers whose receiving side is gone. Each queue is FIFO, so every
/// consumer observes chunks in exactly the order they were published.
pub struct ChunkFanOut {
    outlets: Vec<Outlet>,
    dropped: AtomicUsize,
}

impl ChunkFanOut {
    pub fn new() -> Self {
        Self {
            outlets: Vec::new(),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Register a consumer with an unbounded queue.
    pub fn subscribe(&mut self) -> Receiver<SampleChunk> {
        let (sender, receiver) = unbounded();
        self.outlets.push(Outlet { sender });
        receiver
    }

    /// Register a consumer with a bounded queue. Chunks published while the
    /// queue is full are dropped for that consumer and counted.
    pub fn subscribe_bounded(&mut self, capacity: usize) -> Receiver<SampleChunk> {
        let (sender, receiver) = bounded(capacity.max(1));
        self.outlets.push(Outlet { sender });
        receiver
    }

    /// Hand `chunk` to every live consumer. Returns in bounded time
    /// regardless of consumer behaviour.
    pub fn publish(&mut self, chunk: SampleChunk) {
        let dropped = &self.dropped;
        self.outlets
            .retain(|outlet| match outlet.sender.try_send(chunk.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Consumers still connected.
    pub fn consumer_count(&self) -> usize {
        self.outlets.len()
    }

    /// Chunks dropped so far because a bounded consumer queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for ChunkFanOut {
    fn default() -> Self {
        Self::new()
    }
}
