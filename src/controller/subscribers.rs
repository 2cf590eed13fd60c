//! Snapshot fan-out to observers.
//!
//! Each subscriber owns an unbounded queue. Publishing only enqueues, so a
//! slow observer never holds up the controller; a per-subscriber task drains
//! the queue into the callback in order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::Result;
use crate::escalation::Variant;
use crate::request::{AnyRequest, ServiceRequest, Stage};

/// Immutable view of a request published after a transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Number of transitions the controller had applied when this was taken.
    pub sequence: u64,
    pub stage: Stage,
    pub variant: Variant,
    pub request: ServiceRequest,
    pub emitted_at: DateTime<Utc>,
}

impl Snapshot {
    pub(crate) fn capture(request: &AnyRequest, variant: Variant, sequence: u64) -> Self {
        Snapshot {
            sequence,
            stage: request.stage(),
            variant,
            request: ServiceRequest::from(request),
            emitted_at: Utc::now(),
        }
    }

    /// JSON rendering for the presentation layer.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Handle identifying one subscription on one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Ordered set of subscriber queues.
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    queues: Vec<(SubscriptionId, mpsc::UnboundedSender<Snapshot>)>,
}

impl Subscribers {
    /// Register a queue, optionally seeding it with `replay`. When `closed`
    /// the queue only carries the replay and then ends.
    fn register(
        &mut self,
        replay: Option<Snapshot>,
        closed: bool,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Snapshot>) {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(snapshot) = replay {
            // Receiver is alive, cannot fail
            let _ = tx.send(snapshot);
        }
        if !closed {
            self.queues.push((id, tx));
        }
        (id, rx)
    }

    /// Subscribe a callback; a dedicated task delivers snapshots to it.
    pub(crate) fn add_callback<F>(
        &mut self,
        mut callback: F,
        replay: Option<Snapshot>,
        closed: bool,
    ) -> SubscriptionId
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let (id, mut rx) = self.register(replay, closed);
        tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                callback(snapshot);
            }
            tracing::trace!(subscription = %id, "Subscriber queue closed");
        });
        id
    }

    /// Subscribe as a stream.
    pub(crate) fn add_stream(
        &mut self,
        replay: Option<Snapshot>,
        closed: bool,
    ) -> (SubscriptionId, UnboundedReceiverStream<Snapshot>) {
        let (id, rx) = self.register(replay, closed);
        (id, UnboundedReceiverStream::new(rx))
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.queues.len();
        self.queues.retain(|(existing, _)| *existing != id);
        self.queues.len() != before
    }

    /// Enqueue for every subscriber in subscription order, dropping queues
    /// whose receiving side has gone away.
    pub(crate) fn publish(&mut self, snapshot: &Snapshot) {
        self.queues.retain(|(id, tx)| {
            let delivered = tx.send(snapshot.clone()).is_ok();
            if !delivered {
                tracing::trace!(subscription = %id, "Dropping subscriber with closed receiver");
            }
            delivered
        });
    }

    /// End every subscription after the terminal snapshot.
    pub(crate) fn close(&mut self) {
        self.queues.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.len()
    }
}
