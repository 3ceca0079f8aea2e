//! Delivery acknowledgement tracking.
//!
//! Every outbound chat message is registered with a deadline. It resolves
//! exactly once: `Acknowledged` when the server's `ack` arrives first,
//! `Unconfirmed` when the deadline passes or the tracker is flushed on
//! disconnect. Neither outcome is an error for the sender.

use carewatch_protocol::MessageId;
use std::collections::HashMap;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::time::delay_queue::{self, DelayQueue};

/// How a tracked message was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The server acknowledged the message
    Acknowledged,
    /// No acknowledgement before the deadline or before the connection ended
    Unconfirmed,
}

/// Resolves once the server acknowledges a message, or gives up on it.
///
/// Awaiting the receipt is optional; dropping it does not affect tracking.
#[derive(Debug)]
pub struct DeliveryReceipt {
    rx: oneshot::Receiver<Delivery>,
}

impl Future for DeliveryReceipt {
    type Output = Delivery;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Delivery::Unconfirmed))
    }
}

struct PendingAck {
    resolver: oneshot::Sender<Delivery>,
    timer: delay_queue::Key,
}

/// Pending acknowledgements keyed by message id, each with one deadline.
pub struct AckTracker {
    timeout: Duration,
    pending: HashMap<MessageId, PendingAck>,
    deadlines: DelayQueue<MessageId>,
}

impl AckTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            pending: HashMap::new(),
            deadlines: DelayQueue::new(),
        }
    }

    /// Starts tracking `id` and returns its receipt.
    ///
    /// Re-registering an id still pending resolves the earlier receipt as
    /// unconfirmed.
    pub fn register(&mut self, id: MessageId) -> DeliveryReceipt {
        if let Some(previous) = self.pending.remove(&id) {
            self.deadlines.try_remove(&previous.timer);
            let _ = previous.resolver.send(Delivery::Unconfirmed);
        }

        let (tx, rx) = oneshot::channel();
        let timer = self.deadlines.insert(id.clone(), self.timeout);
        self.pending.insert(
            id,
            PendingAck {
                resolver: tx,
                timer,
            },
        );
        DeliveryReceipt { rx }
    }

    /// Resolves `id` as acknowledged and cancels its deadline.
    ///
    /// Returns `false` for unknown or already resolved ids.
    pub fn acknowledge(&mut self, id: &MessageId) -> bool {
        match self.pending.remove(id) {
            Some(entry) => {
                self.deadlines.try_remove(&entry.timer);
                let _ = entry.resolver.send(Delivery::Acknowledged);
                true
            }
            None => false,
        }
    }

    /// Waits for the next deadline, resolves that message as unconfirmed
    /// and returns its id. Returns `None` when nothing is pending.
    ///
    /// Cancel safe: an expiry is fully handled in the poll that observes it.
    pub async fn expire_next(&mut self) -> Option<MessageId> {
        let expired = poll_fn(|cx| self.deadlines.poll_expired(cx)).await?;
        let id = expired.into_inner();
        if let Some(entry) = self.pending.remove(&id) {
            let _ = entry.resolver.send(Delivery::Unconfirmed);
        }
        Some(id)
    }

    /// Resolves every pending message as unconfirmed and cancels all
    /// deadlines. Returns how many were pending.
    pub fn resolve_all(&mut self) -> usize {
        self.deadlines.clear();
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.resolver.send(Delivery::Unconfirmed);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for AckTracker {
    fn drop(&mut self) {
        self.resolve_all();
    }
}
