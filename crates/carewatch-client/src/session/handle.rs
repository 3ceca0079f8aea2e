//! Client interface for the session actor.
//!
//! # Panic-Free Guarantees
//!
//! Channel errors are mapped to `SessionError::ChannelClosed`.

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use carewatch_core::CallId;

use super::commands::{ConnectionStatus, SessionCommand, SessionEvent, SessionSnapshot};
use crate::ack::DeliveryReceipt;
use crate::error::SessionError;

// ============================================================================
// Session Handle
// ============================================================================

/// Handle for driving a session.
///
/// Cheap to clone. The actor stops, closing its transport and cancelling
/// every timer, once the last handle is dropped.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    event_sender: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<ConnectionStatus>,
}

impl SessionHandle {
    pub fn new(
        sender: mpsc::Sender<SessionCommand>,
        event_sender: broadcast::Sender<SessionEvent>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self {
            sender,
            event_sender,
            status,
        }
    }

    /// Connects the session to `call_id`.
    ///
    /// Returns once the attempt has started; watch the status for the
    /// outcome. Connecting to another call first closes the current one.
    /// A no-op if already connected to this call.
    ///
    /// # Errors
    ///
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn connect(&self, call_id: CallId) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Connect {
                call_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Closes the session and cancels any scheduled reconnect.
    ///
    /// Pending messages resolve as unconfirmed before this returns.
    ///
    /// # Errors
    ///
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Disconnect { respond_to: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Sends a chat message.
    ///
    /// The returned receipt resolves to `Delivery::Acknowledged` or
    /// `Delivery::Unconfirmed`; both mean the message was written.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotConnected` if the socket is not open
    /// - `SessionError::Transport` if writing the frame failed
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn send(&self, content: impl Into<String>) -> Result<DeliveryReceipt, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Send {
                content: content.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Asks the server to end the call. Silently dropped when not connected.
    ///
    /// # Errors
    ///
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn send_end_call(&self) -> Result<(), SessionError> {
        self.sender
            .send(SessionCommand::EndCall)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    /// Reads the session's internal counters.
    ///
    /// # Errors
    ///
    /// - `SessionError::ChannelClosed` if the actor has shut down
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot { respond_to: tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Subscribes to session events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_sender.subscribe()
    }

    /// Subscribes to connection status. The first value is the current status.
    pub fn subscribe_status(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.status.clone(),
            delivered_current: false,
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}

// ============================================================================
// Status Subscription
// ============================================================================

/// Stream of connection status values.
///
/// Yields the status current at subscription time first, then each change.
/// A slow reader may skip intermediate values but always sees the latest.
pub struct StatusSubscription {
    rx: watch::Receiver<ConnectionStatus>,
    delivered_current: bool,
}

impl StatusSubscription {
    /// Next status, or `None` once the session actor has stopped.
    pub async fn recv(&mut self) -> Option<ConnectionStatus> {
        if !self.delivered_current {
            self.delivered_current = true;
            return Some(*self.rx.borrow_and_update());
        }
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// Status right now, without waiting.
    pub fn current(&self) -> ConnectionStatus {
        *self.rx.borrow()
    }

    /// Waits until the status equals `target`.
    ///
    /// Returns `false` if the session actor stopped first.
    pub async fn wait_for(&mut self, target: ConnectionStatus) -> bool {
        while let Some(status) = self.recv().await {
            if status == target {
                return true;
            }
        }
        false
    }
}
