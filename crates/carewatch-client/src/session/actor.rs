//! Session actor - owns the transport and all per-connection state.
//!
//! One task multiplexes handle commands, inbound frames, the pending
//! connection attempt, the reconnect timer and ack deadlines. Because
//! everything happens in this task, a frame handler never races a
//! disconnect and a stale retry timer can be discarded by clearing its slot.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Transport failures end the connection and feed the reconnect schedule
//! - Subscriber and responder channel failures are ignored

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{sleep, timeout, Sleep};
use tracing::{debug, error, info, warn};

use carewatch_core::{CallId, ChatMessage};
use carewatch_protocol::{connection_url, parse_inbound, InboundFrame, MessageId, OutboundFrame};

use super::commands::{ConnectionStatus, SessionCommand, SessionEvent, SessionSnapshot};
use crate::ack::{AckTracker, DeliveryReceipt};
use crate::auth::TokenSource;
use crate::backoff::ReconnectPolicy;
use crate::error::{SessionError, TransportError};
use crate::stream::StreamAccumulator;
use crate::transport::{Connection, Connector};

/// Upper bound on a graceful close before the transport is just dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Link State
// ============================================================================

/// The transport as seen by the actor.
enum Link {
    Idle,
    Connecting(BoxFuture<'static, Result<Connection, TransportError>>),
    Open(Connection),
}

/// Something that happened on the link.
enum LinkEvent {
    Opened(Connection),
    ConnectFailed(TransportError),
    Frame(String),
    Failed(TransportError),
    Closed,
}

impl Link {
    fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Waits for the next link event. Never resolves while idle.
    async fn next_event(&mut self) -> LinkEvent {
        match self {
            Self::Idle => pending().await,
            Self::Connecting(attempt) => match attempt.await {
                Ok(connection) => LinkEvent::Opened(connection),
                Err(e) => LinkEvent::ConnectFailed(e),
            },
            Self::Open(connection) => match connection.stream.next().await {
                Some(Ok(text)) => LinkEvent::Frame(text),
                Some(Err(e)) => LinkEvent::Failed(e),
                None => LinkEvent::Closed,
            },
        }
    }
}

async fn retry_due(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(timer) => timer.as_mut().await,
        None => pending().await,
    }
}

// ============================================================================
// Session Actor
// ============================================================================

/// The session actor.
///
/// Holds at most one transport. The reconnect slot holds at most one timer
/// and is cleared whenever the session is torn down explicitly, so a retry
/// can never fire after `disconnect`.
pub struct SessionActor {
    receiver: mpsc::Receiver<SessionCommand>,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenSource>,
    ws_base_url: String,
    policy: ReconnectPolicy,

    call_id: Option<CallId>,
    link: Link,
    explicitly_disconnected: bool,
    reconnect_attempts: u32,
    gave_up: bool,
    retry: Option<Pin<Box<Sleep>>>,

    acks: AckTracker,
    streams: StreamAccumulator,

    event_publisher: broadcast::Sender<SessionEvent>,
    status_publisher: watch::Sender<ConnectionStatus>,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        receiver: mpsc::Receiver<SessionCommand>,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenSource>,
        ws_base_url: String,
        policy: ReconnectPolicy,
        ack_timeout: Duration,
        event_publisher: broadcast::Sender<SessionEvent>,
        status_publisher: watch::Sender<ConnectionStatus>,
    ) -> Self {
        Self {
            receiver,
            connector,
            tokens,
            ws_base_url,
            policy,
            call_id: None,
            link: Link::Idle,
            explicitly_disconnected: false,
            reconnect_attempts: 0,
            gave_up: false,
            retry: None,
            acks: AckTracker::new(ack_timeout),
            streams: StreamAccumulator::new(),
            event_publisher,
            status_publisher,
        }
    }

    /// Runs the actor event loop until every handle is dropped.
    pub async fn run(mut self) {
        info!("Session actor starting");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                event = self.link.next_event(), if !self.link.is_idle() => {
                    self.handle_link_event(event).await;
                }
                () = retry_due(&mut self.retry), if self.retry.is_some() => {
                    self.handle_retry_due();
                }
                Some(message_id) = self.acks.expire_next(), if !self.acks.is_empty() => {
                    debug!(message_id = %message_id, "No ack before deadline, message unconfirmed");
                }
            }
        }

        self.teardown().await;
        info!("Session actor stopped");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect {
                call_id,
                respond_to,
            } => {
                self.handle_connect(call_id).await;
                let _ = respond_to.send(());
            }
            SessionCommand::Disconnect { respond_to } => {
                self.handle_disconnect().await;
                let _ = respond_to.send(());
            }
            SessionCommand::Send {
                content,
                respond_to,
            } => {
                let result = self.handle_send(content).await;
                let _ = respond_to.send(result);
            }
            SessionCommand::EndCall => self.handle_end_call().await,
            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    async fn handle_connect(&mut self, call_id: CallId) {
        if self.link.is_open() && self.call_id.as_ref() == Some(&call_id) {
            debug!(call_id = %call_id, "Already connected to call");
            return;
        }

        if !self.link.is_idle() {
            info!(
                previous = ?self.call_id,
                call_id = %call_id,
                "Switching call, closing existing connection"
            );
            self.close_link().await;
        }
        self.acks.resolve_all();
        self.streams.clear();

        self.call_id = Some(call_id);
        self.explicitly_disconnected = false;
        self.reconnect_attempts = 0;
        self.gave_up = false;
        self.retry = None;

        self.initiate_connection();
    }

    async fn handle_disconnect(&mut self) {
        info!(call_id = ?self.call_id, "Disconnecting");

        self.explicitly_disconnected = true;
        self.retry = None;
        let unconfirmed = self.acks.resolve_all();
        if unconfirmed > 0 {
            debug!(count = unconfirmed, "Resolved pending messages as unconfirmed");
        }
        self.streams.clear();
        self.close_link().await;
        self.call_id = None;
        self.set_status(ConnectionStatus::Disconnected);
    }

    async fn handle_send(&mut self, content: String) -> Result<DeliveryReceipt, SessionError> {
        if !self.link.is_open() {
            warn!("Cannot send message, socket not open");
            return Err(SessionError::NotConnected);
        }

        let message_id = MessageId::generate();
        self.transmit(&OutboundFrame::message(content, message_id.clone()))
            .await?;

        let receipt = self.acks.register(message_id.clone());
        debug!(
            message_id = %message_id,
            pending = self.acks.len(),
            "Message sent, awaiting ack"
        );
        Ok(receipt)
    }

    async fn handle_end_call(&mut self) {
        match self.transmit(&OutboundFrame::end_call()).await {
            Ok(()) => info!(call_id = ?self.call_id, "Requested end of call"),
            Err(SessionError::NotConnected) => {
                debug!("End call dropped, socket not open");
            }
            Err(e) => warn!(error = %e, "Failed to send end call"),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            call_id: self.call_id.clone(),
            status: *self.status_publisher.borrow(),
            reconnect_attempts: self.reconnect_attempts,
            pending_acks: self.acks.len(),
            open_streams: self.streams.len(),
            gave_up: self.gave_up,
        }
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Starts a connection attempt for the current call, if one is wanted.
    fn initiate_connection(&mut self) {
        if self.explicitly_disconnected {
            return;
        }
        let Some(call_id) = self.call_id.clone() else {
            return;
        };

        self.set_status(ConnectionStatus::Connecting);

        let Some(token) = self.tokens.access_token() else {
            error!(call_id = %call_id, "No access token available, not connecting");
            self.set_status(ConnectionStatus::Disconnected);
            return;
        };

        info!(
            call_id = %call_id,
            attempt = self.reconnect_attempts,
            "Connecting to call channel"
        );
        let url = connection_url(&self.ws_base_url, &call_id, &token);
        self.link = Link::Connecting(self.connector.connect(&url));
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Opened(connection) => {
                info!(call_id = ?self.call_id, "Call channel open");
                self.link = Link::Open(connection);
                self.reconnect_attempts = 0;
                self.gave_up = false;
                self.set_status(ConnectionStatus::Connected);
            }
            LinkEvent::ConnectFailed(e) => {
                warn!(call_id = ?self.call_id, error = %e, "Connection attempt failed");
                self.link = Link::Idle;
                self.handle_close();
            }
            LinkEvent::Frame(text) => self.handle_frame(&text).await,
            LinkEvent::Failed(e) => {
                // The transport is unusable after an error; treat it as the close.
                warn!(call_id = ?self.call_id, error = %e, "Transport error");
                self.link = Link::Idle;
                self.handle_close();
            }
            LinkEvent::Closed => {
                info!(call_id = ?self.call_id, "Call channel closed");
                self.link = Link::Idle;
                self.handle_close();
            }
        }
    }

    /// Close path shared by every unsolicited end of a connection.
    fn handle_close(&mut self) {
        self.set_status(ConnectionStatus::Disconnected);
        self.acks.resolve_all();
        self.streams.clear();

        if self.explicitly_disconnected {
            return;
        }

        match self.policy.delay_for(self.reconnect_attempts) {
            Some(delay) => {
                self.reconnect_attempts += 1;
                info!(
                    call_id = ?self.call_id,
                    attempt = self.reconnect_attempts,
                    max = self.policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnect"
                );
                self.retry = Some(Box::pin(sleep(delay)));
            }
            None => {
                error!(
                    call_id = ?self.call_id,
                    attempts = self.reconnect_attempts,
                    "Max reconnect attempts reached, giving up"
                );
                self.gave_up = true;
                self.call_id = None;
            }
        }
    }

    fn handle_retry_due(&mut self) {
        self.retry = None;
        if self.explicitly_disconnected {
            debug!("Retry skipped after explicit disconnect");
            return;
        }
        self.initiate_connection();
    }

    /// Drops the transport, closing it gracefully if it was open.
    async fn close_link(&mut self) {
        if let Link::Open(mut connection) = std::mem::replace(&mut self.link, Link::Idle) {
            match timeout(CLOSE_TIMEOUT, connection.sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Error closing transport"),
                Err(_) => debug!("Transport close timed out"),
            }
        }
    }

    async fn teardown(&mut self) {
        self.explicitly_disconnected = true;
        self.retry = None;
        self.acks.resolve_all();
        self.streams.clear();
        self.close_link().await;
        self.set_status(ConnectionStatus::Disconnected);
    }

    // ========================================================================
    // Inbound Frames
    // ========================================================================

    async fn handle_frame(&mut self, text: &str) {
        let frame = match parse_inbound(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping unparseable frame");
                return;
            }
        };

        match frame {
            InboundFrame::Ping { .. } => {
                if let Err(e) = self.transmit(&OutboundFrame::pong_now()).await {
                    warn!(error = %e, "Failed to answer ping");
                }
            }
            InboundFrame::Ack { message_id } => {
                if self.acks.acknowledge(&message_id) {
                    debug!(message_id = %message_id, "Message acknowledged");
                } else {
                    debug!(message_id = %message_id, "Ignoring ack for unknown message");
                }
            }
            InboundFrame::StreamChunk {
                response_id,
                role,
                content,
            } => {
                let so_far = self.streams.append(&response_id, &content).to_string();
                self.publish(SessionEvent::Message(ChatMessage::streaming(role, so_far)));
            }
            InboundFrame::StreamEnd {
                response_id,
                role,
                content,
                call_end_detected,
            } => {
                self.streams.finish(&response_id);
                let mut message = ChatMessage::complete(role, content);
                message.call_end_detected = call_end_detected;
                self.publish(SessionEvent::Message(message));
            }
            InboundFrame::Message(message) => self.publish(SessionEvent::Message(message)),
            ended @ (InboundFrame::CallEnded | InboundFrame::Ended { .. }) => {
                info!(call_id = ?self.call_id, "Call ended by server");
                self.publish(SessionEvent::Frame(ended));
                self.handle_disconnect().await;
            }
            other => {
                debug!(kind = other.kind(), "Passing frame through");
                self.publish(SessionEvent::Frame(other));
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn transmit(&mut self, frame: &OutboundFrame) -> Result<(), SessionError> {
        let Link::Open(connection) = &mut self.link else {
            return Err(SessionError::NotConnected);
        };
        let text = frame.to_json()?;
        connection.sink.send(text).await?;
        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_publisher.send(event);
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status_publisher.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "Connection status changed");
        }
    }
}
