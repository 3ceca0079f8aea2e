//! Session actor commands, events and status types.
//!
//! - `SessionCommand`: requests sent to the actor
//! - `SessionEvent`: normalized events published to subscribers
//! - `ConnectionStatus` / `SessionSnapshot`: observable session state

use std::fmt;

use carewatch_core::{CallId, ChatMessage};
use carewatch_protocol::InboundFrame;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::ack::DeliveryReceipt;
use crate::error::SessionError;

// ============================================================================
// Session Commands
// ============================================================================

/// Commands sent to the session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// Open (or switch) the session to a call.
    ///
    /// Responds once the connection attempt has started, not when it opens.
    Connect {
        call_id: CallId,
        respond_to: oneshot::Sender<()>,
    },

    /// Close the session and suppress reconnection.
    Disconnect { respond_to: oneshot::Sender<()> },

    /// Send a chat message, tracked for acknowledgement.
    ///
    /// # Errors
    /// - `SessionError::NotConnected` if the socket is not open
    Send {
        content: String,
        respond_to: oneshot::Sender<Result<DeliveryReceipt, SessionError>>,
    },

    /// Ask the server to end the call. Dropped if the socket is not open.
    EndCall,

    /// Read the current session state.
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

// ============================================================================
// Connection Status
// ============================================================================

/// Lifecycle of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Events published by the session actor.
///
/// Keep-alives, acknowledgements and stream chunks are consumed by the
/// session; everything else reaches subscribers in one of these forms.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A chat message ready to append to chat state.
    ///
    /// Produced for `message` frames and for streamed replies: one partial
    /// (`is_streaming == true`, cumulative content) per chunk, then one
    /// final message at `stream_end`.
    Message(ChatMessage),

    /// Any other frame, unmodified (`history`, `error`, `ended`, unknown types).
    Frame(InboundFrame),
}

// ============================================================================
// Session Snapshot
// ============================================================================

/// Point-in-time view of the session's internal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Call being followed; cleared on disconnect and after giving up
    pub call_id: Option<CallId>,
    pub status: ConnectionStatus,
    /// Reconnect attempts since the last successful open
    pub reconnect_attempts: u32,
    pub pending_acks: usize,
    pub open_streams: usize,
    /// True once the retry budget was exhausted without reconnecting
    pub gave_up: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snapshot = SessionSnapshot {
            call_id: Some(CallId::from(5)),
            status: ConnectionStatus::Connected,
            reconnect_attempts: 0,
            pending_acks: 2,
            open_streams: 1,
            gave_up: false,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["call_id"], "5");
        assert_eq!(json["status"], "connected");
        assert_eq!(json["pending_acks"], 2);
    }
}
