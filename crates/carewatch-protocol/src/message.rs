//! Protocol frame types for the realtime call channel.

use crate::ids::{MessageId, ResponseId};
use carewatch_core::{CallId, CallStatus, ChatMessage, ChatRole};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Frames sent by the client to the call server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Chat message typed by the caregiver, tracked for acknowledgement
    Message {
        content: String,
        message_id: MessageId,
    },

    /// Ask the server to end the call
    EndCall,

    /// Keep-alive reply to a server `ping`
    Pong {
        /// RFC 3339 timestamp of the reply
        timestamp: String,
    },
}

impl OutboundFrame {
    /// Creates a chat message frame.
    pub fn message(content: impl Into<String>, message_id: MessageId) -> Self {
        Self::Message {
            content: content.into(),
            message_id,
        }
    }

    /// Creates an end-call frame.
    pub fn end_call() -> Self {
        Self::EndCall
    }

    /// Creates a pong frame stamped with the current time.
    pub fn pong_now() -> Self {
        Self::Pong {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Serializes the frame to its JSON text form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames received from the call server.
///
/// Parse with [`crate::parse_inbound`], which maps unknown or incomplete
/// frames to [`InboundFrame::Unrecognized`] instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Keep-alive probe; must be answered with a pong
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// Reply to a client ping
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// Delivery acknowledgement for an outbound message
    Ack { message_id: MessageId },

    /// One piece of a streamed assistant reply
    StreamChunk {
        response_id: ResponseId,
        #[serde(default)]
        role: ChatRole,
        #[serde(default)]
        content: String,
    },

    /// End of a streamed reply, carrying the authoritative full text
    StreamEnd {
        response_id: ResponseId,
        #[serde(default)]
        role: ChatRole,
        #[serde(default)]
        content: String,
        #[serde(default)]
        call_end_detected: bool,
    },

    /// Complete chat message (e.g. the echo of a user message)
    Message(ChatMessage),

    /// Stored message replayed when a connection opens
    History(ChatMessage),

    /// Server-side error report
    Error {
        #[serde(default)]
        message: String,
    },

    /// Legacy call-ended notification
    CallEnded,

    /// The server ended the call
    Ended {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<CallId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<CallStatus>,
        #[serde(default)]
        auto_ended: bool,
    },

    /// Any frame this client does not model, kept verbatim
    #[serde(skip)]
    Unrecognized(serde_json::Value),
}

impl InboundFrame {
    /// Returns the frame's `type` discriminator for logging.
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::Ack { .. } => "ack",
            Self::StreamChunk { .. } => "stream_chunk",
            Self::StreamEnd { .. } => "stream_end",
            Self::Message(_) => "message",
            Self::History(_) => "history",
            Self::Error { .. } => "error",
            Self::CallEnded => "call_ended",
            Self::Ended { .. } => "ended",
            Self::Unrecognized(value) => value
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_message_serialization() {
        let frame = OutboundFrame::message("hello", MessageId::new("1-abc"));
        let json = frame.to_json().unwrap();
        assert!(json.contains("\"type\":\"message\""));
        assert!(json.contains("\"content\":\"hello\""));
        assert!(json.contains("\"message_id\":\"1-abc\""));
    }

    #[test]
    fn test_end_call_serialization() {
        let json = OutboundFrame::end_call().to_json().unwrap();
        assert_eq!(json, r#"{"type":"end_call"}"#);
    }

    #[test]
    fn test_pong_has_rfc3339_timestamp() {
        match OutboundFrame::pong_now() {
            OutboundFrame::Pong { timestamp } => {
                assert!(chrono::DateTime::parse_from_rfc3339(&timestamp).is_ok());
            }
            other => panic!("Expected Pong, got {other:?}"),
        }
    }

    #[test]
    fn test_inbound_message_frame() {
        let json = r#"{"type":"message","role":"user","content":"hi","is_streaming":false}"#;
        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        match frame {
            InboundFrame::Message(msg) => {
                assert_eq!(msg.role, ChatRole::User);
                assert_eq!(msg.content, "hi");
            }
            other => panic!("Expected Message, got {other:?}"),
        }
    }

    #[test]
    fn test_inbound_ended_frame() {
        let json = r#"{"type":"ended","call_id":12,"status":"completed","auto_ended":true}"#;
        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Ended {
                call_id: Some(CallId::from(12)),
                status: Some(CallStatus::Completed),
                auto_ended: true,
            }
        );
        assert_eq!(frame.kind(), "ended");
    }
}
