//! Tolerant parsing of inbound text frames.
//!
//! A frame is rejected only when it is not a JSON object with a string
//! `type`. Anything else that fails to match a modelled frame (unknown
//! type, known type missing a correlation field) is kept verbatim as
//! [`InboundFrame::Unrecognized`] so callers can pass it through.

use crate::message::InboundFrame;
use serde_json::Value;
use thiserror::Error;

/// Errors for frames that cannot be classified at all.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The text is not valid JSON
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON, but not an object with a string `type` field
    #[error("Frame has no type discriminator")]
    MissingType,
}

/// Parses one inbound text frame.
///
/// # Errors
///
/// - `ProtocolError::Malformed` if the text is not JSON
/// - `ProtocolError::MissingType` if the JSON has no string `type`
pub fn parse_inbound(text: &str) -> Result<InboundFrame, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;

    if value.get("type").and_then(Value::as_str).is_none() {
        return Err(ProtocolError::MissingType);
    }

    match serde_json::from_value::<InboundFrame>(value.clone()) {
        Ok(frame) => Ok(frame),
        Err(_) => Ok(InboundFrame::Unrecognized(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{MessageId, ResponseId};
    use carewatch_core::ChatRole;

    #[test]
    fn test_parse_ping() {
        let frame = parse_inbound(r#"{"type":"ping","timestamp":"2025-01-15T10:00:00+00:00"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Ping { .. }));
    }

    #[test]
    fn test_parse_ack() {
        let frame = parse_inbound(r#"{"type":"ack","message_id":"1-abc"}"#).unwrap();
        assert_eq!(
            frame,
            InboundFrame::Ack {
                message_id: MessageId::new("1-abc")
            }
        );
    }

    #[test]
    fn test_parse_stream_chunk() {
        let frame = parse_inbound(
            r#"{"type":"stream_chunk","response_id":"r1","role":"assistant","content":"Hel"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            InboundFrame::StreamChunk {
                response_id: ResponseId::new("r1"),
                role: ChatRole::Assistant,
                content: "Hel".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_stream_end_with_extras() {
        let frame = parse_inbound(
            r#"{"type":"stream_end","response_id":"r1","role":"assistant","content":"Bye",
                "is_streaming":false,"call_end_detected":true,"tool_calls":null}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::StreamEnd {
                content,
                call_end_detected,
                ..
            } => {
                assert_eq!(content, "Bye");
                assert!(call_end_detected);
            }
            other => panic!("Expected StreamEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_passed_through() {
        let frame = parse_inbound(r#"{"type":"typing","role":"assistant"}"#).unwrap();
        match &frame {
            InboundFrame::Unrecognized(value) => {
                assert_eq!(value["role"], "assistant");
            }
            other => panic!("Expected Unrecognized, got {other:?}"),
        }
        assert_eq!(frame.kind(), "typing");
    }

    #[test]
    fn test_ack_without_id_is_passed_through() {
        let frame = parse_inbound(r#"{"type":"ack"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unrecognized(_)));
    }

    #[test]
    fn test_chunk_without_response_id_is_passed_through() {
        let frame = parse_inbound(r#"{"type":"stream_chunk","content":"x"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unrecognized(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_inbound("not valid json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_type() {
        assert!(matches!(
            parse_inbound(r#"{"content":"x"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(parse_inbound("[1,2]"), Err(ProtocolError::MissingType)));
    }
}
