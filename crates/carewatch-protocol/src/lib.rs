//! carewatch Protocol - Wire protocol for the realtime call channel
//!
//! This crate provides the JSON text frames exchanged between the
//! caregiver client and the call server, message id generation, and
//! tolerant parsing of inbound frames.

pub mod endpoint;
pub mod ids;
pub mod message;
pub mod parse;

pub use endpoint::connection_url;
pub use ids::{MessageId, ResponseId};
pub use message::{InboundFrame, OutboundFrame};
pub use parse::{parse_inbound, ProtocolError};
