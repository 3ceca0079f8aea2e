//! carewatch Core - Shared types for remote-care call monitoring
//!
//! This crate provides the domain types shared between the wire
//! protocol, the realtime session client and the `carewatch` binary.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod call;
pub mod chat;
pub mod error;

// Re-exports for convenience
pub use call::{AnalysisState, CallAnalysis, CallId, CallRecord, CallStatus, RiskLevel};
pub use chat::{ChatMessage, ChatRole};
pub use error::{DomainError, DomainResult};
