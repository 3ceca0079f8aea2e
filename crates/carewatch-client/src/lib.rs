//! carewatch Client - Realtime call transport and analysis polling
//!
//! This library provides the two stateful pieces of the caregiver
//! dashboard's live call view:
//!
//! - `session` - a reconnecting WebSocket session per call that answers
//!   keep-alives, tracks delivery acknowledgements, accumulates streamed
//!   replies and emits normalized events
//! - `poller` - a bounded, restartable poll loop that waits for a finished
//!   call's analysis to become available
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  SessionCommand  ┌──────────────────────────────┐
//! │ SessionHandle │─────────────────▶│        SessionActor          │
//! └───────┬───────┘   (mpsc)         │ AckTracker  StreamAccumulator│
//!         │                          │ ReconnectPolicy   Link       │
//!         │ subscribe()              └──────┬──────────────┬────────┘
//!         ▼                                 │ SessionEvent │ frames
//!   broadcast / watch  ◀────────────────────┘              ▼
//!                                                   Connector (WebSocket)
//!
//! ┌───────────────┐  PollerCommand   ┌──────────────────────────────┐
//! │ PollerHandle  │─────────────────▶│ PollerActor (PollCycle + one │
//! └───────────────┘                  │ interval slot) ─▶ refresher  │
//!                                    └──────────────────────────────┘
//! ```
//!
//! Each actor runs in one task and handles commands, frames and timers one
//! at a time. Dropping the last handle stops the actor and releases every
//! timer it owns.
//!
//! **Panic-Free Policy:** no `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in production code.

pub mod ack;
pub mod api;
pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod poller;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use ack::{Delivery, DeliveryReceipt};
pub use api::CallsApi;
pub use auth::{StaticToken, TokenSource};
pub use backoff::ReconnectPolicy;
pub use config::{ClientConfig, PollConfig, ReconnectConfig};
pub use error::{ApiError, ConfigError, PollerError, SessionError, TransportError};
pub use poller::{
    spawn_poller, CallRefresher, PollCycle, PollProgress, PollState, PollerHandle, StopReason,
};
pub use session::{
    spawn_session, ConnectionStatus, SessionEvent, SessionHandle, SessionSnapshot,
    StatusSubscription,
};
pub use transport::{Connection, Connector, WsConnector};
