//! Realtime call session using the Actor pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ SessionHandle │────▶│  SessionActor   │────▶│ broadcast events │
//! └───────────────┘     └─────────────────┘     │ watch status     │
//!         │                │          ▲         └──────────────────┘
//!   SessionCommand      frames      frames
//!   (mpsc channel)         ▼          │
//!                       ┌─────────────────┐
//!                       │    Connector    │
//!                       └─────────────────┘
//! ```
//!
//! The actor connects to one call at a time, reconnects with exponential
//! backoff after unsolicited closes, answers `ping`, resolves message
//! acknowledgements and turns streamed chunks into cumulative messages.
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()` or `.expect()` in production code; channel operations
//! handle closure gracefully.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::auth::TokenSource;
use crate::config::ClientConfig;
use crate::transport::Connector;

mod actor;
mod commands;
mod handle;

pub use actor::SessionActor;
pub use commands::{ConnectionStatus, SessionCommand, SessionEvent, SessionSnapshot};
pub use handle::{SessionHandle, StatusSubscription};

const COMMAND_BUFFER: usize = 32;

/// Spawns a session actor and returns its handle.
///
/// The session starts disconnected; call [`SessionHandle::connect`].
///
/// # Example
///
/// ```no_run
/// use carewatch_client::{spawn_session, ClientConfig, StaticToken, WsConnector};
/// use carewatch_core::CallId;
///
/// #[tokio::main]
/// async fn main() {
///     let session = spawn_session(&ClientConfig::default(), WsConnector, StaticToken::new("jwt"));
///     let mut events = session.subscribe();
///     let _ = session.connect(CallId::from(42)).await;
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// }
/// ```
pub fn spawn_session(
    config: &ClientConfig,
    connector: impl Connector,
    tokens: impl TokenSource,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(config.event_buffer.max(1));
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    let actor = SessionActor::new(
        cmd_rx,
        Arc::new(connector),
        Arc::new(tokens),
        config.ws_base_url.clone(),
        config.reconnect.policy(),
        config.ack_timeout(),
        event_tx.clone(),
        status_tx,
    );
    tokio::spawn(actor.run());

    SessionHandle::new(cmd_tx, event_tx, status_rx)
}
