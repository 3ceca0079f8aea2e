//! Error types for the realtime client.
//!
//! All error types use `thiserror`. Nothing in this crate surfaces a
//! transport failure to the caller except through these values: dropped
//! connections are handled by reconnection, ack timeouts are not errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Transport Errors
// ============================================================================

/// Failures of the underlying frame transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// WebSocket handshake, framing or I/O failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection is already closed
    #[error("Connection closed")]
    Closed,
}

// ============================================================================
// Session Errors
// ============================================================================

/// Errors returned by [`crate::SessionHandle`] operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No open transport to send on
    #[error("Socket not open")]
    NotConnected,

    /// Writing a frame to the transport failed
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// An outbound frame could not be encoded
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),

    /// The session actor has stopped
    #[error("Session actor has stopped")]
    ChannelClosed,
}

// ============================================================================
// Poller Errors
// ============================================================================

/// Errors returned by [`crate::PollerHandle`] operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollerError {
    /// The poller actor has stopped
    #[error("Poller actor has stopped")]
    ChannelClosed,
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors loading a [`crate::ClientConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ============================================================================
// REST Errors
// ============================================================================

/// Errors from the calls REST resource.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request failed or returned an error status
    #[error("Calls API request failed: {0}")]
    Http(#[from] reqwest::Error),
}
