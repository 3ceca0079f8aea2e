//! Client configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default so an empty file is valid.
//!
//! ```toml
//! ws_base_url = "wss://care.example.com"
//! api_base_url = "https://care.example.com"
//! ack_timeout_ms = 5000
//!
//! [reconnect]
//! base_delay_ms = 1000
//! max_attempts = 5
//!
//! [poll]
//! interval_ms = 5000
//! max_polls = 12
//! ```

use crate::backoff::ReconnectPolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `ws_base_url`.
pub const ENV_WS_URL: &str = "CAREWATCH_WS_URL";

/// Environment variable overriding `api_base_url`.
pub const ENV_API_URL: &str = "CAREWATCH_API_URL";

const DEFAULT_WS_URL: &str = "ws://localhost:8000";
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the realtime endpoint (`ws://` or `wss://`)
    pub ws_base_url: String,

    /// Base URL of the REST API
    pub api_base_url: String,

    /// How long an outbound message waits for its `ack`
    pub ack_timeout_ms: u64,

    /// Capacity of the session event channel
    pub event_buffer: usize,

    pub reconnect: ReconnectConfig,

    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_base_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            ack_timeout_ms: 5_000,
            event_buffer: 256,
            reconnect: ReconnectConfig::default(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Applies `CAREWATCH_WS_URL` / `CAREWATCH_API_URL` from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_WS_URL).filter(|v| !v.is_empty()) {
            self.ws_base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        self
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

/// Reconnection schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry; doubles on each further attempt
    pub base_delay_ms: u64,

    /// Retries allowed before the session gives up
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(self.base_delay_ms), self.max_attempts)
    }
}

/// Analysis poll schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_polls: 12,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
