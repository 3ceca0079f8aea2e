//! Correlation identifiers carried in frames.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the random suffix in generated message ids.
const SUFFIX_LEN: usize = 9;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Client-generated id of an outbound chat message, echoed back in `ack`.
///
/// Format: `<epoch-millis>-<9 char base36 suffix>`, e.g. `1736935200000-k3j9x0q2a`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps an existing id (e.g. one received in an `ack` frame).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh id for an outbound message.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let random = uuid::Uuid::new_v4().as_u128();
        Self(format!("{millis}-{}", base36_suffix(random, SUFFIX_LEN)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-assigned id of one streamed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(String);

impl ResponseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResponseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Encodes the low digits of `n` in base36, least significant first.
fn base36_suffix(mut n: u128, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let digit = (n % 36) as usize;
        out.push(BASE36.get(digit).map_or('0', |b| char::from(*b)));
        n /= 36;
    }
    out
}
