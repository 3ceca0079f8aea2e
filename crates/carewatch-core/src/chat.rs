//! Chat messages exchanged during a call.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// The care recipient.
    User,

    /// The AI caller.
    #[default]
    Assistant,

    /// Any role this client does not know about.
    #[serde(other)]
    Other,
}

impl ChatRole {
    /// Returns the display label for this role.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A normalized chat event, ready to be appended to chat state.
///
/// While a response is streaming, `content` always holds the full text
/// received so far, so consumers can replace rather than concatenate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_streaming: bool,
    /// Set on a final assistant message after which the agent ends the call.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub call_end_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ChatMessage {
    /// Creates a partial message for an in-flight streamed response.
    pub fn streaming(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_streaming: true,
            ..Default::default()
        }
    }

    /// Creates a finished message.
    pub fn complete(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_streaming: false,
            ..Default::default()
        }
    }
}
