use chrono::{DateTime, Utc};

use crate::error::ServerError;
use crate::protocol::models::{Role, Usage};

/// Conversational events delivered to the caller.
///
/// For a given `id`, every `MessagePart` is delivered before the `Message`
/// that completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    Message {
        id: String,
        role: Role,
        text: String,
    },
    MessagePart {
        id: String,
        role: Role,
        text_delta: String,
    },
    /// The agent has started producing a response.
    Typing,
}

impl MessageEvent {
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Message { id, .. } | Self::MessagePart { id, .. } => Some(id),
            Self::Typing => None,
        }
    }
}

/// Token accounting for one completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub conversation_id: Option<String>,
    /// When the current session was created or last updated by the endpoint.
    pub started_at: Option<DateTime<Utc>>,
    pub usage: Option<Usage>,
}

/// Non-fatal protocol problems. The session keeps running after each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// An `error` event sent by the endpoint.
    Remote(ServerError),
    /// An inbound frame that could not be decoded and was dropped.
    Decode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(err) => write!(f, "remote error: {}", err.message),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}
