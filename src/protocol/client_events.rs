use serde::{Deserialize, Serialize};

use super::models::{Item, SessionConfig};

/// Control messages the session writes to the remote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        session: Box<SessionConfig>,
    },
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: Box<Item>,
    },
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    #[serde(rename = "output_audio_buffer.clear")]
    OutputAudioBufferClear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
}

impl ClientEvent {
    #[must_use]
    pub fn session_update(session: SessionConfig) -> Self {
        Self::SessionUpdate {
            event_id: None,
            session: Box::new(session),
        }
    }

    #[must_use]
    pub fn item_create(item: Item) -> Self {
        Self::ConversationItemCreate {
            event_id: None,
            previous_item_id: None,
            item: Box::new(item),
        }
    }

    #[must_use]
    pub const fn response_create() -> Self {
        Self::ResponseCreate { event_id: None }
    }

    #[must_use]
    pub const fn clear_output_audio() -> Self {
        Self::OutputAudioBufferClear { event_id: None }
    }
}
