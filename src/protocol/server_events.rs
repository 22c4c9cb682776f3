use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::models::{ArbitraryJson, Item, Response};
use crate::error::ServerError;

/// Inbound control messages consumed by the session. Any other `type` is
/// kept verbatim in [`ServerEvent::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Error {
        event_id: Option<String>,
        error: ServerError,
    },
    SessionCreated {
        event_id: Option<String>,
        session: ArbitraryJson,
    },
    SessionUpdated {
        event_id: Option<String>,
        session: ArbitraryJson,
    },
    ResponseCreated {
        event_id: Option<String>,
        response: Response,
    },
    ResponseDone {
        event_id: Option<String>,
        response: Response,
    },
    ResponseTextDelta {
        event_id: Option<String>,
        response_id: String,
        item_id: Option<String>,
        delta: String,
    },
    ResponseOutputItemDone {
        event_id: Option<String>,
        response_id: String,
        item: Item,
    },
    InputAudioTranscriptionCompleted {
        event_id: Option<String>,
        item_id: Option<String>,
        /// Absent or null when the endpoint produced no transcript.
        transcript: Option<String>,
    },
    ResponseFunctionCallArgumentsDone {
        event_id: Option<String>,
        response_id: Option<String>,
        item_id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
    Unknown(ArbitraryJson),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum ServerEventRepr {
    #[serde(rename = "error")]
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        error: ServerError,
    },
    #[serde(rename = "session.created")]
    SessionCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default)]
        session: ArbitraryJson,
    },
    #[serde(rename = "session.updated")]
    SessionUpdated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default)]
        session: ArbitraryJson,
    },
    #[serde(rename = "response.created")]
    ResponseCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        response: Response,
    },
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        response: Response,
    },
    #[serde(rename = "response.text.delta", alias = "response.output_text.delta")]
    ResponseTextDelta {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        response_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        delta: String,
    },
    #[serde(rename = "response.output_item.done")]
    ResponseOutputItemDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        response_id: String,
        item: Item,
    },
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputAudioTranscriptionCompleted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    ResponseFunctionCallArgumentsDone {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        call_id: String,
        name: String,
        arguments: String,
    },
}

/// Wire names decoded into typed variants. A frame whose `type` is listed
/// here but whose fields do not match is a decode error, not `Unknown`.
const KNOWN_TYPES: &[&str] = &[
    "error",
    "session.created",
    "session.updated",
    "response.created",
    "response.done",
    "response.text.delta",
    "response.output_text.delta",
    "response.output_item.done",
    "conversation.item.input_audio_transcription.completed",
    "response.function_call_arguments.done",
];

impl From<ServerEventRepr> for ServerEvent {
    fn from(repr: ServerEventRepr) -> Self {
        match repr {
            ServerEventRepr::Error { event_id, error } => Self::Error { event_id, error },
            ServerEventRepr::SessionCreated { event_id, session } => Self::SessionCreated { event_id, session },
            ServerEventRepr::SessionUpdated { event_id, session } => Self::SessionUpdated { event_id, session },
            ServerEventRepr::ResponseCreated { event_id, response } => Self::ResponseCreated { event_id, response },
            ServerEventRepr::ResponseDone { event_id, response } => Self::ResponseDone { event_id, response },
            ServerEventRepr::ResponseTextDelta { event_id, response_id, item_id, delta } => {
                Self::ResponseTextDelta { event_id, response_id, item_id, delta }
            }
            ServerEventRepr::ResponseOutputItemDone { event_id, response_id, item } => {
                Self::ResponseOutputItemDone { event_id, response_id, item }
            }
            ServerEventRepr::InputAudioTranscriptionCompleted { event_id, item_id, transcript } => {
                Self::InputAudioTranscriptionCompleted { event_id, item_id, transcript }
            }
            ServerEventRepr::ResponseFunctionCallArgumentsDone { event_id, response_id, item_id, call_id, name, arguments } => {
                Self::ResponseFunctionCallArgumentsDone { event_id, response_id, item_id, call_id, name, arguments }
            }
        }
    }
}

impl Serialize for ServerEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self.clone() {
            Self::Unknown(value) => return value.serialize(serializer),
            Self::Error { event_id, error } => ServerEventRepr::Error { event_id, error },
            Self::SessionCreated { event_id, session } => ServerEventRepr::SessionCreated { event_id, session },
            Self::SessionUpdated { event_id, session } => ServerEventRepr::SessionUpdated { event_id, session },
            Self::ResponseCreated { event_id, response } => ServerEventRepr::ResponseCreated { event_id, response },
            Self::ResponseDone { event_id, response } => ServerEventRepr::ResponseDone { event_id, response },
            Self::ResponseTextDelta { event_id, response_id, item_id, delta } => {
                ServerEventRepr::ResponseTextDelta { event_id, response_id, item_id, delta }
            }
            Self::ResponseOutputItemDone { event_id, response_id, item } => {
                ServerEventRepr::ResponseOutputItemDone { event_id, response_id, item }
            }
            Self::InputAudioTranscriptionCompleted { event_id, item_id, transcript } => {
                ServerEventRepr::InputAudioTranscriptionCompleted { event_id, item_id, transcript }
            }
            Self::ResponseFunctionCallArgumentsDone { event_id, response_id, item_id, call_id, name, arguments } => {
                ServerEventRepr::ResponseFunctionCallArgumentsDone { event_id, response_id, item_id, call_id, name, arguments }
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServerEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(ArbitraryJson::as_str)
            .ok_or_else(|| D::Error::missing_field("type"))?;

        if !KNOWN_TYPES.contains(&kind) {
            return Ok(Self::Unknown(value));
        }

        let kind = kind.to_owned();
        ServerEventRepr::deserialize(value)
            .map(Self::from)
            .map_err(|err| D::Error::custom(format!("invalid {kind} event: {err}")))
    }
}

impl ServerEvent {
    /// The wire `type` of this event.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::ResponseTextDelta { .. } => "response.text.delta",
            Self::ResponseOutputItemDone { .. } => "response.output_item.done",
            Self::InputAudioTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::ResponseFunctionCallArgumentsDone { .. } => "response.function_call_arguments.done",
            Self::Unknown(value) => value.get("type").and_then(ArbitraryJson::as_str).unwrap_or("unknown"),
        }
    }

    #[must_use]
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Error { event_id, .. }
            | Self::SessionCreated { event_id, .. }
            | Self::SessionUpdated { event_id, .. }
            | Self::ResponseCreated { event_id, .. }
            | Self::ResponseDone { event_id, .. }
            | Self::ResponseTextDelta { event_id, .. }
            | Self::ResponseOutputItemDone { event_id, .. }
            | Self::InputAudioTranscriptionCompleted { event_id, .. }
            | Self::ResponseFunctionCallArgumentsDone { event_id, .. } => event_id.as_deref(),
            Self::Unknown(value) => value.get("event_id").and_then(ArbitraryJson::as_str),
        }
    }
}
