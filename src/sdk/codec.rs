use chrono::{SecondsFormat, Utc};

use crate::error::ServerError;
use crate::protocol::client_events::ClientEvent;
use crate::protocol::models::{Item, Role, SessionConfig, Usage};
use crate::protocol::server_events::ServerEvent;
use crate::{Error, Result, TRACE_LOG_MAX_BYTES, safe_truncate};

use super::tools::ToolCall;

const PART_SEPARATOR: &str = "\n\n";

/// Something the session wants to tell the remote endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SessionUpdate(Box<SessionConfig>),
    ResponseCreate,
    UserMessage(String),
    SystemMessage(String),
    FunctionOutput { call_id: String, output: String },
    ClearOutputAudio,
}

/// A decoded inbound frame, reduced to what the orchestrator routes on.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SessionStarted,
    Typing,
    ResponseDone {
        conversation_id: Option<String>,
        usage: Option<Usage>,
    },
    TextDelta {
        response_id: String,
        delta: String,
    },
    MessageDone {
        response_id: String,
        text: String,
    },
    UserTranscript {
        id: String,
        text: String,
    },
    ToolCallRequested(ToolCall),
    RemoteError(ServerError),
    Ignored {
        kind: String,
    },
}

/// Translates between [`Intent`]/[`InboundEvent`] and JSON text frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// # Errors
    /// Returns an error if the intent cannot be serialized.
    #[allow(clippy::result_large_err)]
    pub fn encode(&self, intent: &Intent) -> Result<String> {
        let event = match intent {
            Intent::SessionUpdate(session) => ClientEvent::session_update(session.as_ref().clone()),
            Intent::ResponseCreate => ClientEvent::response_create(),
            Intent::UserMessage(text) => ClientEvent::item_create(Item::text_message(Role::User, text)),
            Intent::SystemMessage(text) => {
                ClientEvent::item_create(Item::text_message(Role::System, text))
            }
            Intent::FunctionOutput { call_id, output } => {
                ClientEvent::item_create(Item::function_output(call_id, output))
            }
            Intent::ClearOutputAudio => ClientEvent::clear_output_audio(),
        };
        let json = serde_json::to_string(&event)?;
        tracing::trace!("Encoded frame: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
        Ok(json)
    }

    /// # Errors
    /// Returns [`Error::Decode`] for malformed JSON, a missing `type`, or a
    /// known event whose required fields are missing.
    #[allow(clippy::result_large_err)]
    pub fn decode(&self, frame: &str) -> Result<InboundEvent> {
        tracing::trace!("Decoding frame: {}", safe_truncate(frame, TRACE_LOG_MAX_BYTES));
        let event: ServerEvent =
            serde_json::from_str(frame).map_err(|e| Error::Decode(e.to_string()))?;
        Ok(Self::classify(event))
    }

    fn classify(event: ServerEvent) -> InboundEvent {
        match event {
            ServerEvent::SessionCreated { .. } | ServerEvent::SessionUpdated { .. } => {
                InboundEvent::SessionStarted
            }
            ServerEvent::ResponseCreated { .. } => InboundEvent::Typing,
            ServerEvent::ResponseDone { response, .. } => InboundEvent::ResponseDone {
                conversation_id: response.conversation_id,
                usage: response.usage,
            },
            ServerEvent::ResponseTextDelta { response_id, delta, .. } => {
                InboundEvent::TextDelta { response_id, delta }
            }
            ServerEvent::ResponseOutputItemDone { response_id, item: Item::Message { content, .. }, .. } => {
                let text = content
                    .iter()
                    .map(|part| part.transcript_or_text().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(PART_SEPARATOR);
                InboundEvent::MessageDone { response_id, text }
            }
            ServerEvent::InputAudioTranscriptionCompleted { item_id, transcript: Some(transcript), .. }
                if !transcript.is_empty() =>
            {
                let id = item_id.unwrap_or_else(fallback_id);
                InboundEvent::UserTranscript { id, text: transcript }
            }
            ServerEvent::ResponseFunctionCallArgumentsDone { call_id, name, arguments, .. } => {
                InboundEvent::ToolCallRequested(ToolCall { call_id, name, arguments })
            }
            ServerEvent::Error { error, .. } => InboundEvent::RemoteError(error),
            other => InboundEvent::Ignored { kind: other.kind().to_string() },
        }
    }
}

/// Identifier for events the endpoint sends without one: the current time,
/// RFC 3339 with millisecond precision.
fn fallback_id() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
