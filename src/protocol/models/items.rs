use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ArbitraryJson, ItemStatus, Role};

/// Conversation item. Manual (de)serialization keeps unknown item kinds as
/// raw JSON so new server-side item types never fail a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Message {
        id: Option<String>,
        status: Option<ItemStatus>,
        role: Role,
        content: Vec<ContentPart>,
    },
    FunctionCall {
        id: Option<String>,
        status: Option<ItemStatus>,
        name: String,
        call_id: String,
        arguments: String,
    },
    FunctionCallOutput {
        id: Option<String>,
        call_id: String,
        output: String,
    },
    Unknown(ArbitraryJson),
}

impl Item {
    /// A single-part `input_text` message authored by `role`.
    #[must_use]
    pub fn text_message(role: Role, text: impl Into<String>) -> Self {
        Self::Message {
            id: None,
            status: None,
            role,
            content: vec![ContentPart::InputText { text: text.into() }],
        }
    }

    #[must_use]
    pub fn function_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::FunctionCallOutput {
            id: None,
            call_id: call_id.into(),
            output: output.into(),
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Message { .. } => "message",
            Self::FunctionCall { .. } => "function_call",
            Self::FunctionCallOutput { .. } => "function_call_output",
            Self::Unknown(_) => "unknown",
        };
        write!(f, "{label}")
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ItemRepr {
    Message {
        id: Option<String>,
        status: Option<ItemStatus>,
        role: Role,
        #[serde(default)]
        content: Vec<ContentPart>,
    },
    FunctionCall {
        id: Option<String>,
        status: Option<ItemStatus>,
        name: String,
        call_id: String,
        arguments: String,
    },
    FunctionCallOutput {
        id: Option<String>,
        call_id: String,
        output: String,
    },
}

impl From<ItemRepr> for Item {
    fn from(repr: ItemRepr) -> Self {
        match repr {
            ItemRepr::Message { id, status, role, content } => Self::Message { id, status, role, content },
            ItemRepr::FunctionCall { id, status, name, call_id, arguments } => {
                Self::FunctionCall { id, status, name, call_id, arguments }
            }
            ItemRepr::FunctionCallOutput { id, call_id, output } => {
                Self::FunctionCallOutput { id, call_id, output }
            }
        }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown(value) => value.serialize(serializer),
            Self::Message { id, status, role, content } => {
                let mut state = serializer.serialize_struct("Item", 5)?;
                state.serialize_field("type", "message")?;
                if let Some(value) = id {
                    state.serialize_field("id", value)?;
                }
                if let Some(value) = status {
                    state.serialize_field("status", value)?;
                }
                state.serialize_field("role", role)?;
                state.serialize_field("content", content)?;
                state.end()
            }
            Self::FunctionCall { id, status, name, call_id, arguments } => {
                let mut state = serializer.serialize_struct("Item", 6)?;
                state.serialize_field("type", "function_call")?;
                if let Some(value) = id {
                    state.serialize_field("id", value)?;
                }
                if let Some(value) = status {
                    state.serialize_field("status", value)?;
                }
                state.serialize_field("name", name)?;
                state.serialize_field("call_id", call_id)?;
                state.serialize_field("arguments", arguments)?;
                state.end()
            }
            Self::FunctionCallOutput { id, call_id, output } => {
                let mut state = serializer.serialize_struct("Item", 4)?;
                state.serialize_field("type", "function_call_output")?;
                if let Some(value) = id {
                    state.serialize_field("id", value)?;
                }
                state.serialize_field("call_id", call_id)?;
                state.serialize_field("output", output)?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ItemRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::debug!("Failed to parse Item: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}

/// One part of a message's content. Audio payload bytes are not modelled;
/// only the transcript matters to the control plane.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    InputText { text: String },
    InputAudio { transcript: Option<String> },
    OutputText { text: String },
    OutputAudio { transcript: Option<String> },
    Text { text: String },
    Audio { transcript: Option<String> },
    Unknown(ArbitraryJson),
}

impl ContentPart {
    /// The transcript if the part carries one, else its text.
    #[must_use]
    pub fn transcript_or_text(&self) -> Option<&str> {
        match self {
            Self::InputText { text } | Self::OutputText { text } | Self::Text { text } => {
                Some(text)
            }
            Self::InputAudio { transcript }
            | Self::OutputAudio { transcript }
            | Self::Audio { transcript } => transcript.as_deref(),
            Self::Unknown(value) => value
                .get("transcript")
                .and_then(|v| v.as_str())
                .or_else(|| value.get("text").and_then(|v| v.as_str())),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::InputText { .. } => "input_text",
            Self::InputAudio { .. } => "input_audio",
            Self::OutputText { .. } => "output_text",
            Self::OutputAudio { .. } => "output_audio",
            Self::Text { .. } => "text",
            Self::Audio { .. } => "audio",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for ContentPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind())
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPartRepr {
    InputText { text: String },
    InputAudio { transcript: Option<String> },
    OutputText { text: String },
    OutputAudio { transcript: Option<String> },
    Text { text: String },
    Audio { transcript: Option<String> },
}

impl From<ContentPartRepr> for ContentPart {
    fn from(repr: ContentPartRepr) -> Self {
        match repr {
            ContentPartRepr::InputText { text } => Self::InputText { text },
            ContentPartRepr::InputAudio { transcript } => Self::InputAudio { transcript },
            ContentPartRepr::OutputText { text } => Self::OutputText { text },
            ContentPartRepr::OutputAudio { transcript } => Self::OutputAudio { transcript },
            ContentPartRepr::Text { text } => Self::Text { text },
            ContentPartRepr::Audio { transcript } => Self::Audio { transcript },
        }
    }
}

impl Serialize for ContentPart {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown(value) => value.serialize(serializer),
            Self::InputText { text } | Self::OutputText { text } | Self::Text { text } => {
                let mut state = serializer.serialize_struct("ContentPart", 2)?;
                state.serialize_field("type", self.kind())?;
                state.serialize_field("text", text)?;
                state.end()
            }
            Self::InputAudio { transcript }
            | Self::OutputAudio { transcript }
            | Self::Audio { transcript } => {
                let mut state = serializer.serialize_struct("ContentPart", 2)?;
                state.serialize_field("type", self.kind())?;
                if let Some(value) = transcript {
                    state.serialize_field("transcript", value)?;
                }
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ContentPart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = ArbitraryJson::deserialize(deserializer)?;
        match ContentPartRepr::deserialize(value.clone()) {
            Ok(repr) => Ok(repr.into()),
            Err(err) => {
                tracing::debug!("Failed to parse ContentPart: {err}");
                Ok(Self::Unknown(value))
            }
        }
    }
}
