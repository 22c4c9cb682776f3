#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod error;
pub mod protocol;
pub mod sdk;
pub mod transport;

pub use error::{ApiErrorType, Error, Result, ServerError};
pub use protocol::client_events::ClientEvent;
pub use protocol::models::{
    AudioConfig, AudioFormat, ContentPart, Eagerness, InputAudioConfig, InputAudioTranscription,
    Item, MaxTokens, Modality, NoiseReduction, NoiseReductionType, OutputAudioConfig,
    OutputModalities, Role, SessionConfig, SessionKind, Tool, ToolChoice, ToolChoiceMode, Tracing,
    Truncation, TurnDetection, Usage, Voice,
};
pub use protocol::server_events::ServerEvent;
pub use sdk::{
    AgentConfig, ConnectionState, EventHandlers, MessageEvent, ProtocolError, ReconnectPolicy,
    SessionBuilder, SessionOrchestrator, SessionStatus, ToolCall, ToolRegistry, UsageRecord,
};
pub use transport::rest::{CredentialProvider, RestSignaling};
pub use transport::ws::WsTransportFactory;
pub use transport::{
    IceConnectionState, MediaTrack, Signaling, Transport, TransportEvent, TransportEvents,
    TransportFactory,
};

pub(crate) const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

pub(crate) fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "héllo";
        let out = safe_truncate(s, 2);
        assert!(out.starts_with('h'));
        assert!(out.contains(TRACE_TRUNCATE_SUFFIX));
        assert_eq!(safe_truncate("short", 10), "short");
    }
}
