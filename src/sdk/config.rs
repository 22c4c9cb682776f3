use crate::Result;
use crate::protocol::models::{
    AudioConfig, DEFAULT_MODEL, MaxTokens, OutputModalities, SessionConfig, SessionKind, ToolChoice,
    Tracing, Truncation,
};

use super::tools::ToolRegistry;

/// Caller-owned description of the agent.
///
/// Share it with a session through a `tokio::sync::watch` channel: the caller
/// keeps the sender and every `send`/`send_modify` is pushed to the live
/// session as a `session.update`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub instructions: Option<String>,
    pub tools: ToolRegistry,
    pub tool_choice: Option<ToolChoice>,
    pub output_modalities: OutputModalities,
    pub max_output_tokens: Option<MaxTokens>,
    pub audio: Option<AudioConfig>,
    pub tracing: Option<Tracing>,
    pub truncation: Option<Truncation>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl AgentConfig {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            instructions: None,
            tools: ToolRegistry::new(),
            tool_choice: None,
            output_modalities: OutputModalities::Audio,
            max_output_tokens: None,
            audio: None,
            tracing: None,
            truncation: None,
        }
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    #[must_use]
    pub const fn output_text(mut self) -> Self {
        self.output_modalities = OutputModalities::Text;
        self
    }

    #[must_use]
    pub const fn output_audio(mut self) -> Self {
        self.output_modalities = OutputModalities::Audio;
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, max: MaxTokens) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = Some(audio);
        self
    }

    #[must_use]
    pub fn with_tracing(mut self, tracing: Tracing) -> Self {
        self.tracing = Some(tracing);
        self
    }

    #[must_use]
    pub fn with_truncation(mut self, truncation: Truncation) -> Self {
        self.truncation = Some(truncation);
        self
    }

    /// Build the wire session descriptor.
    ///
    /// # Errors
    /// Returns an error if an audio format is invalid.
    #[allow(clippy::result_large_err)]
    pub fn to_wire(&self) -> Result<SessionConfig> {
        if let Some(audio) = &self.audio {
            audio.validate()?;
        }

        let mut session = SessionConfig::new(SessionKind::Realtime, &self.model, self.output_modalities);
        session.instructions.clone_from(&self.instructions);
        if !self.tools.is_empty() {
            session.tools = Some(self.tools.as_tools());
        }
        session.tool_choice.clone_from(&self.tool_choice);
        session.max_output_tokens.clone_from(&self.max_output_tokens);
        session.audio.clone_from(&self.audio);
        session.tracing.clone_from(&self.tracing);
        session.truncation.clone_from(&self.truncation);
        Ok(session)
    }
}
