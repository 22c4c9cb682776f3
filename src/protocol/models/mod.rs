pub mod audio;
pub mod common;
pub mod items;
pub mod response;
pub mod session;
pub mod tools;
pub mod usage;

pub use audio::{
    AudioConfig, AudioFormat, InputAudioConfig, InputAudioTranscription, NoiseReduction,
    NoiseReductionType, OutputAudioConfig, TurnDetection,
};
pub use common::{
    ArbitraryJson, DEFAULT_MODEL, Eagerness, Infinite, ItemStatus, JsonSchema, MaxTokens, Metadata,
    Modality, Nullable, OutputModalities, Role, Voice,
};
pub use items::{ContentPart, Item};
pub use response::{Response, ResponseStatus, ResponseStatusDetails};
pub use session::{
    RetentionRatioTruncation, SessionConfig, SessionKind, TokenLimits, Tracing, TracingAuto,
    TracingConfig, Truncation, TruncationStrategy, TruncationType,
};
pub use tools::{Tool, ToolChoice, ToolChoiceMode};
pub use usage::{CachedTokenDetails, InputTokenDetails, OutputTokenDetails, Usage};
