use serde::{Deserialize, Serialize};

use super::{Eagerness, Nullable, Voice};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum AudioFormat {
    #[serde(rename = "audio/pcm")]
    Pcm {
        #[serde(default = "default_pcm_rate")]
        rate: u32,
    },
    #[serde(rename = "audio/pcmu")]
    Pcmu,
    #[serde(rename = "audio/pcma")]
    Pcma,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pcm { .. } => write!(f, "audio/pcm"),
            Self::Pcmu => write!(f, "audio/pcmu"),
            Self::Pcma => write!(f, "audio/pcma"),
        }
    }
}

const PCM_24KHZ_RATE: u32 = 24_000;

const fn default_pcm_rate() -> u32 {
    PCM_24KHZ_RATE
}

impl AudioFormat {
    #[must_use]
    pub const fn pcm_24khz() -> Self {
        Self::Pcm {
            rate: PCM_24KHZ_RATE,
        }
    }

    /// # Errors
    /// Returns an error if a PCM format is configured with a non-24kHz rate.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Pcm { rate } if *rate != PCM_24KHZ_RATE => Err(crate::Error::InvalidConfig(
                format!("audio/pcm rate must be {PCM_24KHZ_RATE}, got {rate}"),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AudioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputAudioConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputAudioConfig>,
}

impl AudioConfig {
    /// Check every configured format in both directions.
    ///
    /// # Errors
    /// Returns an error if any configured format is invalid.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> crate::Result<()> {
        let input = self.input.as_ref().and_then(|i| i.format.as_ref());
        let output = self.output.as_ref().and_then(|o| o.format.as_ref());
        for format in input.into_iter().chain(output) {
            format.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InputAudioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    /// `Some(Nullable::Null)` disables server-side turn detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<Nullable<TurnDetection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<Nullable<InputAudioTranscription>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_reduction: Option<Nullable<NoiseReduction>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NoiseReduction {
    #[serde(rename = "type")]
    pub kind: NoiseReductionType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReductionType {
    #[default]
    NearField,
    FarField,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputAudioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct InputAudioTranscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetection {
    ServerVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        idle_timeout_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
    SemanticVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<Eagerness>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
}
