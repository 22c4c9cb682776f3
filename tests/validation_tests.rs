use oai_rt_voice::Error;
use oai_rt_voice::protocol::models::{AudioConfig, AudioFormat, InputAudioConfig, OutputAudioConfig};
use oai_rt_voice::sdk::{AgentConfig, ReconnectPolicy, ToolRegistry};
use serde_json::json;
use std::time::Duration;

fn with_input_format(format: AudioFormat) -> AgentConfig {
    AgentConfig::default().with_audio(AudioConfig {
        input: Some(InputAudioConfig {
            format: Some(format),
            ..InputAudioConfig::default()
        }),
        output: None,
    })
}

#[test]
fn pcm_24khz_is_accepted() {
    assert!(with_input_format(AudioFormat::pcm_24khz()).to_wire().is_ok());
}

#[test]
fn pcm_other_rates_are_rejected() {
    let err = with_input_format(AudioFormat::Pcm { rate: 16_000 }).to_wire().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("24000")));
}

#[test]
fn g711_formats_are_accepted() {
    assert!(with_input_format(AudioFormat::Pcmu).to_wire().is_ok());
    assert!(with_input_format(AudioFormat::Pcma).to_wire().is_ok());
}

#[test]
fn output_format_is_validated_too() {
    let config = AgentConfig::default().with_audio(AudioConfig {
        input: None,
        output: Some(OutputAudioConfig {
            format: Some(AudioFormat::Pcm { rate: 8_000 }),
            ..OutputAudioConfig::default()
        }),
    });
    assert!(matches!(config.to_wire(), Err(Error::InvalidConfig(_))));
}

#[test]
fn duplicate_tool_names_are_rejected() {
    let mut registry = ToolRegistry::new();
    registry
        .raw_tool("hang_up", None, json!({ "type": "object" }), |_| async { Ok(json!({})) })
        .unwrap();
    let err = registry
        .raw_tool("hang_up", None, json!({ "type": "object" }), |_| async { Ok(json!({})) })
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateTool(name) if name == "hang_up"));
    assert_eq!(registry.definitions().len(), 1);
}

#[test]
fn text_only_config_goes_out_as_text() {
    let wire = serde_json::to_value(AgentConfig::new("gpt-realtime-mini").output_text().to_wire().unwrap()).unwrap();
    assert_eq!(wire["model"], "gpt-realtime-mini");
    assert_eq!(wire["output_modalities"], json!(["text"]));
}

#[test]
fn reconnect_delays_double_up_to_the_cap() {
    let policy = ReconnectPolicy::default();
    let delays: Vec<_> = (0..6).map(|attempt| policy.next_delay(attempt).as_millis()).collect();
    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);

    let custom = ReconnectPolicy::new(Duration::from_millis(100), Duration::from_millis(250));
    assert_eq!(custom.next_delay(3), Duration::from_millis(250));
}
