mod common;

use common::Harness;
use oai_rt_voice::protocol::models::Role;
use oai_rt_voice::sdk::{AgentConfig, ConnectionState, MessageEvent, ProtocolError, SessionOrchestrator, ToolRegistry};
use oai_rt_voice::transport::{IceConnectionState, MediaTrack, TransportEvent};
use oai_rt_voice::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::advance;

#[derive(Debug, Deserialize, JsonSchema)]
struct EchoArgs {
    text: String,
}

#[derive(Debug, Serialize)]
struct EchoResp {
    echoed: String,
}

fn tool_call(call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "type": "response.function_call_arguments.done",
        "response_id": "resp_1",
        "item_id": "item_1",
        "call_id": call_id,
        "name": name,
        "arguments": arguments
    })
}

fn outputs(h: &Harness) -> Vec<Value> {
    h.frames()
        .into_iter()
        .filter(|f| f["type"] == "conversation.item.create" && f["item"]["type"] == "function_call_output")
        .map(|f| f["item"].clone())
        .collect()
}

fn count(h: &Harness, kind: &str) -> usize {
    h.frame_types().iter().filter(|t| *t == kind).count()
}

#[tokio::test(start_paused = true)]
async fn greets_once_when_speaking_on_ready() {
    let h = Harness::new(AgentConfig::default().with_instructions("Be brief."));
    assert_eq!(h.session.state(), ConnectionState::Disconnected);

    h.connect_ready().await;

    assert_eq!(h.frame_types(), vec!["session.update", "response.create"]);
    let update = &h.frames()[0];
    assert_eq!(update["session"]["type"], "realtime");
    assert_eq!(update["session"]["model"], "gpt-realtime");
    assert_eq!(update["session"]["instructions"], "Be brief.");
    assert!(update["session"].get("tools").is_none());
    assert_eq!(h.signaling.offers.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn config_changes_resend_session_update_only() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    h.clear_frames();

    h.config.send_modify(|config| config.instructions = Some("Speak French.".into()));
    h.idle().await;

    assert_eq!(h.frame_types(), vec!["session.update"]);
    assert_eq!(h.frames()[0]["session"]["instructions"], "Speak French.");
    assert_eq!(h.session.state(), ConnectionState::ConnectedReady);
}

#[tokio::test(start_paused = true)]
async fn config_changes_while_disconnected_are_picked_up_on_connect() {
    let h = Harness::with(AgentConfig::default(), |b| b.speak_on_ready(false));
    h.config.send_modify(|config| config.instructions = Some("Late edit.".into()));
    h.idle().await;
    assert!(h.frames().is_empty());

    h.connect_ready().await;
    assert_eq!(h.frame_types(), vec!["session.update"]);
    assert_eq!(h.frames()[0]["session"]["instructions"], "Late edit.");
}

#[tokio::test(start_paused = true)]
async fn registered_tools_are_advertised() {
    let mut tools = ToolRegistry::new();
    tools
        .tool_with_description("echo", "Repeat the input.", |args: EchoArgs| async move {
            Ok(EchoResp { echoed: args.text })
        })
        .unwrap();
    let h = Harness::new(AgentConfig::default().with_tools(tools));
    h.connect_ready().await;

    let session = &h.frames()[0]["session"];
    assert_eq!(session["tools"][0]["type"], "function");
    assert_eq!(session["tools"][0]["name"], "echo");
    assert_eq!(session["tools"][0]["description"], "Repeat the input.");
    assert_eq!(session["tools"][0]["parameters"]["properties"]["text"]["type"], "string");
}

#[tokio::test(start_paused = true)]
async fn start_message_is_deferred_until_ready() {
    let h = Harness::with(AgentConfig::default(), |b| b.speak_on_ready(false));
    h.signaling.delay_ms.store(50, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    assert_eq!(h.session.state(), ConnectionState::Connecting);
    h.session.start_message().await.unwrap();
    assert!(h.frames().is_empty());

    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;
    assert_eq!(h.frame_types(), vec!["session.update", "response.create"]);
}

#[tokio::test(start_paused = true)]
async fn start_message_is_ignored_when_speaking_on_ready() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    h.clear_frames();

    h.session.start_message().await.unwrap();
    h.idle().await;
    assert!(h.frames().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resume_while_connecting_runs_once_ready() {
    let h = Harness::with(AgentConfig::default(), |b| b.speak_on_ready(false));
    h.signaling.delay_ms.store(50, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    h.session
        .resume_conversation(Some("The user is back.".into()))
        .await
        .unwrap();

    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;

    assert_eq!(
        h.frame_types(),
        vec!["session.update", "conversation.item.create", "response.create"]
    );
    let item = &h.frames()[1]["item"];
    assert_eq!(item["role"], "system");
    assert_eq!(item["content"][0]["type"], "input_text");
    assert_eq!(item["content"][0]["text"], "The user is back.");
}

#[tokio::test(start_paused = true)]
async fn only_the_latest_deferred_action_survives() {
    let h = Harness::with(AgentConfig::default(), |b| b.speak_on_ready(false));
    h.signaling.delay_ms.store(50, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    h.session.resume_conversation(Some("first".into())).await.unwrap();
    h.session.resume_conversation(None).await.unwrap();

    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;
    assert_eq!(h.frame_types(), vec!["session.update", "response.create"]);
}

#[tokio::test(start_paused = true)]
async fn resume_when_ready_runs_immediately() {
    let h = Harness::with(AgentConfig::default(), |b| b.speak_on_ready(false));
    h.connect_ready().await;
    h.clear_frames();

    h.session.resume_conversation(None).await.unwrap();
    assert_eq!(h.frame_types(), vec!["response.create"]);
}

#[tokio::test(start_paused = true)]
async fn connect_while_connecting_is_a_no_op() {
    let h = Harness::new(AgentConfig::default());
    h.signaling.delay_ms.store(100, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    h.session.connect().await.unwrap();
    assert_eq!(h.opened(), 1);

    h.wait_for(ConnectionState::ConnectedReady).await;
    assert_eq!(h.opened(), 1);
    assert_eq!(h.credentials(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_is_idempotent() {
    let h = Harness::new(AgentConfig::default());
    h.session.disconnect().await.unwrap();

    h.connect_ready().await;
    h.session.disconnect().await.unwrap();
    h.session.disconnect().await.unwrap();

    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert_eq!(h.session.status().reconnect_attempts, 0);
    assert_eq!(h.live(), 0);

    advance(Duration::from_secs(30)).await;
    h.idle().await;
    assert_eq!(h.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_negotiation_discards_the_attempt() {
    let h = Harness::new(AgentConfig::default());
    h.signaling.delay_ms.store(100, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    h.session.disconnect().await.unwrap();
    advance(Duration::from_millis(200)).await;
    h.idle().await;

    assert_eq!(h.session.state(), ConnectionState::Disconnected);
    assert!(h.frames().is_empty());
    assert_eq!(h.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn ice_failure_reconnects_after_base_delay() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.emit(TransportEvent::IceStateChanged(IceConnectionState::Failed));
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.session.status().reconnect_attempts, 1);
    assert_eq!(h.live(), 0);

    advance(Duration::from_millis(990)).await;
    h.idle().await;
    assert_eq!(h.opened(), 1);

    advance(Duration::from_millis(20)).await;
    h.idle().await;
    assert_eq!(h.opened(), 2);

    h.wait_for(ConnectionState::ConnectedReady).await;
    assert_eq!(h.session.status().reconnect_attempts, 0);
    assert_eq!(count(&h, "session.update"), 2);
    assert_eq!(count(&h, "response.create"), 2);
}

#[tokio::test(start_paused = true)]
async fn every_terminal_ice_state_reconnects() {
    for ice in [IceConnectionState::Disconnected, IceConnectionState::Closed] {
        let h = Harness::new(AgentConfig::default());
        h.connect_ready().await;

        h.emit(TransportEvent::IceStateChanged(ice));
        h.idle().await;
        assert_eq!(h.session.state(), ConnectionState::Reconnecting, "{ice:?}");
        assert_eq!(h.live(), 0, "{ice:?}");

        advance(Duration::from_millis(1010)).await;
        h.idle().await;
        assert_eq!(h.opened(), 2, "{ice:?}");
        h.wait_for(ConnectionState::ConnectedReady).await;
    }
}

#[test]
fn terminal_ice_states() {
    use IceConnectionState::{Checking, Closed, Completed, Connected, Disconnected, Failed, New};
    for ice in [Failed, Disconnected, Closed] {
        assert!(ice.is_terminal(), "{ice:?}");
    }
    for ice in [New, Checking, Connected, Completed] {
        assert!(!ice.is_terminal(), "{ice:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn non_terminal_ice_states_are_ignored() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.emit(TransportEvent::IceStateChanged(IceConnectionState::Checking));
    h.emit(TransportEvent::IceStateChanged(IceConnectionState::Connected));
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::ConnectedReady);
}

#[tokio::test(start_paused = true)]
async fn channel_close_reconnects() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.emit(TransportEvent::Closed);
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);

    h.wait_for(ConnectionState::ConnectedReady).await;
    assert_eq!(h.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn signaling_failures_back_off_then_reset() {
    let h = Harness::new(AgentConfig::default());
    h.signaling.fail.store(true, Ordering::SeqCst);

    h.session.connect().await.unwrap();
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.credentials(), 1);
    assert_eq!(h.session.status().reconnect_attempts, 1);

    advance(Duration::from_millis(1000)).await;
    h.idle().await;
    assert_eq!(h.credentials(), 2);
    assert_eq!(h.session.status().reconnect_attempts, 2);

    advance(Duration::from_millis(1990)).await;
    h.idle().await;
    assert_eq!(h.credentials(), 2);

    advance(Duration::from_millis(20)).await;
    h.idle().await;
    assert_eq!(h.credentials(), 3);

    h.signaling.fail.store(false, Ordering::SeqCst);
    h.wait_for(ConnectionState::ConnectedReady).await;
    assert_eq!(h.session.status().reconnect_attempts, 0);
    assert_eq!(h.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn establish_failure_schedules_reconnect() {
    let h = Harness::new(AgentConfig::default());
    h.transport.state.lock().unwrap().fail_establish = true;

    h.session.connect().await.unwrap();
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    assert_eq!(h.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn rapid_cycles_keep_at_most_one_transport() {
    let h = Harness::new(AgentConfig::default());
    for i in 0..25 {
        h.session.connect().await.unwrap();
        if i % 3 == 0 {
            h.idle().await;
        }
        if i % 5 == 0 {
            h.emit(TransportEvent::IceStateChanged(IceConnectionState::Failed));
        }
        h.session.disconnect().await.unwrap();
    }
    h.session.connect().await.unwrap();
    h.wait_for(ConnectionState::ConnectedReady).await;

    assert!(h.max_live() <= 1);
    assert_eq!(h.live(), 1);

    h.session.disconnect().await.unwrap();
    assert_eq!(h.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_transport_events_are_ignored() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    let stale = h.transport.state.lock().unwrap().events[0].clone();

    h.emit(TransportEvent::Closed);
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;

    stale.emit(TransportEvent::Closed);
    stale.emit(TransportEvent::Message(
        json!({"type": "response.text.delta", "response_id": "r", "item_id": "i", "delta": "ghost"})
            .to_string(),
    ));
    h.idle().await;

    assert_eq!(h.session.state(), ConnectionState::ConnectedReady);
    assert!(h.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deltas_precede_the_completed_message() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.inbound(&json!({"type": "response.created", "response": {"id": "resp_1", "status": "in_progress"}}));
    h.inbound(&json!({"type": "response.text.delta", "response_id": "resp_1", "item_id": "item_1", "delta": "Hel"}));
    h.inbound(&json!({"type": "response.output_text.delta", "response_id": "resp_1", "item_id": "item_1", "delta": "lo"}));
    h.inbound(&json!({
        "type": "response.output_item.done",
        "response_id": "resp_1",
        "item": {
            "id": "item_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "output_text", "text": "Hello"}]
        }
    }));
    h.idle().await;

    assert_eq!(
        h.messages(),
        vec![
            MessageEvent::Typing,
            MessageEvent::MessagePart { id: "resp_1".into(), role: Role::Assistant, text_delta: "Hel".into() },
            MessageEvent::MessagePart { id: "resp_1".into(), role: Role::Assistant, text_delta: "lo".into() },
            MessageEvent::Message { id: "resp_1".into(), role: Role::Assistant, text: "Hello".into() },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn user_transcripts_become_user_messages() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.inbound(&json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_9",
        "content_index": 0,
        "transcript": "What's the weather?"
    }));
    h.inbound(&json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_10",
        "transcript": ""
    }));
    h.idle().await;

    assert_eq!(
        h.messages(),
        vec![MessageEvent::Message {
            id: "item_9".into(),
            role: Role::User,
            text: "What's the weather?".into()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn usage_is_reported_with_session_start() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.inbound(&json!({"type": "session.created", "session": {"id": "sess_1"}}));
    h.inbound(&json!({
        "type": "response.done",
        "response": {
            "id": "resp_1",
            "conversation_id": "conv_1",
            "status": "completed",
            "usage": {"total_tokens": 30, "input_tokens": 10, "output_tokens": 20}
        }
    }));
    h.idle().await;

    let usage = h.usage.lock().unwrap().clone();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].conversation_id.as_deref(), Some("conv_1"));
    assert!(usage[0].started_at.is_some());
    assert_eq!(usage[0].usage.as_ref().map(|u| u.total_tokens), Some(30));
}

#[tokio::test(start_paused = true)]
async fn session_start_is_cleared_on_reconnect() {
    let done = json!({
        "type": "response.done",
        "response": {"id": "resp_1", "conversation_id": "conv_1", "status": "completed"}
    });
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    h.inbound(&json!({"type": "session.created", "session": {"id": "sess_1"}}));
    h.inbound(&done);
    h.idle().await;

    h.emit(TransportEvent::IceStateChanged(IceConnectionState::Failed));
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;

    h.inbound(&done);
    h.idle().await;
    h.inbound(&json!({"type": "session.created", "session": {"id": "sess_2"}}));
    h.inbound(&done);
    h.idle().await;

    let started: Vec<_> = h.usage.lock().unwrap().iter().map(|r| r.started_at).collect();
    assert_eq!(started.len(), 3);
    assert!(started[0].is_some());
    assert!(started[1].is_none());
    assert!(started[2].is_some());
}

#[tokio::test(start_paused = true)]
async fn null_transcripts_are_skipped_quietly() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.inbound(&json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "item_11",
        "transcript": null
    }));
    h.idle().await;

    assert!(h.messages().is_empty());
    assert!(h.errors.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn protocol_errors_are_reported_and_survived() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;

    h.inbound(&json!({
        "type": "error",
        "event_id": "evt_1",
        "error": {"type": "invalid_request_error", "code": "bad_value", "message": "nope"}
    }));
    h.emit(TransportEvent::Message("{not json".to_string()));
    h.inbound(&json!({"type": "rate_limits.updated", "rate_limits": []}));
    h.idle().await;

    let errors = h.errors.lock().unwrap().clone();
    assert_eq!(errors.len(), 2);
    assert!(matches!(&errors[0], ProtocolError::Remote(err) if err.message == "nope"));
    assert!(matches!(&errors[1], ProtocolError::Decode(_)));
    assert_eq!(h.session.state(), ConnectionState::ConnectedReady);
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_succeeds_then_responds_once_after_settle() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    h.clear_frames();

    h.inbound(&tool_call("call_1", "lookup", "{}"));
    h.idle().await;

    let out = outputs(&h);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0]["call_id"], "call_1");
    assert_eq!(serde_json::from_str::<Value>(out[0]["output"].as_str().unwrap()).unwrap(), json!({"success": true}));
    assert_eq!(count(&h, "response.create"), 0);

    advance(Duration::from_millis(260)).await;
    h.idle().await;
    assert_eq!(count(&h, "response.create"), 1);

    advance(Duration::from_secs(5)).await;
    h.idle().await;
    assert_eq!(count(&h, "response.create"), 1);
}

#[tokio::test(start_paused = true)]
async fn typed_tool_result_is_sent_back() {
    let mut tools = ToolRegistry::new();
    tools
        .tool("echo", |args: EchoArgs| async move { Ok(EchoResp { echoed: args.text }) })
        .unwrap();
    let h = Harness::new(AgentConfig::default().with_tools(tools));
    h.connect_ready().await;

    h.inbound(&tool_call("call_7", "echo", r#"{"text":"ping"}"#));
    h.idle().await;

    let out = outputs(&h);
    assert_eq!(out.len(), 1);
    let payload: Value = serde_json::from_str(out[0]["output"].as_str().unwrap()).unwrap();
    assert_eq!(payload, json!({"echoed": "ping"}));
}

#[tokio::test(start_paused = true)]
async fn failing_tool_reports_error_payload() {
    let mut tools = ToolRegistry::new();
    tools
        .raw_tool("fetch", None, json!({"type": "object"}), |_args: Value| async move {
            Err::<Value, _>(Error::Tool("database unavailable".into()))
        })
        .unwrap();
    let h = Harness::new(AgentConfig::default().with_tools(tools));
    h.connect_ready().await;

    h.inbound(&tool_call("call_2", "fetch", "{}"));
    h.idle().await;

    let out = outputs(&h);
    assert_eq!(out.len(), 1);
    let payload: Value = serde_json::from_str(out[0]["output"].as_str().unwrap()).unwrap();
    assert_eq!(payload["error"], "Tool invocation failed: database unavailable");
    assert_eq!(h.session.state(), ConnectionState::ConnectedReady);

    advance(Duration::from_millis(260)).await;
    h.idle().await;
    assert_eq!(count(&h, "response.create"), 2);
}

#[tokio::test(start_paused = true)]
async fn duplicate_call_ids_are_dispatched_once() {
    let mut tools = ToolRegistry::new();
    tools
        .raw_tool("slow", None, json!({"type": "object"}), |_args: Value| async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(json!({"done": true}))
        })
        .unwrap();
    let h = Harness::new(AgentConfig::default().with_tools(tools));
    h.connect_ready().await;

    h.inbound(&tool_call("call_3", "slow", "{}"));
    h.inbound(&tool_call("call_3", "slow", "{}"));
    advance(Duration::from_millis(150)).await;
    h.idle().await;

    assert_eq!(outputs(&h).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tool_results_from_a_dead_connection_are_dropped() {
    let mut tools = ToolRegistry::new();
    tools
        .raw_tool("slow", None, json!({"type": "object"}), |_args: Value| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!({"done": true}))
        })
        .unwrap();
    let h = Harness::new(AgentConfig::default().with_tools(tools));
    h.connect_ready().await;

    h.inbound(&tool_call("call_4", "slow", "{}"));
    h.idle().await;
    h.emit(TransportEvent::IceStateChanged(IceConnectionState::Disconnected));
    h.idle().await;
    assert_eq!(h.session.state(), ConnectionState::Reconnecting);
    h.wait_for(ConnectionState::ConnectedReady).await;

    advance(Duration::from_secs(2)).await;
    h.idle().await;
    assert!(outputs(&h).is_empty());
    assert_eq!(count(&h, "response.create"), 2);
}

#[tokio::test(start_paused = true)]
async fn send_message_interrupts_and_requests_a_response() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    h.clear_frames();

    h.session.send_message("Hi there").await.unwrap();

    assert_eq!(
        h.frame_types(),
        vec!["output_audio_buffer.clear", "conversation.item.create", "response.create"]
    );
    let item = &h.frames()[1]["item"];
    assert_eq!(item["type"], "message");
    assert_eq!(item["role"], "user");
    assert_eq!(item["content"][0]["type"], "input_text");
    assert_eq!(item["content"][0]["text"], "Hi there");
}

#[tokio::test(start_paused = true)]
async fn send_message_without_a_channel_is_dropped() {
    let h = Harness::new(AgentConfig::default());
    h.session.send_message("anyone?").await.unwrap();
    assert!(h.frames().is_empty());

    h.transport.state.lock().unwrap().manual_open = true;
    h.session.connect().await.unwrap();
    h.wait_for(ConnectionState::ConnectedPending).await;
    h.session.send_message("still there?").await.unwrap();
    assert!(h.frames().is_empty());
    assert_eq!(h.session.state(), ConnectionState::ConnectedPending);
}

#[tokio::test(start_paused = true)]
async fn channel_open_after_negotiation_completes_readiness() {
    let h = Harness::new(AgentConfig::default());
    h.transport.state.lock().unwrap().manual_open = true;

    h.session.connect().await.unwrap();
    h.wait_for(ConnectionState::ConnectedPending).await;

    h.transport.state.lock().unwrap().channels[0].store(true, Ordering::SeqCst);
    h.emit(TransportEvent::Open);
    h.wait_for(ConnectionState::ConnectedReady).await;
    h.idle().await;
    assert_eq!(h.frame_types(), vec!["session.update", "response.create"]);
}

#[tokio::test(start_paused = true)]
async fn audio_tracks_follow_the_connection() {
    let h = Harness::new(AgentConfig::default());
    let mic = MediaTrack::new("mic", Arc::new(()));
    h.session.set_audio_input(Some(mic.clone())).await.unwrap();

    h.connect_ready().await;
    assert_eq!(h.transport.state.lock().unwrap().tracks, vec![Some(mic.clone())]);

    h.session.set_audio_input(None).await.unwrap();
    assert_eq!(h.transport.state.lock().unwrap().tracks, vec![Some(mic), None]);

    let speaker = MediaTrack::new("speaker", Arc::new(42_u32));
    h.emit(TransportEvent::RemoteTrack(speaker.clone()));
    h.idle().await;
    let output = h.session.audio_output().expect("remote track published");
    assert_eq!(output, speaker);
    assert_eq!(output.downcast_ref::<u32>(), Some(&42));

    h.session.disconnect().await.unwrap();
    assert!(h.session.audio_output().is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_disconnects() {
    let h = Harness::new(AgentConfig::default());
    h.connect_ready().await;
    let transport = h.transport.clone();
    drop(h);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(transport.state.lock().unwrap().live, 0);
}

#[tokio::test]
async fn build_requires_signaling() {
    let (_tx, rx) = tokio::sync::watch::channel(AgentConfig::default());
    let err = SessionOrchestrator::builder(rx).build().unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn build_requires_a_runtime() {
    let (_tx, rx) = tokio::sync::watch::channel(AgentConfig::default());
    let err = SessionOrchestrator::builder(rx)
        .signaling(common::MockSignaling::default())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}
