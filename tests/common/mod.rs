#![allow(dead_code)]

use async_trait::async_trait;
use oai_rt_voice::protocol::models::SessionConfig;
use oai_rt_voice::sdk::{
    AgentConfig, ConnectionState, EventHandlers, MessageEvent, ProtocolError, SessionBuilder,
    SessionOrchestrator, UsageRecord,
};
use oai_rt_voice::transport::{
    BoxFuture, MediaTrack, Signaling, Transport, TransportEvent, TransportEvents, TransportFactory,
    negotiate_offer,
};
use oai_rt_voice::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Default)]
pub struct MockState {
    pub events: Vec<TransportEvents>,
    pub channels: Vec<Arc<AtomicBool>>,
    pub frames: Vec<(u64, String)>,
    pub tracks: Vec<Option<MediaTrack>>,
    pub opened: usize,
    pub live: usize,
    pub max_live: usize,
    pub fail_establish: bool,
    pub manual_open: bool,
}

#[derive(Clone, Default)]
pub struct MockFactory {
    pub state: Arc<Mutex<MockState>>,
}

impl TransportFactory for MockFactory {
    fn open(&self, events: TransportEvents) -> Result<Box<dyn Transport>> {
        let channel = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock().unwrap();
        state.opened += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.events.push(events.clone());
        state.channels.push(Arc::clone(&channel));
        Ok(Box::new(MockTransport {
            state: Arc::clone(&self.state),
            events,
            channel,
            closed: false,
        }))
    }
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    events: TransportEvents,
    channel: Arc<AtomicBool>,
    closed: bool,
}

impl Transport for MockTransport {
    fn establish(
        &mut self,
        signaling: Arc<dyn Signaling>,
        session: SessionConfig,
    ) -> BoxFuture<'static, Result<()>> {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let channel = Arc::clone(&self.channel);
        Box::pin(async move {
            negotiate_offer(signaling.as_ref(), &session, "v=0 offer".to_string()).await?;
            let (fail, manual_open) = {
                let state = state.lock().unwrap();
                (state.fail_establish, state.manual_open)
            };
            if fail {
                return Err(Error::Signaling("offer rejected".to_string()));
            }
            if !manual_open {
                channel.store(true, Ordering::SeqCst);
                events.emit(TransportEvent::Open);
            }
            Ok(())
        })
    }

    fn send(&mut self, frame: &str) -> Result<()> {
        if !self.channel.load(Ordering::SeqCst) {
            return Err(Error::ChannelNotOpen);
        }
        self.state
            .lock()
            .unwrap()
            .frames
            .push((self.events.generation(), frame.to_string()));
        Ok(())
    }

    fn replace_input_track(&mut self, track: Option<MediaTrack>) {
        self.state.lock().unwrap().tracks.push(track);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.channel.store(false, Ordering::SeqCst);
        self.state.lock().unwrap().live -= 1;
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Clone, Default)]
pub struct MockSignaling {
    pub credentials: Arc<AtomicUsize>,
    pub offers: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
    pub delay_ms: Arc<AtomicU64>,
}

#[async_trait]
impl Signaling for MockSignaling {
    async fn credential(&self, _session: &SessionConfig) -> Result<String> {
        self.credentials.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Signaling("token endpoint unavailable".to_string()));
        }
        Ok("ek_test".to_string())
    }

    async fn exchange_offer(&self, _offer_sdp: String, credential: &str, _model: &str) -> Result<String> {
        assert_eq!(credential, "ek_test");
        self.offers.fetch_add(1, Ordering::SeqCst);
        Ok("v=0 answer".to_string())
    }
}

pub struct Harness {
    pub session: SessionOrchestrator,
    pub config: watch::Sender<AgentConfig>,
    pub transport: MockFactory,
    pub signaling: MockSignaling,
    pub messages: Arc<Mutex<Vec<MessageEvent>>>,
    pub usage: Arc<Mutex<Vec<UsageRecord>>>,
    pub errors: Arc<Mutex<Vec<ProtocolError>>>,
}

impl Harness {
    pub fn new(config: AgentConfig) -> Self {
        Self::with(config, |builder| builder)
    }

    pub fn with(config: AgentConfig, customize: impl FnOnce(SessionBuilder) -> SessionBuilder) -> Self {
        let (config_tx, config_rx) = watch::channel(config);
        let transport = MockFactory::default();
        let signaling = MockSignaling::default();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let usage = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let handlers = {
            let (messages, usage, errors) = (messages.clone(), usage.clone(), errors.clone());
            EventHandlers::new()
                .on_message(move |event| messages.lock().unwrap().push(event))
                .on_usage(move |record| usage.lock().unwrap().push(record))
                .on_error(move |error| errors.lock().unwrap().push(error))
        };

        let builder = SessionOrchestrator::builder(config_rx)
            .transport(transport.clone())
            .signaling(signaling.clone())
            .handlers(handlers);
        let session = customize(builder).build().expect("session builds");

        Self {
            session,
            config: config_tx,
            transport,
            signaling,
            messages,
            usage,
            errors,
        }
    }

    /// Let every ready task run; advances paused time by one millisecond.
    pub async fn idle(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    pub async fn wait_for(&self, state: ConnectionState) {
        let mut status = self.session.watch_status();
        tokio::time::timeout(Duration::from_secs(60), status.wait_for(|s| s.state == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {state:?}"))
            .expect("session task alive");
    }

    pub async fn connect_ready(&self) {
        self.session.connect().await.unwrap();
        self.wait_for(ConnectionState::ConnectedReady).await;
        self.idle().await;
    }

    pub fn emit(&self, event: TransportEvent) {
        let state = self.transport.state.lock().unwrap();
        let events = state.events.last().expect("a transport was opened");
        events.emit(event);
    }

    pub fn inbound(&self, frame: &Value) {
        self.emit(TransportEvent::Message(frame.to_string()));
    }

    pub fn frames(&self) -> Vec<Value> {
        self.transport
            .state
            .lock()
            .unwrap()
            .frames
            .iter()
            .map(|(_, frame)| serde_json::from_str(frame).unwrap())
            .collect()
    }

    pub fn frame_types(&self) -> Vec<String> {
        self.frames()
            .iter()
            .map(|frame| frame["type"].as_str().unwrap().to_string())
            .collect()
    }

    pub fn clear_frames(&self) {
        self.transport.state.lock().unwrap().frames.clear();
    }

    pub fn messages(&self) -> Vec<MessageEvent> {
        self.messages.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.transport.state.lock().unwrap().opened
    }

    pub fn live(&self) -> usize {
        self.transport.state.lock().unwrap().live
    }

    pub fn max_live(&self) -> usize {
        self.transport.state.lock().unwrap().max_live
    }

    pub fn credentials(&self) -> usize {
        self.signaling.credentials.load(Ordering::SeqCst)
    }
}
