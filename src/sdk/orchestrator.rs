use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::protocol::models::Role;
use crate::transport::{
    MediaTrack, Signaling, Transport, TransportEvent, TransportEvents, TransportFactory,
};
use crate::{Error, Result};

use super::builder::SessionBuilder;
use super::codec::{InboundEvent, Intent, ProtocolCodec};
use super::config::AgentConfig;
use super::config_sync::{ConfigSynchronizer, Synchronization};
use super::dispatcher::{DispatchEvent, ToolDispatcher};
use super::events::{MessageEvent, ProtocolError, UsageRecord};
use super::handlers::EventHandlers;
use super::reconnect::ReconnectPolicy;
use super::tools::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Transport negotiated; configuration not yet pushed.
    ConnectedPending,
    /// Configuration pushed; the agent can converse.
    ConnectedReady,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful negotiation.
    pub reconnect_attempts: u32,
}

enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    SendMessage(String, oneshot::Sender<()>),
    StartMessage(oneshot::Sender<()>),
    ResumeConversation(Option<String>, oneshot::Sender<()>),
    SetAudioInput(Option<MediaTrack>, oneshot::Sender<()>),
}

enum Internal {
    Established { generation: u64, result: Result<()> },
    ReconnectDue { epoch: u64 },
}

/// Work parked until the session next becomes ready. Only the latest survives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Deferred {
    Respond,
    Resume(Option<String>),
}

#[derive(Debug)]
struct PendingToolCall {
    name: String,
    generation: u64,
}

enum Wake {
    Command(Command),
    Transport(u64, TransportEvent),
    Internal(Internal),
    Dispatch(DispatchEvent),
    ConfigChanged,
}

pub(crate) struct SessionParts {
    pub config: watch::Receiver<AgentConfig>,
    pub factory: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn Signaling>,
    pub handlers: EventHandlers,
    pub speak_on_ready: bool,
    pub policy: ReconnectPolicy,
    pub settle_delay: std::time::Duration,
}

/// Handle to a running voice session.
///
/// All state lives on one background task; every method here enqueues a
/// command and resolves once that task has processed it. Dropping the
/// handle disconnects the session.
pub struct SessionOrchestrator {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    audio_output: watch::Receiver<Option<MediaTrack>>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionOrchestrator {
    /// Start configuring a session that follows `config`.
    #[must_use]
    pub fn builder(config: watch::Receiver<AgentConfig>) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    pub(crate) fn spawn(parts: SessionParts, runtime: &tokio::runtime::Handle) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (audio_tx, audio_rx) = watch::channel(None);

        let actor = Actor {
            factory: parts.factory,
            signaling: parts.signaling,
            handlers: parts.handlers,
            policy: parts.policy,
            codec: ProtocolCodec,
            sync: ConfigSynchronizer::new(parts.config, parts.speak_on_ready),
            dispatcher: ToolDispatcher::new(parts.settle_delay, dispatch_tx),
            status: status_tx,
            audio_output: audio_tx,
            transport_tx,
            internal_tx,
            generation: 0,
            reconnect_epoch: 0,
            disconnected: false,
            attempts: 0,
            transport: None,
            negotiation: None,
            reconnect_timer: None,
            channel_open: false,
            pending_calls: HashMap::new(),
            deferred: None,
            started_at: None,
            input_track: None,
        };
        runtime.spawn(actor.run(cmd_rx, transport_rx, internal_rx, dispatch_rx));

        Self {
            commands: cmd_tx,
            status: status_rx,
            audio_output: audio_rx,
        }
    }

    /// Open a connection. A no-op while a connection attempt is in flight.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn connect(&self) -> Result<()> {
        self.request(Command::Connect).await
    }

    /// Tear everything down and stop reconnecting. Safe in any state.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Interrupt playback, add a user message and ask for a response.
    /// Frames are dropped if the control channel is not open.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|ack| Command::SendMessage(text, ack)).await
    }

    /// Ask the agent to speak first. Only meaningful when the session was
    /// built with `speak_on_ready(false)`; deferred until ready.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn start_message(&self) -> Result<()> {
        self.request(Command::StartMessage).await
    }

    /// Continue the conversation, optionally adding a system message first.
    /// Deferred until the session is ready.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn resume_conversation(&self, system_text: Option<String>) -> Result<()> {
        self.request(|ack| Command::ResumeConversation(system_text, ack)).await
    }

    /// Replace the outbound audio track; `None` sends silence.
    ///
    /// # Errors
    /// Returns [`Error::ConnectionClosed`] if the session task has stopped.
    pub async fn set_audio_input(&self, track: Option<MediaTrack>) -> Result<()> {
        self.request(|ack| Command::SetAudioInput(track, ack)).await
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// The remote audio track of the live connection, if any.
    #[must_use]
    pub fn audio_output(&self) -> Option<MediaTrack> {
        self.audio_output.borrow().clone()
    }

    #[must_use]
    pub fn watch_audio_output(&self) -> watch::Receiver<Option<MediaTrack>> {
        self.audio_output.clone()
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<()>) -> Command) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        rx.await.map_err(|_| Error::ConnectionClosed)
    }
}

struct Actor {
    factory: Arc<dyn TransportFactory>,
    signaling: Arc<dyn Signaling>,
    handlers: EventHandlers,
    policy: ReconnectPolicy,
    codec: ProtocolCodec,
    sync: ConfigSynchronizer,
    dispatcher: ToolDispatcher,
    status: watch::Sender<SessionStatus>,
    audio_output: watch::Sender<Option<MediaTrack>>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    /// Identifies the live transport; bumped on every teardown.
    generation: u64,
    /// Identifies the live reconnect timer.
    reconnect_epoch: u64,
    /// Set by a caller disconnect, cleared by a caller connect.
    disconnected: bool,
    attempts: u32,
    transport: Option<Box<dyn Transport>>,
    negotiation: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    channel_open: bool,
    pending_calls: HashMap<String, PendingToolCall>,
    deferred: Option<Deferred>,
    started_at: Option<DateTime<Utc>>,
    input_track: Option<MediaTrack>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut transport_rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
        mut internal_rx: mpsc::UnboundedReceiver<Internal>,
        mut dispatch_rx: mpsc::UnboundedReceiver<DispatchEvent>,
    ) {
        loop {
            let wake = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => break,
                },
                Some((generation, event)) = transport_rx.recv() => Wake::Transport(generation, event),
                Some(internal) = internal_rx.recv() => Wake::Internal(internal),
                Some(report) = dispatch_rx.recv() => Wake::Dispatch(report),
                () = self.sync.changed() => Wake::ConfigChanged,
            };

            match wake {
                Wake::Command(cmd) => self.on_command(cmd),
                Wake::Transport(generation, event) => self.on_transport_event(generation, event),
                Wake::Internal(internal) => self.on_internal(internal),
                Wake::Dispatch(report) => self.on_dispatch(report),
                Wake::ConfigChanged => self.synchronize(),
            }
        }

        tracing::debug!("session handle dropped; shutting down");
        self.disconnect();
    }

    fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    fn set_state(&self, state: ConnectionState) {
        let attempts = self.attempts;
        self.status.send_if_modified(|status| {
            let changed = status.state != state || status.reconnect_attempts != attempts;
            status.state = state;
            status.reconnect_attempts = attempts;
            changed
        });
    }

    fn on_command(&mut self, cmd: Command) {
        let ack = match cmd {
            Command::Connect(ack) => {
                self.connect(false);
                ack
            }
            Command::Disconnect(ack) => {
                self.disconnect();
                ack
            }
            Command::SendMessage(text, ack) => {
                self.send(&Intent::ClearOutputAudio);
                self.send(&Intent::UserMessage(text));
                self.send(&Intent::ResponseCreate);
                ack
            }
            Command::StartMessage(ack) => {
                if self.sync.speak_on_ready() {
                    tracing::debug!("start_message ignored; the agent already speaks on ready");
                } else {
                    self.when_ready(Deferred::Respond);
                }
                ack
            }
            Command::ResumeConversation(text, ack) => {
                self.when_ready(Deferred::Resume(text));
                ack
            }
            Command::SetAudioInput(track, ack) => {
                if let Some(transport) = self.transport.as_mut() {
                    transport.replace_input_track(track.clone());
                }
                self.input_track = track;
                ack
            }
        };
        let _ = ack.send(());
    }

    fn connect(&mut self, internal: bool) {
        if !internal {
            self.disconnected = false;
        }
        if self.disconnected {
            tracing::debug!("connect skipped; session was disconnected by the caller");
            return;
        }
        if self.state() == ConnectionState::Connecting {
            tracing::debug!("connect skipped; already connecting");
            return;
        }

        self.teardown();
        self.cancel_reconnect();
        self.started_at = None;
        self.set_state(ConnectionState::Connecting);
        tracing::info!(generation = self.generation, attempt = self.attempts, "connecting");

        let session = match self.sync.current() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(%err, "invalid session configuration");
                self.schedule_reconnect();
                return;
            }
        };

        let events = TransportEvents::new(self.generation, self.transport_tx.clone());
        let mut transport = match self.factory.open(events) {
            Ok(transport) => transport,
            Err(err) => {
                tracing::warn!(%err, "failed to open transport");
                self.schedule_reconnect();
                return;
            }
        };

        transport.replace_input_track(self.input_track.clone());
        let establish = transport.establish(Arc::clone(&self.signaling), session);
        self.transport = Some(transport);

        let generation = self.generation;
        let internal = self.internal_tx.clone();
        self.negotiation = Some(tokio::spawn(async move {
            let result = establish.await;
            let _ = internal.send(Internal::Established { generation, result });
        }));
    }

    fn disconnect(&mut self) {
        self.disconnected = true;
        self.cancel_reconnect();
        self.teardown();
        self.deferred = None;
        self.attempts = 0;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("disconnected");
    }

    /// Drop the live transport and everything tied to its generation.
    fn teardown(&mut self) {
        if let Some(negotiation) = self.negotiation.take() {
            negotiation.abort();
        }
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.sync.deactivate();
        self.channel_open = false;
        if !self.pending_calls.is_empty() {
            tracing::debug!(count = self.pending_calls.len(), "abandoning in-flight tool calls");
            self.pending_calls.clear();
        }
        self.generation += 1;
        self.audio_output.send_if_modified(|track| track.take().is_some());
    }

    fn cancel_reconnect(&mut self) {
        self.reconnect_epoch += 1;
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.disconnected || self.state() == ConnectionState::Reconnecting {
            return;
        }

        self.teardown();
        self.deferred = None;
        let delay = self.policy.next_delay(self.attempts);
        self.attempts = self.attempts.saturating_add(1);
        self.cancel_reconnect();
        self.set_state(ConnectionState::Reconnecting);
        tracing::warn!(attempt = self.attempts, ?delay, "connection lost; reconnecting");

        let epoch = self.reconnect_epoch;
        let internal = self.internal_tx.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(Internal::ReconnectDue { epoch });
        }));
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Established { generation, result } => {
                if generation != self.generation {
                    return;
                }
                self.negotiation = None;
                match result {
                    Ok(()) => {
                        self.attempts = 0;
                        self.set_state(ConnectionState::ConnectedPending);
                        tracing::info!(generation, "transport negotiated");
                        if self.channel_open {
                            self.begin_sync();
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%err, "connection attempt failed");
                        self.schedule_reconnect();
                    }
                }
            }
            Internal::ReconnectDue { epoch } => {
                if epoch != self.reconnect_epoch || self.state() != ConnectionState::Reconnecting {
                    return;
                }
                self.reconnect_timer = None;
                self.connect(true);
            }
        }
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            tracing::trace!(generation, current = self.generation, "ignoring event from stale transport");
            return;
        }
        match event {
            TransportEvent::Open => {
                tracing::info!("control channel open");
                self.channel_open = true;
                if self.state() == ConnectionState::ConnectedPending {
                    self.begin_sync();
                }
            }
            TransportEvent::Message(frame) => self.on_frame(&frame),
            TransportEvent::Closed => {
                tracing::warn!("control channel closed");
                self.schedule_reconnect();
            }
            TransportEvent::IceStateChanged(ice) => {
                tracing::debug!(?ice, "ice state changed");
                if ice.is_terminal() {
                    self.schedule_reconnect();
                }
            }
            TransportEvent::RemoteTrack(track) => {
                self.audio_output.send_replace(Some(track));
            }
        }
    }

    fn begin_sync(&mut self) {
        if self.sync.is_active() {
            return;
        }
        self.sync.activate();
        self.synchronize();
    }

    fn synchronize(&mut self) {
        if !self.sync.is_active() {
            return;
        }
        match self.sync.sync() {
            Ok(Synchronization { intents, first }) => {
                for intent in &intents {
                    self.send(intent);
                }
                if first && self.state() == ConnectionState::ConnectedPending {
                    self.set_state(ConnectionState::ConnectedReady);
                    tracing::info!("session ready");
                    if let Some(deferred) = self.deferred.take() {
                        self.run_deferred(deferred);
                    }
                }
            }
            Err(err) => tracing::warn!(%err, "skipping session.update"),
        }
    }

    fn when_ready(&mut self, deferred: Deferred) {
        if self.state() == ConnectionState::ConnectedReady {
            self.run_deferred(deferred);
        } else {
            self.deferred = Some(deferred);
        }
    }

    fn run_deferred(&mut self, deferred: Deferred) {
        if let Deferred::Resume(Some(text)) = deferred {
            self.send(&Intent::SystemMessage(text));
        }
        self.send(&Intent::ResponseCreate);
    }

    fn on_frame(&mut self, frame: &str) {
        let event = match self.codec.decode(frame) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(%err, "dropping inbound frame");
                self.handlers.error(ProtocolError::Decode(err.to_string()));
                return;
            }
        };

        match event {
            InboundEvent::SessionStarted => self.started_at = Some(Utc::now()),
            InboundEvent::Typing => self.handlers.message(MessageEvent::Typing),
            InboundEvent::ResponseDone { conversation_id, usage } => {
                self.handlers.usage(UsageRecord {
                    conversation_id,
                    started_at: self.started_at,
                    usage,
                });
            }
            InboundEvent::TextDelta { response_id, delta } => {
                self.handlers.message(MessageEvent::MessagePart {
                    id: response_id,
                    role: Role::Assistant,
                    text_delta: delta,
                });
            }
            InboundEvent::MessageDone { response_id, text } => {
                self.handlers.message(MessageEvent::Message {
                    id: response_id,
                    role: Role::Assistant,
                    text,
                });
            }
            InboundEvent::UserTranscript { id, text } => {
                self.handlers.message(MessageEvent::Message { id, role: Role::User, text });
            }
            InboundEvent::ToolCallRequested(call) => self.dispatch(call),
            InboundEvent::RemoteError(error) => {
                tracing::warn!(code = ?error.code, message = %error.message, "session error");
                self.handlers.error(ProtocolError::Remote(error));
            }
            InboundEvent::Ignored { kind } => tracing::trace!(%kind, "unhandled event"),
        }
    }

    fn dispatch(&mut self, call: ToolCall) {
        if let Some(pending) = self.pending_calls.get(&call.call_id) {
            tracing::warn!(call_id = %call.call_id, tool = %pending.name, "duplicate tool call ignored");
            return;
        }
        tracing::debug!(call_id = %call.call_id, tool = %call.name, "dispatching tool call");
        self.pending_calls.insert(
            call.call_id.clone(),
            PendingToolCall { name: call.name.clone(), generation: self.generation },
        );
        let tools = self.sync.tools();
        self.dispatcher.handle(self.generation, call, &tools);
    }

    fn on_dispatch(&mut self, report: DispatchEvent) {
        match report {
            DispatchEvent::Output { generation, call_id, output } => {
                let pending = self.pending_calls.remove(&call_id);
                if generation != self.generation || pending.is_none_or(|p| p.generation != generation) {
                    tracing::debug!(%call_id, "discarding tool result for a closed connection");
                    return;
                }
                self.send(&Intent::FunctionOutput { call_id, output });
            }
            DispatchEvent::SettleElapsed { generation, .. } => {
                if generation == self.generation {
                    self.send(&Intent::ResponseCreate);
                }
            }
        }
    }

    /// Best-effort write to the live transport.
    fn send(&mut self, intent: &Intent) {
        let Some(transport) = self.transport.as_mut() else {
            tracing::debug!(?intent, "no transport; dropping frame");
            return;
        };
        let frame = match self.codec.encode(intent) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(%err, "failed to encode frame");
                return;
            }
        };
        match transport.send(&frame) {
            Ok(()) => {}
            Err(Error::ChannelNotOpen) => tracing::debug!("control channel not open; frame dropped"),
            Err(err) => tracing::warn!(%err, "failed to send frame"),
        }
    }
}
