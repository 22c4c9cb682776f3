use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::transport::ws::WsTransportFactory;
use crate::transport::{Signaling, TransportFactory};
use crate::{Error, Result};

use super::config::AgentConfig;
use super::dispatcher::DEFAULT_SETTLE_DELAY;
use super::handlers::EventHandlers;
use super::orchestrator::{SessionOrchestrator, SessionParts};
use super::reconnect::ReconnectPolicy;

pub struct SessionBuilder {
    config: watch::Receiver<AgentConfig>,
    transport: Option<Arc<dyn TransportFactory>>,
    signaling: Option<Arc<dyn Signaling>>,
    handlers: EventHandlers,
    speak_on_ready: bool,
    policy: ReconnectPolicy,
    settle_delay: Duration,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("has_transport", &self.transport.is_some())
            .field("has_signaling", &self.signaling.is_some())
            .field("handlers", &self.handlers)
            .field("speak_on_ready", &self.speak_on_ready)
            .field("policy", &self.policy)
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl SessionBuilder {
    #[must_use]
    pub fn new(config: watch::Receiver<AgentConfig>) -> Self {
        Self {
            config,
            transport: None,
            signaling: None,
            handlers: EventHandlers::new(),
            speak_on_ready: true,
            policy: ReconnectPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn signaling(mut self, signaling: impl Signaling + 'static) -> Self {
        self.signaling = Some(Arc::new(signaling));
        self
    }

    #[must_use]
    pub fn shared_signaling(mut self, signaling: Arc<dyn Signaling>) -> Self {
        self.signaling = Some(signaling);
        self
    }

    /// Defaults to [`WsTransportFactory`].
    #[must_use]
    pub fn transport(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.transport = Some(Arc::new(factory));
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Whether the agent greets first on every new connection. Defaults to true.
    #[must_use]
    pub const fn speak_on_ready(mut self, speak: bool) -> Self {
        self.speak_on_ready = speak;
        self
    }

    #[must_use]
    pub const fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pause between a tool result and the follow-up `response.create`.
    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Spawn the session task. The session starts disconnected.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if no signaling was configured or
    /// when called outside a Tokio runtime.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<SessionOrchestrator> {
        let signaling = self
            .signaling
            .ok_or_else(|| Error::InvalidConfig("signaling required".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::InvalidConfig("must be built inside a Tokio runtime".to_string()))?;
        let factory = self
            .transport
            .unwrap_or_else(|| Arc::new(WsTransportFactory::default()));

        Ok(SessionOrchestrator::spawn(
            SessionParts {
                config: self.config,
                factory,
                signaling,
                handlers: self.handlers,
                speak_on_ready: self.speak_on_ready,
                policy: self.policy,
                settle_delay: self.settle_delay,
            },
            &runtime,
        ))
    }
}
