//! Transport and signaling seams.
//!
//! A [`Transport`] is one duplex connection attempt: it establishes itself
//! (offer, credential, answer), then carries JSON control frames and audio.
//! Events flow back through [`TransportEvents`], tagged with the generation
//! the session assigned when it opened the transport, so the session can
//! ignore anything a torn-down transport still emits.

pub mod rest;
pub mod ws;

use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::Result;
use crate::protocol::models::SessionConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Peer connectivity as reported by the media layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl IceConnectionState {
    /// States after which the connection will not recover on its own.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected | Self::Closed)
    }
}

/// Opaque handle to an audio track owned by the media layer.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    inner: Arc<dyn Any + Send + Sync>,
}

impl MediaTrack {
    #[must_use]
    pub fn new(id: impl Into<String>, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self { id: id.into(), inner }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Recover the media layer's concrete track type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaTrack").field("id", &self.id).finish_non_exhaustive()
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The control channel is open and accepts frames.
    Open,
    /// One inbound JSON text frame.
    Message(String),
    /// The control channel closed.
    Closed,
    IceStateChanged(IceConnectionState),
    /// The remote side started sending audio.
    RemoteTrack(MediaTrack),
}

/// Event sink handed to a transport when it is opened.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl TransportEvents {
    #[must_use]
    pub const fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event to the session. Returns false once the session is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// One connection attempt to the realtime endpoint.
pub trait Transport: Send {
    /// Negotiate the connection. The returned future must not borrow the
    /// transport: the session keeps handling other work while it runs.
    fn establish(
        &mut self,
        signaling: Arc<dyn Signaling>,
        session: SessionConfig,
    ) -> BoxFuture<'static, Result<()>>;

    /// Send one control frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ChannelNotOpen`] if the control channel is not open.
    #[allow(clippy::result_large_err)]
    fn send(&mut self, frame: &str) -> Result<()>;

    /// Attach the outbound audio track; `None` sends silence.
    fn replace_input_track(&mut self, track: Option<MediaTrack>);

    /// Release everything. Must be idempotent.
    fn close(&mut self);
}

/// Creates a fresh [`Transport`] for each connection attempt.
pub trait TransportFactory: Send + Sync {
    /// # Errors
    /// Returns an error if the transport cannot be created.
    #[allow(clippy::result_large_err)]
    fn open(&self, events: TransportEvents) -> Result<Box<dyn Transport>>;
}

/// Credential and offer/answer exchange with the endpoint.
#[async_trait]
pub trait Signaling: Send + Sync {
    /// A bearer credential for one connection attempt.
    async fn credential(&self, session: &SessionConfig) -> Result<String>;

    /// Post the local SDP offer and return the remote answer.
    async fn exchange_offer(&self, offer_sdp: String, credential: &str, model: &str) -> Result<String>;
}

/// Credential lookup followed by the offer/answer exchange, as a peer
/// transport runs it from [`Transport::establish`].
///
/// # Errors
/// Returns an error if either signaling step fails.
pub async fn negotiate_offer(
    signaling: &dyn Signaling,
    session: &SessionConfig,
    offer_sdp: String,
) -> Result<String> {
    let credential = signaling.credential(session).await?;
    signaling.exchange_offer(offer_sdp, &credential, &session.model).await
}
