use futures::{SinkExt, StreamExt};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{BoxFuture, MediaTrack, Signaling, Transport, TransportEvent, TransportEvents, TransportFactory};
use crate::error::{Error, Result};
use crate::protocol::models::SessionConfig;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WS_BASE_URL: &str = "wss://api.openai.com/v1/realtime";

/// Open a WebSocket to the realtime endpoint.
///
/// # Errors
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(base_url: &str, credential: &str, model: &str) -> Result<WsStream> {
    let mut url = Url::parse(base_url)?;
    url.query_pairs_mut().append_pair("model", model);

    let auth_header = HeaderValue::from_str(&format!("Bearer {credential}"))?;

    let mut req = tokio_tungstenite::tungstenite::client::IntoClientRequest::into_client_request(
        url.as_str(),
    )?;
    req.headers_mut().insert(reqwest::header::AUTHORIZATION, auth_header);
    let (ws_stream, _) = connect_async(req).await?;

    tracing::info!(%model, "Connected to OpenAI Realtime");
    Ok(ws_stream)
}

/// Creates [`WsTransport`]s against one base URL.
#[derive(Debug, Clone)]
pub struct WsTransportFactory {
    base_url: String,
}

impl WsTransportFactory {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

impl Default for WsTransportFactory {
    fn default() -> Self {
        Self::new(WS_BASE_URL)
    }
}

impl TransportFactory for WsTransportFactory {
    fn open(&self, events: TransportEvents) -> Result<Box<dyn Transport>> {
        Ok(Box::new(WsTransport::new(self.base_url.clone(), events)))
    }
}

/// Control-channel-only transport over a WebSocket. Audio tracks are not
/// carried; attaching one is accepted and ignored.
pub struct WsTransport {
    base_url: String,
    events: TransportEvents,
    open: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    shutdown: Option<oneshot::Sender<()>>,
    pending: Option<(mpsc::UnboundedReceiver<Message>, oneshot::Receiver<()>)>,
}

impl WsTransport {
    #[must_use]
    pub fn new(base_url: String, events: TransportEvents) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = oneshot::channel();
        Self {
            base_url,
            events,
            open: Arc::new(AtomicBool::new(false)),
            outbound,
            shutdown: Some(shutdown),
            pending: Some((outbound_rx, shutdown_rx)),
        }
    }
}

impl Transport for WsTransport {
    fn establish(
        &mut self,
        signaling: Arc<dyn Signaling>,
        session: SessionConfig,
    ) -> BoxFuture<'static, Result<()>> {
        let pending = self.pending.take();
        let base_url = self.base_url.clone();
        let events = self.events.clone();
        let open = Arc::clone(&self.open);

        Box::pin(async move {
            let Some((outbound_rx, shutdown_rx)) = pending else {
                return Err(Error::InvalidConfig("transport already established".to_string()));
            };
            let credential = signaling.credential(&session).await?;
            let stream = connect(&base_url, &credential, &session.model).await?;
            tokio::spawn(pump(stream, outbound_rx, shutdown_rx, open, events));
            Ok(())
        })
    }

    fn send(&mut self, frame: &str) -> Result<()> {
        if !self.open.load(Ordering::Acquire) {
            return Err(Error::ChannelNotOpen);
        }
        self.outbound
            .send(Message::Text(frame.to_owned().into()))
            .map_err(|_| Error::ChannelNotOpen)
    }

    fn replace_input_track(&mut self, track: Option<MediaTrack>) {
        if let Some(track) = track {
            tracing::debug!(track = %track.id(), "websocket transport carries no audio; track ignored");
        }
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.pending = None;
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    mut shutdown: oneshot::Receiver<()>,
    open: Arc<AtomicBool>,
    events: TransportEvents,
) {
    let (mut write, mut read) = stream.split();
    open.store(true, Ordering::Release);
    events.emit(TransportEvent::Open);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let _ = write.close().await;
                break;
            }
            Some(msg) = outbound.recv() => {
                if let Err(err) = write.send(msg).await {
                    tracing::warn!(%err, "websocket send failed");
                    events.emit(TransportEvent::Closed);
                    break;
                }
            }
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = write.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!("WebSocket connection closed by server");
                    events.emit(TransportEvent::Closed);
                    break;
                }
                Some(Err(err)) => {
                    tracing::warn!(%err, "websocket receive failed");
                    events.emit(TransportEvent::Closed);
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    open.store(false, Ordering::Release);
}
