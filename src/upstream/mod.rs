//! Connection wiring for the upstream Realtime-protocol WebSocket.

pub mod event;

pub use event::{
    ConversationItem, ContentPart, ItemRole, SessionInfo, SessionResource, ToolSpec,
    UpstreamClientEvent, UpstreamErrorDetail, UpstreamServerEvent,
};

use crate::error::ProxyError;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message as WsMessage, client::IntoClientRequest},
};
use tracing::{error, info};

pub type UpstreamWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
pub type UpstreamReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Bound on queued-but-unsent messages per socket direction, the point
/// past which a slow peer is treated as a backpressure breach rather
/// than an unbounded memory sink. Matches the teacher's
/// `mpsc::channel(128)` for provider events.
const WRITE_QUEUE_CAPACITY: usize = 128;

/// Owns the upstream socket's write half behind a bounded queue. A
/// background task drains the queue into the real sink in order,
/// preserving single-writer-per-socket discipline; `try_send` never
/// blocks the caller and reports a full queue as
/// [`ProxyError::Backpressure`] instead of buffering without limit.
pub struct UpstreamWriterHandle {
    tx: mpsc::Sender<WsMessage>,
}

impl UpstreamWriterHandle {
    pub fn spawn(mut sink: UpstreamWriter) -> Self {
        let (tx, mut rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    error!(error = %e, "Upstream writer task stopped after a send failure.");
                    break;
                }
            }
        });
        Self { tx }
    }

    pub fn try_send(&self, msg: WsMessage) -> Result<(), ProxyError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProxyError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => {
                ProxyError::UpstreamSocket(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            }
        })
    }
}

/// Dials the upstream provider, injecting the credential as a bearer
/// header on the upgrade request. The credential never
/// leaves this function as anything but an HTTP header value.
pub async fn connect(url: &str, api_key: &str) -> Result<(UpstreamWriter, UpstreamReader), ProxyError> {
    let mut request = url
        .into_client_request()
        .map_err(|e| ProxyError::UpstreamHandshake(e.to_string()))?;
    request.headers_mut().insert(
        "Authorization",
        format!("Bearer {api_key}")
            .parse()
            .map_err(|_| ProxyError::UpstreamHandshake("invalid credential header".into()))?,
    );

    let (stream, _response) = connect_async(request).await?;
    info!("Connected to upstream realtime provider.");
    Ok(stream.split())
}

/// Serializes and queues one client event for upstream delivery.
pub fn send_event(writer: &UpstreamWriterHandle, event: &UpstreamClientEvent) -> Result<(), ProxyError> {
    let text = serde_json::to_string(event)?;
    writer.try_send(WsMessage::Text(text.into()))
}

/// Serializes and sends one client event directly on the raw sink,
/// before the steady-state [`UpstreamWriterHandle`] takes over. Used
/// only during the handshake, where sends happen one at a time with
/// no concurrent direction to race against.
pub async fn send_event_direct(
    writer: &mut UpstreamWriter,
    event: &UpstreamClientEvent,
) -> Result<(), ProxyError> {
    let text = serde_json::to_string(event)?;
    writer.send(WsMessage::Text(text.into())).await?;
    Ok(())
}
