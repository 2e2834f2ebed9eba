//! The client socket's write half, owned behind a bounded queue so a
//! slow or stalled client can't grow the process's memory without
//! bound. Mirrors [`crate::upstream::UpstreamWriterHandle`].

use super::ClientWriter;
use crate::error::ProxyError;
use crate::protocol::ServerMessage;
use axum::extract::ws::Message;
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tracing::error;

const WRITE_QUEUE_CAPACITY: usize = 128;

pub(crate) struct ClientWriterHandle {
    tx: mpsc::Sender<Message>,
}

impl ClientWriterHandle {
    pub fn spawn(mut sink: ClientWriter) -> Self {
        let (tx, mut rx) = mpsc::channel(WRITE_QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    error!(error = %e, "Client writer task stopped after a send failure.");
                    break;
                }
            }
        });
        Self { tx }
    }

    pub fn try_send(&self, msg: Message) -> Result<(), ProxyError> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProxyError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => ProxyError::ClientSocket(axum::Error::new(
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "client writer task stopped"),
            )),
        })
    }

    /// Serializes and queues one `ServerMessage` as a text frame.
    pub fn send(&self, msg: ServerMessage) -> Result<(), ProxyError> {
        let text = serde_json::to_string(&msg)?;
        self.try_send(Message::Text(text.into()))
    }
}
