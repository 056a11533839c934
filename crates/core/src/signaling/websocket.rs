//! WebSocket signaling: one text or binary frame per message

use super::transport::SignalingTransport;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// `ws://host:port` connection to the signaling peer
pub struct WebSocketSignaling {
    url: String,
    stream: WsStream,
}

fn signaling_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("ws://[{}]:{}", host, port)
    } else {
        format!("ws://{}:{}", host, port)
    }
}

fn map_receive_error(e: tungstenite::Error, max_size: usize) -> Error {
    match e {
        tungstenite::Error::Capacity(CapacityError::MessageTooLong { size, .. }) => {
            Error::MessageTooLarge {
                size,
                max: max_size,
            }
        }
        other => map_ws_error(other),
    }
}

fn map_ws_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            Error::PeerClosed("websocket closed".to_string())
        }
        tungstenite::Error::Io(e) => Error::IoError(e),
        other => Error::ConnectionError(other.to_string()),
    }
}

/// Frame and message limits one byte above `max_message_size`
///
/// A frame that fits the limit is still checked against `max_size` on
/// receive; anything longer is rejected from its header before the
/// payload is read.
fn websocket_config(max_message_size: usize) -> WebSocketConfig {
    let limit = max_message_size.saturating_add(1);
    WebSocketConfig {
        max_message_size: Some(limit),
        max_frame_size: Some(limit),
        ..Default::default()
    }
}

impl WebSocketSignaling {
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        max_message_size: usize,
    ) -> Result<Self> {
        let url = signaling_url(host, port);
        info!(url = %url, max_message_size, "Connecting WebSocket signaling channel");

        let config = websocket_config(max_message_size);
        let connecting = connect_async_with_config(url.as_str(), Some(config), false);
        let (stream, _) = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| Error::ConnectionError(format!("connecting to {} timed out", url)))?
            .map_err(|e| Error::ConnectionError(format!("failed to connect to {}: {}", url, e)))?;

        debug!(url = %url, "WebSocket signaling connected");
        Ok(Self { url, stream })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn next_message(&mut self, max_size: usize) -> Result<Vec<u8>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    return Err(Error::PeerClosed(format!("close frame: {:?}", frame)));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(map_receive_error(e, max_size)),
                None => return Err(Error::PeerClosed("end of stream".to_string())),
            }
        }
    }
}

#[async_trait]
impl SignalingTransport for WebSocketSignaling {
    async fn send(&mut self, message: &[u8]) -> Result<()> {
        let frame = match std::str::from_utf8(message) {
            Ok(text) => Message::Text(text.to_string()),
            Err(_) => Message::Binary(message.to_vec()),
        };
        self.stream
            .send(frame)
            .await
            .map_err(|e| Error::SendError(format!("{}: {}", self.url, e)))
    }

    async fn receive(&mut self, max_size: usize, timeout: Duration) -> Result<Vec<u8>> {
        let message = tokio::time::timeout(timeout, self.next_message(max_size))
            .await
            .map_err(|_| {
                Error::OperationTimeout(format!("no signaling reply within {:?}", timeout))
            })??;

        if message.len() > max_size {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                max: max_size,
            });
        }
        Ok(message)
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {}
            Err(e) => return Err(map_ws_error(e)),
        }
        debug!(url = %self.url, "WebSocket signaling channel closed");
        Ok(())
    }
}
