//! Signaling channel used for the one-shot offer/answer exchange

mod datagram;
mod message;
mod transport;
mod websocket;

pub use datagram::{DatagramSignaling, MAX_DATAGRAM_PAYLOAD};
pub use message::{SignalingMessage, ANSWER_TYPE, OFFER_TYPE};
pub use transport::SignalingTransport;
pub use websocket::WebSocketSignaling;

use crate::config::{SignalingConfig, SignalingMode};
use crate::Result;

/// Open the transport selected by `config.mode`
pub async fn connect(config: &SignalingConfig) -> Result<Box<dyn SignalingTransport>> {
    let timeout = config.connect_timeout();
    match config.mode {
        SignalingMode::Datagram => Ok(Box::new(
            DatagramSignaling::connect(&config.host, config.port, timeout).await?,
        )),
        SignalingMode::WebSocket => Ok(Box::new(
            WebSocketSignaling::connect(
                &config.host,
                config.port,
                timeout,
                config.max_message_size,
            )
            .await?,
        )),
    }
}
