use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Point-to-point message channel to the signaling peer
///
/// Each call to `send` or `receive` moves exactly one whole message.
#[async_trait]
pub trait SignalingTransport: Send {
    /// Write one message
    ///
    /// Fails with [`crate::Error::SendError`] on transport failure.
    async fn send(&mut self, message: &[u8]) -> Result<()>;

    /// Wait for one message of at most `max_size` bytes
    ///
    /// Fails with [`crate::Error::OperationTimeout`] when nothing arrives in
    /// time, [`crate::Error::MessageTooLarge`] when the message exceeds
    /// `max_size` (it is never truncated), or [`crate::Error::PeerClosed`].
    async fn receive(&mut self, max_size: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Release the channel
    async fn close(&mut self) -> Result<()>;
}
