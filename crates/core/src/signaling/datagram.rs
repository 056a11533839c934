//! UDP signaling: one datagram per message

use super::transport::SignalingTransport;
use crate::{Error, Result};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info};

/// Largest payload of one IPv4 UDP datagram
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Connected UDP socket to the signaling peer
pub struct DatagramSignaling {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl DatagramSignaling {
    /// Resolve `host:port` and connect a local ephemeral socket to it
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        info!(host, port, "Connecting UDP signaling channel");

        let connect = async {
            let peer = tokio::net::lookup_host((host, port))
                .await?
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;

            let local: SocketAddr = if peer.is_ipv4() {
                (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
            } else {
                (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).await?;
            socket.connect(peer).await?;
            Ok::<_, io::Error>((socket, peer))
        };

        let (socket, peer) = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| {
                Error::ConnectionError(format!("connecting to {}:{} timed out", host, port))
            })?
            .map_err(|e| Error::ConnectionError(format!("{}:{}: {}", host, port, e)))?;

        debug!(peer = %peer, local = ?socket.local_addr().ok(), "UDP signaling connected");
        Ok(Self { socket, peer })
    }

    /// Resolved peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[async_trait]
impl SignalingTransport for DatagramSignaling {
    async fn send(&mut self, message: &[u8]) -> Result<()> {
        let written = self
            .socket
            .send(message)
            .await
            .map_err(|e| Error::SendError(format!("{}: {}", self.peer, e)))?;

        if written != message.len() {
            return Err(Error::SendError(format!(
                "short write: {} of {} bytes",
                written,
                message.len()
            )));
        }
        Ok(())
    }

    async fn receive(&mut self, max_size: usize, timeout: Duration) -> Result<Vec<u8>> {
        // One spare byte distinguishes "exactly max" from "over the limit"
        let mut buffer = vec![0u8; max_size.min(MAX_DATAGRAM_PAYLOAD) + 1];

        let received = tokio::time::timeout(timeout, self.socket.recv(&mut buffer))
            .await
            .map_err(|_| {
                Error::OperationTimeout(format!("no signaling reply within {:?}", timeout))
            })?;

        let len = match received {
            Ok(0) => return Err(Error::PeerClosed("empty datagram".to_string())),
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                return Err(Error::PeerClosed(format!("{} refused", self.peer)));
            }
            Err(e) => return Err(Error::IoError(e)),
        };

        if len > max_size {
            return Err(Error::MessageTooLarge {
                size: len,
                max: max_size,
            });
        }

        buffer.truncate(len);
        Ok(buffer)
    }

    async fn close(&mut self) -> Result<()> {
        // The socket is released on drop; UDP has no close handshake
        debug!(peer = %self.peer, "UDP signaling channel closed");
        Ok(())
    }
}
