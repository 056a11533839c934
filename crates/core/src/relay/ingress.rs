//! Ingress socket setup

use crate::{Error, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Bind an unconnected UDP socket and request an enlarged receive buffer
///
/// Failing to enlarge the buffer is logged and tolerated; failing to bind
/// is a [`Error::BindError`].
pub fn bind_ingress(address: SocketAddr, recv_buffer_size: usize) -> Result<UdpSocket> {
    let socket = std::net::UdpSocket::bind(address)
        .map_err(|source| Error::BindError { address, source })?;
    socket.set_nonblocking(true)?;

    set_recv_buffer_size(&socket, recv_buffer_size);

    Ok(UdpSocket::from_std(socket)?)
}

#[cfg(unix)]
fn set_recv_buffer_size(socket: &std::net::UdpSocket, size: usize) {
    use nix::sys::socket::{getsockopt, setsockopt, sockopt};

    if let Err(e) = setsockopt(socket, sockopt::RcvBuf, &size) {
        warn!(requested = size, error = %e, "Failed to set SO_RCVBUF");
        return;
    }
    match getsockopt(socket, sockopt::RcvBuf) {
        Ok(effective) => debug!(requested = size, effective, "Ingress receive buffer sized"),
        Err(e) => debug!(error = %e, "Failed to read back SO_RCVBUF"),
    }
}

#[cfg(not(unix))]
fn set_recv_buffer_size(_socket: &std::net::UdpSocket, size: usize) {
    warn!(requested = size, "SO_RCVBUF sizing not supported on this platform");
}
