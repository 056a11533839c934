//! RTP fixed-header helpers
//!
//! Only the fixed 12-byte header is touched; payload, CSRC list and
//! extensions pass through unchanged.

/// Size of the fixed RTP header (RFC 3550 §5.1)
pub const MIN_RTP_HEADER_SIZE: usize = 12;

/// Receive buffer length per worker, one Ethernet frame's worth of RTP
pub const RECEIVE_BUFFER_SIZE: usize = 2048;

/// Byte range of the SSRC field in the fixed header
const SSRC_OFFSET: usize = 8;

/// Packet is shorter than the fixed RTP header
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("RTP header too short: {len} bytes (minimum {MIN_RTP_HEADER_SIZE})")]
pub struct HeaderTooShort {
    /// Length of the rejected packet
    pub len: usize,
}

/// Overwrite the SSRC field of an RTP packet in place
///
/// Rewriting a packet that already carries `ssrc` leaves it byte-identical.
pub fn rewrite_ssrc(packet: &mut [u8], ssrc: u32) -> Result<(), HeaderTooShort> {
    let len = packet.len();
    let field = packet
        .get_mut(SSRC_OFFSET..MIN_RTP_HEADER_SIZE)
        .ok_or(HeaderTooShort { len })?;
    field.copy_from_slice(&ssrc.to_be_bytes());
    Ok(())
}

/// Read the SSRC field, if the packet holds a full fixed header
pub fn read_ssrc(packet: &[u8]) -> Option<u32> {
    let field = packet.get(SSRC_OFFSET..MIN_RTP_HEADER_SIZE)?;
    Some(u32::from_be_bytes([field[0], field[1], field[2], field[3]]))
}

/// RTP version bits (2 for any conforming sender)
pub fn rtp_version(packet: &[u8]) -> Option<u8> {
    packet.first().map(|b| b >> 6)
}
