//! Per-kind relay loop

use super::shutdown::RunningFlag;
use super::stats::{RelayStats, RelayStatsSnapshot};
use crate::engine::MediaTrack;
use crate::media::MediaKind;
use crate::rtp::{rewrite_ssrc, MIN_RTP_HEADER_SIZE};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Log the first drop of each category and then every Nth
const LOG_EVERY: u64 = 500;

fn should_log(count: u64) -> bool {
    count == 1 || count % LOG_EVERY == 0
}

/// What happened to one received datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Rewritten and accepted by the track
    Forwarded,
    /// Shorter than the fixed RTP header; never reaches the track
    TooShort,
    /// The track was not ready; dropped, not buffered
    TrackNotReady,
    /// The track rejected the packet
    SendFailed(String),
}

/// Validate, rewrite and forward one packet
///
/// `packet` is the received slice (exactly the datagram length). Its SSRC
/// field is overwritten in place only when the packet will be sent.
pub async fn relay_packet(packet: &mut [u8], ssrc: u32, track: &dyn MediaTrack) -> PacketOutcome {
    if packet.len() < MIN_RTP_HEADER_SIZE {
        return PacketOutcome::TooShort;
    }
    if !track.is_ready() {
        return PacketOutcome::TrackNotReady;
    }
    if rewrite_ssrc(packet, ssrc).is_err() {
        return PacketOutcome::TooShort;
    }

    match track.send(packet).await {
        Ok(_) => PacketOutcome::Forwarded,
        Err(e) => PacketOutcome::SendFailed(e.to_string()),
    }
}

/// Drains one ingress socket into one media track
pub struct RelayWorker {
    kind: MediaKind,
    socket: UdpSocket,
    track: Arc<dyn MediaTrack>,
    ssrc: u32,
    running: RunningFlag,
    buffer: Box<[u8]>,
    stats: Arc<RelayStats>,
}

impl RelayWorker {
    /// Create a worker
    ///
    /// # Arguments
    ///
    /// * `socket` - Bound ingress socket, exclusively owned by this worker
    /// * `track` - Egress track; the media session keeps ownership
    /// * `ssrc` - SSRC stamped on every forwarded packet
    /// * `running` - Shared shutdown signal
    /// * `buffer_len` - Receive buffer length; longer datagrams are truncated
    pub fn new(
        socket: UdpSocket,
        track: Arc<dyn MediaTrack>,
        ssrc: u32,
        running: RunningFlag,
        buffer_len: usize,
    ) -> Self {
        Self {
            kind: track.kind(),
            socket,
            track,
            ssrc,
            running,
            buffer: vec![0u8; buffer_len].into_boxed_slice(),
            stats: Arc::new(RelayStats::new()),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Live counters, readable while the worker runs
    pub fn stats(&self) -> Arc<RelayStats> {
        Arc::clone(&self.stats)
    }

    /// Run until the shared flag is stopped, then release the socket
    pub async fn run(mut self) -> RelayStatsSnapshot {
        let local_addr = self.socket.local_addr().ok();
        info!(
            kind = %self.kind,
            ssrc = self.ssrc,
            local_addr = ?local_addr,
            "Relay worker started"
        );

        while self.running.is_running() {
            let received = tokio::select! {
                biased;
                _ = self.running.stopped() => break,
                result = self.socket.recv(&mut self.buffer) => result,
            };

            let len = match received {
                Ok(len) => len,
                Err(e) => {
                    let count = self.stats.record_receive_error();
                    if should_log(count) {
                        warn!(kind = %self.kind, error = %e, count, "Ingress receive failed");
                    }
                    continue;
                }
            };
            self.stats.record_received();

            let outcome = relay_packet(&mut self.buffer[..len], self.ssrc, self.track.as_ref()).await;
            self.record(outcome, len);
        }

        let snapshot = self.stats.snapshot();
        info!(
            kind = %self.kind,
            received = snapshot.received,
            forwarded = snapshot.forwarded,
            dropped = snapshot.dropped(),
            "Relay worker stopped"
        );
        snapshot
    }

    fn record(&self, outcome: PacketOutcome, len: usize) {
        match outcome {
            PacketOutcome::Forwarded => {
                let count = self.stats.record_forwarded();
                if count == 1 {
                    info!(kind = %self.kind, len, "First packet forwarded");
                }
            }
            PacketOutcome::TooShort => {
                let count = self.stats.record_dropped_short();
                if should_log(count) {
                    debug!(kind = %self.kind, len, count, "Dropped datagram shorter than RTP header");
                }
            }
            PacketOutcome::TrackNotReady => {
                let count = self.stats.record_dropped_not_ready();
                if should_log(count) {
                    debug!(kind = %self.kind, count, "Dropped packet, track not ready");
                }
            }
            PacketOutcome::SendFailed(error) => {
                let count = self.stats.record_send_failure();
                if should_log(count) {
                    warn!(kind = %self.kind, error = %error, count, "Track send failed");
                }
            }
        }
    }
}
