//! Per-worker relay counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one relay worker
///
/// Every `record_*` method returns the updated count, which callers use to
/// rate-limit their logging.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    dropped_short: AtomicU64,
    dropped_not_ready: AtomicU64,
    send_failures: AtomicU64,
    receive_errors: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    /// Datagrams read from the ingress socket
    pub received: u64,
    /// Packets accepted by the track
    pub forwarded: u64,
    /// Datagrams shorter than an RTP header
    pub dropped_short: u64,
    /// Packets dropped because the track was not ready
    pub dropped_not_ready: u64,
    /// Packets the track failed to send
    pub send_failures: u64,
    /// Failed socket receive calls
    pub receive_errors: u64,
}

impl RelayStatsSnapshot {
    /// Received datagrams that were not forwarded
    pub fn dropped(&self) -> u64 {
        self.dropped_short + self.dropped_not_ready + self.send_failures
    }
}

fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) -> u64 {
        bump(&self.received)
    }

    pub fn record_forwarded(&self) -> u64 {
        bump(&self.forwarded)
    }

    pub fn record_dropped_short(&self) -> u64 {
        bump(&self.dropped_short)
    }

    pub fn record_dropped_not_ready(&self) -> u64 {
        bump(&self.dropped_not_ready)
    }

    pub fn record_send_failure(&self) -> u64 {
        bump(&self.send_failures)
    }

    pub fn record_receive_error(&self) -> u64 {
        bump(&self.receive_errors)
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped_short: self.dropped_short.load(Ordering::Relaxed),
            dropped_not_ready: self.dropped_not_ready.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}
