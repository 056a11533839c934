//! Media engine capability interface
//!
//! ICE, DTLS, SRTP and codec negotiation live behind these traits. The
//! relay only needs to add tracks, exchange descriptions, and push RTP into
//! tracks; connection/gathering notifications are for observability.

use crate::media::{MediaDescriptor, MediaKind};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Peer connection state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Initial state, connection not yet started
    New,
    /// Connection negotiation in progress
    Connecting,
    /// Connection established successfully
    Connected,
    /// Connectivity lost (may recover)
    Disconnected,
    /// Connection failed
    Failed,
    /// Connection closed
    Closed,
}

/// ICE candidate gathering state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringState {
    /// Gathering not started
    New,
    /// Candidates are being gathered
    InProgress,
    /// All candidates gathered
    Complete,
}

/// Receives engine state notifications
pub trait SessionObserver: Send + Sync {
    /// Peer connection state changed
    fn on_connection_state(&self, state: ConnectionState);

    /// ICE gathering state changed
    fn on_gathering_state(&self, state: GatheringState);
}

/// Egress track handle owned by a [`MediaSession`]
#[async_trait]
pub trait MediaTrack: Send + Sync {
    /// Media kind of this track
    fn kind(&self) -> MediaKind;

    /// Whether packets can currently be delivered
    fn is_ready(&self) -> bool;

    /// Send one complete RTP packet (header + payload)
    async fn send(&self, packet: &[u8]) -> Result<usize>;
}

/// One negotiated media session (a single remote peer)
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Register a local send-only track for `descriptor`
    async fn add_track(&self, descriptor: &MediaDescriptor) -> Result<Arc<dyn MediaTrack>>;

    /// Generate the local offer, apply it as local description, and return its SDP
    async fn create_offer(&self) -> Result<String>;

    /// Apply the remote answer
    async fn apply_answer(&self, sdp: String) -> Result<()>;

    /// Subscribe to state notifications
    fn subscribe(&self, observer: Arc<dyn SessionObserver>);

    /// Close the session and release engine resources
    async fn close(&self) -> Result<()>;
}

/// Observer that logs every engine state change
#[derive(Debug, Default, Clone)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_connection_state(&self, state: ConnectionState) {
        match state {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                warn!(state = ?state, "Peer connection state changed")
            }
            _ => info!(state = ?state, "Peer connection state changed"),
        }
    }

    fn on_gathering_state(&self, state: GatheringState) {
        info!(state = ?state, "ICE gathering state changed");
    }
}
