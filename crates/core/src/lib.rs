//! Core library for RtpForward
//!
//! RtpForward negotiates one WebRTC session with a signaling peer and then
//! forwards RTP packets arriving on local UDP sockets into the negotiated
//! media tracks, rewriting each packet's SSRC to the value declared in the
//! offer.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │  RelaySession (lifecycle)                              │
//! │  ├─ SdpNegotiator    build offer / apply answer        │
//! │  ├─ SignalingTransport (UDP datagram or WebSocket)     │
//! │  └─ RelayWorker x N  UDP ingress -> MediaTrack         │
//! │     ↓                                                   │
//! │  MediaSession / MediaTrack (engine capability traits)  │
//! │     ↓                                                   │
//! │  rtpforward-webrtc (webrtc-rs backend)                 │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use rtpforward_core::RelayConfig;
//!
//! let mut config = RelayConfig::default();
//! config.signaling.host = "192.168.1.20".to_string();
//! assert!(config.validate().is_ok());
//!
//! let descriptors = config.descriptors();
//! assert_eq!(descriptors.len(), 2);
//! assert_eq!(descriptors[0].ssrc, 43);
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod negotiation;
pub mod relay;
pub mod rtp;
pub mod sdp;
pub mod session;
pub mod signaling;

pub use config::{RelayConfig, SignalingConfig, SignalingMode, StreamConfig};
pub use engine::{
    ConnectionState, GatheringState, LoggingObserver, MediaSession, MediaTrack, SessionObserver,
};
pub use error::{Error, Result};
pub use media::{Codec, Direction, MediaDescriptor, MediaKind};
pub use negotiation::{BoundTrack, NegotiationState, SdpNegotiator};
pub use relay::{PacketOutcome, RelayStats, RelayStatsSnapshot, RelayWorker, RunningFlag};
pub use session::{RelayHandle, RelayReport, RelaySession};
pub use signaling::{SignalingMessage, SignalingTransport};

/// Get the version of this crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
