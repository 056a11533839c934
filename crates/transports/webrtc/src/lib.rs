//! webrtc-rs backend for RtpForward
//!
//! Implements the core's [`MediaSession`](rtpforward_core::MediaSession) and
//! [`MediaTrack`](rtpforward_core::MediaTrack) capability traits on top of
//! the `webrtc` crate. ICE, DTLS, SRTP and RTCP handling all stay inside
//! webrtc-rs.

pub mod codec;
pub mod config;
pub mod session;
pub mod track;

pub use config::WebRtcSessionConfig;
pub use session::WebRtcMediaSession;
pub use track::RtpTrack;
