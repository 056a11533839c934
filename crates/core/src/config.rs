//! Configuration types for the relay

use crate::media::{Codec, MediaDescriptor, MediaKind};
use crate::rtp::{MIN_RTP_HEADER_SIZE, RECEIVE_BUFFER_SIZE};
use crate::signaling::MAX_DATAGRAM_PAYLOAD;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Well-known signaling port
pub const DEFAULT_SIGNALING_PORT: u16 = 5000;

/// Main configuration for a relay session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Signaling channel settings
    pub signaling: SignalingConfig,

    /// Video ingress stream
    pub video: StreamConfig,

    /// Audio ingress stream
    pub audio: StreamConfig,

    /// Per-worker receive buffer length in bytes (default: 2048)
    pub receive_buffer_len: usize,

    /// STUN/TURN server URLs handed to the engine (default: none, host candidates only)
    pub ice_servers: Vec<String>,

    /// Upper bound on waiting for ICE gathering before the offer is sent (default: 5000ms)
    pub gathering_timeout_ms: u64,
}

/// Signaling transport flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalingMode {
    /// Connected UDP socket; one datagram is one message (default)
    Datagram,
    /// `ws://host:port`; one frame is one message
    WebSocket,
}

/// Signaling channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Signaling peer host or IP
    pub host: String,

    /// Signaling peer port (default: 5000)
    pub port: u16,

    /// Transport flavor (default: Datagram)
    pub mode: SignalingMode,

    /// Connect timeout in milliseconds (default: 5000)
    pub connect_timeout_ms: u64,

    /// Answer receive timeout in milliseconds (default: 10000)
    pub receive_timeout_ms: u64,

    /// Largest accepted signaling message in bytes (default: 16384)
    pub max_message_size: usize,
}

/// One UDP ingress stream and the descriptor it is relayed under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Local address the ingress socket binds to
    pub bind_address: SocketAddr,

    /// Requested SO_RCVBUF size in bytes
    pub recv_buffer_size: usize,

    /// SSRC declared in the offer and stamped on every forwarded packet
    pub ssrc: u32,

    /// RTP payload type
    pub payload_type: u8,

    /// Codec
    pub codec: Codec,

    /// Track identifier
    pub track_id: String,
}

impl StreamConfig {
    /// Default video stream: 127.0.0.1:6000, H.264/96, SSRC 43, 512 KiB buffer
    pub fn video_default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 6000)),
            recv_buffer_size: 512 * 1024,
            ssrc: 43,
            payload_type: 96,
            codec: Codec::H264,
            track_id: "video-send".to_string(),
        }
    }

    /// Default audio stream: 127.0.0.1:6001, Opus/97, SSRC 44, 128 KiB buffer
    pub fn audio_default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 6001)),
            recv_buffer_size: 128 * 1024,
            ssrc: 44,
            payload_type: 97,
            codec: Codec::Opus,
            track_id: "audio-send".to_string(),
        }
    }

    /// Descriptor this stream is negotiated with
    pub fn descriptor(&self) -> MediaDescriptor {
        MediaDescriptor::new(
            self.codec,
            self.payload_type,
            self.ssrc,
            self.track_id.clone(),
        )
    }

    fn validate(&self, expected: MediaKind) -> Result<()> {
        if self.codec.kind() != expected {
            return Err(Error::InvalidConfig(format!(
                "{} stream cannot use codec {:?}",
                expected, self.codec
            )));
        }
        if !(96..=127).contains(&self.payload_type) {
            return Err(Error::InvalidConfig(format!(
                "{} payload_type must be in dynamic range 96-127, got {}",
                expected, self.payload_type
            )));
        }
        if self.recv_buffer_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "{} recv_buffer_size must be positive",
                expected
            )));
        }
        if self.track_id.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "{} track_id cannot be empty",
                expected
            )));
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            video: StreamConfig::video_default(),
            audio: StreamConfig::audio_default(),
            receive_buffer_len: RECEIVE_BUFFER_SIZE,
            ice_servers: Vec::new(),
            gathering_timeout_ms: 5000,
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_SIGNALING_PORT,
            mode: SignalingMode::Datagram,
            connect_timeout_ms: 5000,
            receive_timeout_ms: 10_000,
            max_message_size: 16 * 1024,
        }
    }
}

impl SignalingConfig {
    /// Connect timeout as a Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Receive timeout as a Duration
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl RelayConfig {
    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: RelayConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Descriptors in offer order (video, then audio)
    pub fn descriptors(&self) -> Vec<MediaDescriptor> {
        vec![self.video.descriptor(), self.audio.descriptor()]
    }

    /// Ingress streams in the same order as [`Self::descriptors`]
    pub fn streams(&self) -> [&StreamConfig; 2] {
        [&self.video, &self.audio]
    }

    /// ICE gathering timeout as a Duration
    pub fn gathering_timeout(&self) -> Duration {
        Duration::from_millis(self.gathering_timeout_ms)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the signaling host is empty or any timeout is zero
    /// - `max_message_size` is zero, or larger than one UDP datagram in datagram mode
    /// - `receive_buffer_len` is shorter than an RTP header
    /// - a stream's codec does not match its kind, or its payload type is not dynamic
    /// - two streams share an SSRC or a fixed bind address
    /// - an ICE server URL is not `stun:`, `turn:` or `turns:`
    pub fn validate(&self) -> Result<()> {
        if self.signaling.host.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "signaling host cannot be empty".to_string(),
            ));
        }
        if self.signaling.connect_timeout_ms == 0 || self.signaling.receive_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "signaling timeouts must be positive".to_string(),
            ));
        }
        if self.signaling.max_message_size == 0 {
            return Err(Error::InvalidConfig(
                "max_message_size must be positive".to_string(),
            ));
        }
        if self.signaling.mode == SignalingMode::Datagram
            && self.signaling.max_message_size > MAX_DATAGRAM_PAYLOAD
        {
            return Err(Error::InvalidConfig(format!(
                "max_message_size {} exceeds the largest UDP datagram ({})",
                self.signaling.max_message_size, MAX_DATAGRAM_PAYLOAD
            )));
        }
        if self.receive_buffer_len < MIN_RTP_HEADER_SIZE {
            return Err(Error::InvalidConfig(format!(
                "receive_buffer_len must be at least {}, got {}",
                MIN_RTP_HEADER_SIZE, self.receive_buffer_len
            )));
        }
        if self.gathering_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "gathering_timeout_ms must be positive".to_string(),
            ));
        }

        self.video.validate(MediaKind::Video)?;
        self.audio.validate(MediaKind::Audio)?;

        let mut ssrcs = HashSet::new();
        let mut addresses = HashSet::new();
        for stream in self.streams() {
            if !ssrcs.insert(stream.ssrc) {
                return Err(Error::InvalidConfig(format!(
                    "SSRC {} is assigned to more than one stream",
                    stream.ssrc
                )));
            }
            // Port 0 asks the OS for an ephemeral port, which never collides
            if stream.bind_address.port() != 0 && !addresses.insert(stream.bind_address) {
                return Err(Error::InvalidConfig(format!(
                    "bind address {} is used by more than one stream",
                    stream.bind_address
                )));
            }
        }

        for url in &self.ice_servers {
            if !(url.starts_with("stun:") || url.starts_with("turn:") || url.starts_with("turns:")) {
                return Err(Error::InvalidConfig(format!(
                    "ICE server URL must start with stun:, turn: or turns:, got {}",
                    url
                )));
            }
        }

        Ok(())
    }
}
