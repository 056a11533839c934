//! Media descriptors: what each relayed stream declares in the offer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind of a relayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video stream (`m=video`)
    Video,
    /// Audio stream (`m=audio`)
    Audio,
}

impl MediaKind {
    /// SDP media token (`video` / `audio`)
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codecs a stream may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Codec {
    /// H.264 (packetization-mode=1, constrained baseline)
    H264,
    /// VP8
    VP8,
    /// VP9
    VP9,
    /// Opus, 48 kHz stereo
    Opus,
}

impl Codec {
    /// Media kind this codec belongs to
    pub fn kind(&self) -> MediaKind {
        match self {
            Codec::H264 | Codec::VP8 | Codec::VP9 => MediaKind::Video,
            Codec::Opus => MediaKind::Audio,
        }
    }

    /// MIME type as registered with the media engine
    pub fn mime_type(&self) -> &'static str {
        match self {
            Codec::H264 => "video/H264",
            Codec::VP8 => "video/VP8",
            Codec::VP9 => "video/VP9",
            Codec::Opus => "audio/opus",
        }
    }

    /// RTP clock rate in Hz
    pub fn clock_rate(&self) -> u32 {
        match self {
            Codec::H264 | Codec::VP8 | Codec::VP9 => 90_000,
            Codec::Opus => 48_000,
        }
    }

    /// Channel count (0 for video)
    pub fn channels(&self) -> u16 {
        match self {
            Codec::Opus => 2,
            _ => 0,
        }
    }

    /// `a=fmtp` parameters
    pub fn sdp_fmtp_line(&self) -> &'static str {
        match self {
            Codec::H264 => {
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
            }
            Codec::Opus => "minptime=10;useinbandfec=1",
            Codec::VP8 | Codec::VP9 => "",
        }
    }
}

/// Stream direction
///
/// The relay only ever sends, so this has a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    /// `a=sendonly`
    #[default]
    SendOnly,
}

/// Immutable description of one relayed stream
///
/// The SSRC is caller-assigned: every packet forwarded on this stream's
/// track carries it, whatever SSRC arrived on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Media kind
    pub kind: MediaKind,
    /// Codec
    pub codec: Codec,
    /// RTP payload type (dynamic range)
    pub payload_type: u8,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Direction (always send-only)
    pub direction: Direction,
    /// Track identifier used as the SSRC name in the offer
    pub track_id: String,
}

impl MediaDescriptor {
    /// Create a send-only descriptor; the kind is taken from the codec
    pub fn new(codec: Codec, payload_type: u8, ssrc: u32, track_id: impl Into<String>) -> Self {
        Self {
            kind: codec.kind(),
            codec,
            payload_type,
            ssrc,
            direction: Direction::SendOnly,
            track_id: track_id.into(),
        }
    }

    /// H.264 video descriptor named `video-send`
    pub fn video(payload_type: u8, ssrc: u32) -> Self {
        Self::new(Codec::H264, payload_type, ssrc, "video-send")
    }

    /// Opus audio descriptor named `audio-send`
    pub fn audio(payload_type: u8, ssrc: u32) -> Self {
        Self::new(Codec::Opus, payload_type, ssrc, "audio-send")
    }
}
