//! Descriptor to webrtc-rs codec mapping

use rtpforward_core::{Codec, MediaDescriptor, MediaKind};
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

pub fn codec_type(kind: MediaKind) -> RTPCodecType {
    match kind {
        MediaKind::Video => RTPCodecType::Video,
        MediaKind::Audio => RTPCodecType::Audio,
    }
}

pub fn capability(codec: Codec) -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: codec.mime_type().to_string(),
        clock_rate: codec.clock_rate(),
        channels: codec.channels(),
        sdp_fmtp_line: codec.sdp_fmtp_line().to_string(),
        rtcp_feedback: vec![],
    }
}

/// Codec parameters registered with the media engine for `descriptor`
pub fn codec_parameters(descriptor: &MediaDescriptor) -> RTCRtpCodecParameters {
    RTCRtpCodecParameters {
        capability: capability(descriptor.codec),
        payload_type: descriptor.payload_type,
        ..Default::default()
    }
}
