//! Send-only RTP track that keeps the caller's SSRC
//!
//! webrtc-rs stamps every packet written through `TrackLocalStaticRTP` with
//! the sender's own random SSRC. `RtpTrack` delegates negotiation to a static
//! track but writes packets straight to the bound stream, so the SSRC the
//! relay worker put in the header is the one on the wire.

use crate::codec::capability;
use async_trait::async_trait;
use parking_lot::Mutex;
use rtpforward_core::{Error, MediaDescriptor, MediaKind, MediaTrack, Result};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecParameters, RTPCodecType};
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalContext, TrackLocalWriter};
use webrtc::util::Unmarshal;

/// Stream and payload type negotiated for the track
#[derive(Clone)]
struct Binding {
    write_stream: Arc<dyn TrackLocalWriter + Send + Sync>,
    payload_type: u8,
}

/// Egress track for one [`MediaDescriptor`]
pub struct RtpTrack {
    descriptor: MediaDescriptor,
    inner: TrackLocalStaticRTP,
    binding: Mutex<Option<Binding>>,
    connected: Arc<AtomicBool>,
}

impl RtpTrack {
    /// Create a track; `connected` is the owning session's connection flag
    pub fn new(descriptor: MediaDescriptor, stream_id: &str, connected: Arc<AtomicBool>) -> Self {
        let inner = TrackLocalStaticRTP::new(
            capability(descriptor.codec),
            descriptor.track_id.clone(),
            stream_id.to_string(),
        );
        Self {
            descriptor,
            inner,
            binding: Mutex::new(None),
            connected,
        }
    }

    pub fn descriptor(&self) -> &MediaDescriptor {
        &self.descriptor
    }

    /// Whether a sender has bound this track to a transport stream
    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    /// Negotiated payload type, once bound
    pub fn negotiated_payload_type(&self) -> Option<u8> {
        self.binding.lock().as_ref().map(|b| b.payload_type)
    }
}

#[async_trait]
impl TrackLocal for RtpTrack {
    async fn bind(&self, t: &TrackLocalContext) -> webrtc::error::Result<RTCRtpCodecParameters> {
        let codec = self.inner.bind(t).await?;

        debug!(
            track_id = %self.descriptor.track_id,
            payload_type = codec.payload_type,
            "Track bound"
        );
        *self.binding.lock() = Some(Binding {
            write_stream: t.write_stream(),
            payload_type: codec.payload_type,
        });

        Ok(codec)
    }

    async fn unbind(&self, t: &TrackLocalContext) -> webrtc::error::Result<()> {
        self.binding.lock().take();
        debug!(track_id = %self.descriptor.track_id, "Track unbound");
        self.inner.unbind(t).await
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn rid(&self) -> Option<&str> {
        self.inner.rid()
    }

    fn stream_id(&self) -> &str {
        self.inner.stream_id()
    }

    fn kind(&self) -> RTPCodecType {
        self.inner.kind()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[async_trait]
impl MediaTrack for RtpTrack {
    fn kind(&self) -> MediaKind {
        self.descriptor.kind
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.is_bound()
    }

    async fn send(&self, packet: &[u8]) -> Result<usize> {
        let binding = self.binding.lock().clone().ok_or_else(|| {
            Error::MediaTrackError(format!("track {} is not bound", self.descriptor.track_id))
        })?;

        let mut reader = packet;
        let mut rtp = Packet::unmarshal(&mut reader)
            .map_err(|e| Error::MediaTrackError(format!("invalid RTP packet: {}", e)))?;
        rtp.header.payload_type = binding.payload_type;

        binding
            .write_stream
            .write_rtp(&rtp)
            .await
            .map_err(|e| Error::MediaTrackError(format!("write failed: {}", e)))
    }
}
