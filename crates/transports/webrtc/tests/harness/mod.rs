//! WebRTC test harness
//!
//! - `Answerer`: a plain webrtc-rs peer that answers offers and records
//!   every RTP packet it receives
//! - `AnsweringTransport`: a signaling transport backed by an `Answerer`

#![allow(dead_code)]

use async_trait::async_trait;
use rtpforward_core::{Error, Result, SignalingMessage, SignalingTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Initialize tracing for tests (call once per test)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,webrtc=warn")
        .with_test_writer()
        .try_init();
}

/// RTP packet with version 2, the given SSRC and sequence number
pub fn rtp_packet(ssrc: u32, sequence: u16, len: usize) -> Vec<u8> {
    let mut packet: Vec<u8> = (0..len).map(|i| i as u8).collect();
    packet[0] = 0x80;
    packet[1] = 96;
    packet[2..4].copy_from_slice(&sequence.to_be_bytes());
    packet[4..8].copy_from_slice(&(u32::from(sequence) * 3000).to_be_bytes());
    packet[8..12].copy_from_slice(&ssrc.to_be_bytes());
    packet
}

/// Header fields of one packet seen by the answerer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedPacket {
    pub kind: RTPCodecType,
    pub ssrc: u32,
    pub payload_type: u8,
}

/// Remote peer answering with H.264/96 and Opus/97
pub struct Answerer {
    pc: Arc<RTCPeerConnection>,
    received: Mutex<mpsc::UnboundedReceiver<ReceivedPacket>>,
}

impl Answerer {
    pub async fn new() -> Arc<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_H264.to_owned(),
                        clock_rate: 90000,
                        channels: 0,
                        sdp_fmtp_line:
                            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
                                .to_owned(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 96,
                    ..Default::default()
                },
                RTPCodecType::Video,
            )
            .unwrap();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: MIME_TYPE_OPUS.to_owned(),
                        clock_rate: 48000,
                        channels: 2,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                        rtcp_feedback: vec![],
                    },
                    payload_type: 97,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .unwrap();

        let registry = register_default_interceptors(Default::default(), &mut media_engine).unwrap();
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();
        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = tx.clone();
                // The next on_track is not dispatched until this future completes
                tokio::spawn(async move {
                    while let Ok((packet, _)) = track.read_rtp().await {
                        let _ = tx.send(ReceivedPacket {
                            kind: track.kind(),
                            ssrc: packet.header.ssrc,
                            payload_type: packet.header.payload_type,
                        });
                    }
                });
                Box::pin(async {})
            },
        ));

        Arc::new(Self {
            pc,
            received: Mutex::new(rx),
        })
    }

    /// Apply `offer_sdp` and return the complete (non-trickle) answer
    pub async fn answer(&self, offer_sdp: String) -> Result<String> {
        let offer = RTCSessionDescription::offer(offer_sdp)
            .map_err(|e| Error::WebRtcError(e.to_string()))?;
        self.pc
            .set_remote_description(offer)
            .await
            .map_err(|e| Error::WebRtcError(e.to_string()))?;

        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::WebRtcError(e.to_string()))?;
        let mut gathering_complete = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(answer)
            .await
            .map_err(|e| Error::WebRtcError(e.to_string()))?;
        let _ = gathering_complete.recv().await;

        self.pc
            .local_description()
            .await
            .map(|d| d.sdp)
            .ok_or_else(|| Error::WebRtcError("no local description".to_string()))
    }

    /// Wait for the next received packet of `kind`
    pub async fn next_packet(&self, kind: RTPCodecType, timeout: Duration) -> Option<ReceivedPacket> {
        let mut received = self.received.lock().await;
        tokio::time::timeout(timeout, async {
            while let Some(packet) = received.recv().await {
                if packet.kind == kind {
                    return Some(packet);
                }
            }
            None
        })
        .await
        .ok()
        .flatten()
    }

    pub async fn close(&self) {
        let _ = self.pc.close().await;
    }
}

/// Signaling channel whose peer is an [`Answerer`]
pub struct AnsweringTransport {
    answerer: Arc<Answerer>,
    reply: Option<Vec<u8>>,
}

impl AnsweringTransport {
    pub fn new(answerer: Arc<Answerer>) -> Box<dyn SignalingTransport> {
        Box::new(Self {
            answerer,
            reply: None,
        })
    }
}

#[async_trait]
impl SignalingTransport for AnsweringTransport {
    async fn send(&mut self, message: &[u8]) -> Result<()> {
        let offer = SignalingMessage::from_json_bytes(message)?;
        let answer = self.answerer.answer(offer.sdp).await?;
        self.reply = Some(SignalingMessage::answer(answer).to_json_bytes()?);
        Ok(())
    }

    async fn receive(&mut self, max_size: usize, _timeout: Duration) -> Result<Vec<u8>> {
        let reply = self
            .reply
            .take()
            .ok_or_else(|| Error::OperationTimeout("no offer was sent".to_string()))?;
        if reply.len() > max_size {
            return Err(Error::MessageTooLarge {
                size: reply.len(),
                max: max_size,
            });
        }
        Ok(reply)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
