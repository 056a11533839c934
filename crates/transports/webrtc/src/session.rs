//! webrtc-rs peer connection as a [`MediaSession`]

use crate::codec::{codec_parameters, codec_type};
use crate::config::WebRtcSessionConfig;
use crate::track::RtpTrack;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rtpforward_core::sdp::declare_ssrcs;
use rtpforward_core::{
    ConnectionState, Error, GatheringState, MediaDescriptor, MediaSession, MediaTrack, Result,
    SessionObserver,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;

type Observers = Arc<RwLock<Vec<Arc<dyn SessionObserver>>>>;

fn map_connection_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}

fn map_gathering_state(state: RTCIceGathererState) -> Option<GatheringState> {
    match state {
        RTCIceGathererState::New => Some(GatheringState::New),
        RTCIceGathererState::Gathering => Some(GatheringState::InProgress),
        RTCIceGathererState::Complete => Some(GatheringState::Complete),
        _ => None,
    }
}

/// One webrtc-rs peer connection offering send-only tracks
pub struct WebRtcMediaSession {
    /// Unique identifier for log correlation
    connection_id: String,

    config: WebRtcSessionConfig,

    peer_connection: Arc<RTCPeerConnection>,

    /// Descriptors whose codecs were registered with the media engine
    registered: Vec<MediaDescriptor>,

    /// Tracks added so far, in offer order
    tracks: Mutex<Vec<Arc<RtpTrack>>>,

    /// True while the peer connection is Connected
    connected: Arc<AtomicBool>,

    observers: Observers,
}

impl WebRtcMediaSession {
    /// Create a peer connection that can carry exactly `descriptors`
    ///
    /// Only the descriptors' codecs are registered, each at its own payload
    /// type, so the offer lists nothing else.
    pub async fn new(config: WebRtcSessionConfig, descriptors: &[MediaDescriptor]) -> Result<Self> {
        config.validate()?;
        let connection_id = uuid::Uuid::new_v4().to_string();
        info!(connection_id = %connection_id, "Creating peer connection");

        let mut media_engine = MediaEngine::default();
        for descriptor in descriptors {
            media_engine
                .register_codec(codec_parameters(descriptor), codec_type(descriptor.kind))
                .map_err(|e| Error::WebRtcError(format!("Failed to register codec: {}", e)))?;
        }

        let interceptor_registry = register_default_interceptors(Default::default(), &mut media_engine)
            .map_err(|e| Error::WebRtcError(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        let ice_servers: Vec<RTCIceServer> = config
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
            Error::WebRtcError(format!("Failed to create peer connection: {}", e))
        })?);

        let session = Self {
            connection_id,
            config,
            peer_connection,
            registered: descriptors.to_vec(),
            tracks: Mutex::new(Vec::new()),
            connected: Arc::new(AtomicBool::new(false)),
            observers: Arc::new(RwLock::new(Vec::new())),
        };
        session.install_handlers();
        Ok(session)
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// True while the peer connection is Connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn install_handlers(&self) {
        let connected = Arc::clone(&self.connected);
        let observers = Arc::clone(&self.observers);
        let connection_id = self.connection_id.clone();

        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let connected = Arc::clone(&connected);
                let observers = Arc::clone(&observers);
                let connection_id = connection_id.clone();

                Box::pin(async move {
                    let Some(state) = map_connection_state(s) else {
                        return;
                    };
                    connected.store(state == ConnectionState::Connected, Ordering::Release);
                    debug!(connection_id = %connection_id, state = ?state, "Peer connection state");

                    let observers = observers.read().clone();
                    for observer in observers {
                        observer.on_connection_state(state);
                    }
                })
            }));

        let observers = Arc::clone(&self.observers);
        self.peer_connection
            .on_ice_gathering_state_change(Box::new(move |s: RTCIceGathererState| {
                let observers = Arc::clone(&observers);

                Box::pin(async move {
                    let Some(state) = map_gathering_state(s) else {
                        return;
                    };
                    let observers = observers.read().clone();
                    for observer in observers {
                        observer.on_gathering_state(state);
                    }
                })
            }));
    }

    async fn set_send_only(&self) {
        for transceiver in self.peer_connection.get_transceivers().await {
            if transceiver.sender().await.track().await.is_some() {
                transceiver
                    .set_direction(RTCRtpTransceiverDirection::Sendonly)
                    .await;
            }
        }
    }
}

#[async_trait]
impl MediaSession for WebRtcMediaSession {
    async fn add_track(&self, descriptor: &MediaDescriptor) -> Result<Arc<dyn MediaTrack>> {
        if !self
            .registered
            .iter()
            .any(|d| d.codec == descriptor.codec && d.payload_type == descriptor.payload_type)
        {
            return Err(Error::NegotiationError(format!(
                "codec {:?}/{} was not registered with this session",
                descriptor.codec, descriptor.payload_type
            )));
        }

        let track = Arc::new(RtpTrack::new(
            descriptor.clone(),
            &self.config.stream_id,
            Arc::clone(&self.connected),
        ));

        let rtp_sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to add track: {}", e)))?;

        // Drain incoming RTCP so the interceptors keep processing it
        let track_id = descriptor.track_id.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtp_sender.read(&mut rtcp_buf).await.is_ok() {}
            debug!(track_id = %track_id, "RTCP reader finished");
        });

        debug!(
            connection_id = %self.connection_id,
            kind = %descriptor.kind,
            ssrc = descriptor.ssrc,
            "Added send-only track"
        );
        self.tracks.lock().push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_offer(&self) -> Result<String> {
        self.set_send_only().await;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::NegotiationError(format!("Failed to create offer: {}", e)))?;

        let mut gathering_complete = self.peer_connection.gathering_complete_promise().await;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| {
                Error::NegotiationError(format!("Failed to set local description: {}", e))
            })?;

        let timeout = self.config.gathering_timeout();
        if tokio::time::timeout(timeout, gathering_complete.recv())
            .await
            .is_err()
        {
            warn!(
                connection_id = %self.connection_id,
                timeout_ms = self.config.gathering_timeout_ms,
                "ICE gathering incomplete, sending offer with the candidates gathered so far"
            );
        }

        let local_desc = self.peer_connection.local_description().await.ok_or_else(|| {
            Error::NegotiationError("No local description after setting offer".to_string())
        })?;

        let descriptors: Vec<MediaDescriptor> = self
            .tracks
            .lock()
            .iter()
            .map(|t| t.descriptor().clone())
            .collect();
        let sdp = declare_ssrcs(&local_desc.sdp, &descriptors)?;

        debug!(
            connection_id = %self.connection_id,
            candidates = sdp.matches("a=candidate:").count(),
            "Created SDP offer"
        );
        Ok(sdp)
    }

    async fn apply_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)
            .map_err(|e| Error::ApplyError(format!("Failed to parse SDP answer: {}", e)))?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| Error::ApplyError(format!("Failed to set remote description: {}", e)))?;

        debug!(connection_id = %self.connection_id, "Remote description set");
        Ok(())
    }

    fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().push(observer);
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::WebRtcError(format!("Failed to close peer connection: {}", e)))?;
        info!(connection_id = %self.connection_id, "Peer connection closed");
        Ok(())
    }
}
