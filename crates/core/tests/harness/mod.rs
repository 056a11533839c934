//! Relay test harness
//!
//! Fakes for the two seams of the core:
//! - `FakeSession` / `FakeTrack`: a scripted media engine
//! - `ScriptedTransport`: a signaling peer that replies with fixed bytes

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rtpforward_core::engine::{ConnectionState, SessionObserver};
use rtpforward_core::{
    Error, MediaDescriptor, MediaKind, MediaSession, MediaTrack, RelayConfig, Result,
    SignalingMessage, SignalingTransport,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Initialize tracing for tests (call once per test)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Default configuration with ephemeral ingress ports
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.video.bind_address = "127.0.0.1:0".parse().unwrap();
    config.audio.bind_address = "127.0.0.1:0".parse().unwrap();
    config.signaling.receive_timeout_ms = 200;
    config
}

/// RTP packet with version 2, the given SSRC and a patterned payload
pub fn rtp_packet(ssrc: u32, len: usize) -> Vec<u8> {
    let mut packet: Vec<u8> = (0..len).map(|i| i as u8).collect();
    packet[0] = 0x80;
    packet[1] = 96;
    packet[8..12].copy_from_slice(&ssrc.to_be_bytes());
    packet
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// ============================================================================
// Media engine fakes
// ============================================================================

/// Track that records every packet it is asked to send
pub struct FakeTrack {
    kind: MediaKind,
    ready: AtomicBool,
    sent: Mutex<Vec<Vec<u8>>>,
}

impl FakeTrack {
    fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            ready: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MediaTrack for FakeTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn send(&self, packet: &[u8]) -> Result<usize> {
        self.sent.lock().push(packet.to_vec());
        Ok(packet.len())
    }
}

/// Media session writing one SDP section per added track
#[derive(Default)]
pub struct FakeSession {
    descriptors: Mutex<Vec<MediaDescriptor>>,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
    observers: Mutex<Vec<Arc<dyn SessionObserver>>>,
    answers: Mutex<Vec<String>>,
    /// Reject every answer with an engine error
    pub reject_answer: bool,
    /// Mark tracks ready as soon as an answer is applied
    pub connect_on_answer: bool,
    closed: AtomicBool,
}

impl FakeSession {
    /// Session whose tracks become ready when the answer is applied
    pub fn connecting() -> Arc<Self> {
        Arc::new(Self {
            connect_on_answer: true,
            ..Default::default()
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            reject_answer: true,
            ..Default::default()
        })
    }

    pub fn track(&self, kind: MediaKind) -> Option<Arc<FakeTrack>> {
        self.tracks.lock().iter().find(|t| t.kind == kind).cloned()
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn notify(&self, state: ConnectionState) {
        for observer in self.observers.lock().iter() {
            observer.on_connection_state(state);
        }
    }
}

#[async_trait]
impl MediaSession for FakeSession {
    async fn add_track(&self, descriptor: &MediaDescriptor) -> Result<Arc<dyn MediaTrack>> {
        let track = Arc::new(FakeTrack::new(descriptor.kind));
        self.descriptors.lock().push(descriptor.clone());
        self.tracks.lock().push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_offer(&self) -> Result<String> {
        let mut sdp = String::from("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n");
        for d in self.descriptors.lock().iter() {
            sdp.push_str(&format!(
                "m={} 9 UDP/TLS/RTP/SAVPF {}\r\na=ssrc:{} cname:{}\r\na=sendonly\r\n",
                d.kind,
                d.payload_type,
                d.ssrc,
                d.track_id
            ));
        }
        Ok(sdp)
    }

    async fn apply_answer(&self, sdp: String) -> Result<()> {
        if self.reject_answer {
            return Err(Error::WebRtcError("no matching codecs".to_string()));
        }
        self.answers.lock().push(sdp);
        if self.connect_on_answer {
            for track in self.tracks.lock().iter() {
                track.set_ready(true);
            }
            self.notify(ConnectionState::Connected);
        }
        Ok(())
    }

    fn subscribe(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.lock().push(observer);
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        for track in self.tracks.lock().iter() {
            track.set_ready(false);
        }
        self.notify(ConnectionState::Closed);
        Ok(())
    }
}

// ============================================================================
// Signaling fake
// ============================================================================

/// What the scripted peer does when asked for a reply
#[derive(Clone)]
pub enum Reply {
    /// Reply with these bytes
    Bytes(Vec<u8>),
    /// Never reply; the receive times out after the caller's timeout
    Silent,
}

impl Reply {
    pub fn answer(sdp: &str) -> Self {
        Reply::Bytes(
            SignalingMessage::answer(sdp)
                .to_json_bytes()
                .expect("answer serializes"),
        )
    }
}

/// Observable state of a [`ScriptedTransport`]
#[derive(Default)]
pub struct TransportLog {
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl TransportLog {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Signaling transport that answers from a script
pub struct ScriptedTransport {
    reply: Reply,
    log: Arc<TransportLog>,
}

impl ScriptedTransport {
    pub fn new(reply: Reply) -> (Box<dyn SignalingTransport>, Arc<TransportLog>) {
        let log = Arc::new(TransportLog::default());
        let transport = Self {
            reply,
            log: Arc::clone(&log),
        };
        (Box::new(transport), log)
    }
}

#[async_trait]
impl SignalingTransport for ScriptedTransport {
    async fn send(&mut self, message: &[u8]) -> Result<()> {
        self.log.sent.lock().push(message.to_vec());
        Ok(())
    }

    async fn receive(&mut self, max_size: usize, timeout: Duration) -> Result<Vec<u8>> {
        match &self.reply {
            Reply::Bytes(bytes) if bytes.len() > max_size => Err(Error::MessageTooLarge {
                size: bytes.len(),
                max: max_size,
            }),
            Reply::Bytes(bytes) => Ok(bytes.clone()),
            Reply::Silent => {
                tokio::time::sleep(timeout).await;
                Err(Error::OperationTimeout(format!(
                    "no signaling reply within {:?}",
                    timeout
                )))
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
