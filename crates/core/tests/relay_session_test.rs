//! Relay lifecycle integration tests
//!
//! Drive a full `RelaySession` against the fake media engine and a scripted
//! signaling peer, with real UDP ingress sockets.

mod harness;

use harness::{
    init_test_tracing, rtp_packet, test_config, wait_until, FakeSession, Reply, ScriptedTransport,
};
use rtpforward_core::rtp::read_ssrc;
use rtpforward_core::signaling::DatagramSignaling;
use rtpforward_core::{Error, MediaKind, RelaySession, RunningFlag, SignalingMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

const ANSWER_SDP: &str = "v=0\r\no=- 9 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

#[tokio::test]
async fn test_relay_forwards_with_declared_ssrc() {
    init_test_tracing();

    let session = FakeSession::connecting();
    let running = RunningFlag::new();
    let relay = RelaySession::new(test_config(), session.clone(), running.clone());
    let (transport, log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));

    let handle = relay.start(transport).await.unwrap();
    assert_eq!(handle.workers_running(), 2);
    assert_eq!(session.answers(), vec![ANSWER_SDP.to_string()]);

    // Exactly one offer went out and the channel was closed before relaying
    let sent = log.sent();
    assert_eq!(sent.len(), 1);
    let offer = SignalingMessage::from_json_bytes(&sent[0]).unwrap();
    assert_eq!(offer.sdp_type, "offer");
    assert!(offer.sdp.contains("a=ssrc:43 "));
    assert!(offer.sdp.contains("a=ssrc:44 "));
    assert!(log.is_closed());

    let video_addr = handle.ingress_addr(MediaKind::Video).unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&[0xff; 12][..11], video_addr).await.unwrap();
    sender.send_to(&[0xee; 12], video_addr).await.unwrap();
    sender.send_to(&rtp_packet(999, 200), video_addr).await.unwrap();

    let video = session.track(MediaKind::Video).unwrap();
    assert!(wait_until(Duration::from_secs(2), || video.sent_count() >= 2).await);

    let report = handle.shutdown().await;
    assert!(!running.is_running());

    // The 12-byte datagram is a bare header and is relayed; the 11-byte one is not
    let sent = video.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].len(), 12);
    assert_eq!(sent[1].len(), 200);
    assert_eq!(read_ssrc(&sent[1]), Some(43));
    assert_eq!(sent[1][12..], rtp_packet(999, 200)[12..]);

    let video_stats = report.get(MediaKind::Video).unwrap();
    assert_eq!(video_stats.received, 3);
    assert_eq!(video_stats.dropped_short, 1);
    assert_eq!(video_stats.forwarded, 2);
    assert_eq!(report.get(MediaKind::Audio).unwrap().received, 0);
}

#[tokio::test]
async fn test_audio_packets_use_audio_ssrc() {
    let session = FakeSession::connecting();
    let relay = RelaySession::new(test_config(), session.clone(), RunningFlag::new());
    let (transport, _log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));
    let handle = relay.start(transport).await.unwrap();

    let audio_addr = handle.ingress_addr(MediaKind::Audio).unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(&rtp_packet(43, 80), audio_addr).await.unwrap();

    let audio = session.track(MediaKind::Audio).unwrap();
    assert!(wait_until(Duration::from_secs(2), || audio.sent_count() == 1).await);
    assert_eq!(read_ssrc(&audio.sent()[0]), Some(44));
    assert_eq!(session.track(MediaKind::Video).unwrap().sent_count(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_packets_dropped_while_track_not_ready() {
    let session = Arc::new(FakeSession::default());
    let relay = RelaySession::new(test_config(), session.clone(), RunningFlag::new());
    let (transport, _log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));
    let handle = relay.start(transport).await.unwrap();

    let video_addr = handle.ingress_addr(MediaKind::Video).unwrap();
    let video = session.track(MediaKind::Video).unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    sender.send_to(&rtp_packet(999, 200), video_addr).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(video.sent_count(), 0);

    // Readiness can flip while the worker runs
    video.set_ready(true);
    sender.send_to(&rtp_packet(999, 200), video_addr).await.unwrap();
    assert!(wait_until(Duration::from_secs(2), || video.sent_count() == 1).await);

    let report = handle.shutdown().await;
    let stats = report.get(MediaKind::Video).unwrap();
    assert_eq!(stats.dropped_not_ready, 1);
    assert_eq!(stats.forwarded, 1);
}

#[tokio::test]
async fn test_signaling_timeout_starts_no_workers() {
    init_test_tracing();

    // A bound peer that never answers
    let silent_peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = silent_peer.local_addr().unwrap().port();
    let transport = DatagramSignaling::connect("127.0.0.1", port, Duration::from_secs(1))
        .await
        .unwrap();

    let mut config = test_config();
    config.signaling.receive_timeout_ms = 100;
    let session = FakeSession::connecting();
    let running = RunningFlag::new();
    let relay = RelaySession::new(config, session.clone(), running.clone());

    let started = tokio::time::Instant::now();
    let err = relay.run_with_transport(Box::new(transport)).await.unwrap_err();

    assert!(matches!(err, Error::OperationTimeout(_)));
    assert!(err.is_setup_error());
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(!running.is_running());
    assert!(session.is_closed());
    assert!(session.answers().is_empty());

    // The offer did reach the peer
    let mut buf = vec![0u8; 16 * 1024];
    let len = silent_peer.recv(&mut buf).await.unwrap();
    let offer = SignalingMessage::from_json_bytes(&buf[..len]).unwrap();
    assert_eq!(offer.sdp_type, "offer");
}

#[tokio::test]
async fn test_rejected_answer_aborts() {
    let session = FakeSession::rejecting();
    let running = RunningFlag::new();
    let relay = RelaySession::new(test_config(), session.clone(), running.clone());
    let (transport, log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));

    let err = relay.run_with_transport(transport).await.unwrap_err();

    assert!(matches!(err, Error::ApplyError(_)));
    assert!(!running.is_running());
    assert!(log.is_closed());
    assert!(session.is_closed());
    assert_eq!(session.track(MediaKind::Video).unwrap().sent_count(), 0);
}

#[tokio::test]
async fn test_malformed_reply_aborts() {
    let session = FakeSession::connecting();
    let running = RunningFlag::new();
    let relay = RelaySession::new(test_config(), session.clone(), running.clone());
    let (transport, _log) = ScriptedTransport::new(Reply::Bytes(br#"{"sdp": "v=0"}"#.to_vec()));

    let err = relay.run_with_transport(transport).await.unwrap_err();
    assert!(matches!(err, Error::MalformedAnswer(_)));
    assert!(!running.is_running());
    assert!(session.answers().is_empty());
}

#[tokio::test]
async fn test_oversized_reply_is_protocol_violation() {
    let mut config = test_config();
    config.signaling.max_message_size = 64;
    let relay = RelaySession::new(config, FakeSession::connecting(), RunningFlag::new());
    let (transport, _log) = ScriptedTransport::new(Reply::answer(&"a".repeat(128)));

    let err = relay.run_with_transport(transport).await.unwrap_err();
    assert!(err.is_protocol_violation());
}

#[tokio::test]
async fn test_bind_conflict_aborts_before_signaling() {
    let occupied = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut config = test_config();
    config.video.bind_address = occupied.local_addr().unwrap();

    let running = RunningFlag::new();
    let relay = RelaySession::new(config, FakeSession::connecting(), running.clone());
    let (transport, log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));

    let err = relay.run_with_transport(transport).await.unwrap_err();
    assert!(matches!(err, Error::BindError { .. }));
    assert!(log.sent().is_empty());
    assert!(!running.is_running());
}

#[tokio::test]
async fn test_shutdown_while_blocked_in_receive() {
    let session = FakeSession::connecting();
    let running = RunningFlag::new();
    let relay = RelaySession::new(test_config(), session.clone(), running.clone());
    let (transport, _log) = ScriptedTransport::new(Reply::answer(ANSWER_SDP));

    let task = tokio::spawn(relay.run_with_transport(transport));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    // No datagram ever arrives; stopping the flag alone must unblock both workers
    let stopper = running.clone();
    std::thread::spawn(move || {
        stopper.stop();
    });

    let report = tokio::time::timeout(Duration::from_millis(500), task)
        .await
        .expect("relay did not shut down")
        .unwrap()
        .unwrap();

    assert_eq!(report.streams.len(), 2);
    assert_eq!(report.total_forwarded(), 0);
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_shutdown_during_signaling() {
    let running = RunningFlag::new();
    let mut config = test_config();
    config.signaling.receive_timeout_ms = 10_000;
    let relay = RelaySession::new(config, FakeSession::connecting(), running.clone());
    let (transport, _log) = ScriptedTransport::new(Reply::Silent);

    let task = tokio::spawn(relay.run_with_transport(transport));
    tokio::time::sleep(Duration::from_millis(50)).await;
    running.stop();

    let result = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("signaling wait was not interrupted")
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_logging_observer_subscribed() {
    let session = FakeSession::connecting();
    let _relay = RelaySession::new(test_config(), session.clone(), RunningFlag::new());
    assert_eq!(session.observer_count(), 1);
}
