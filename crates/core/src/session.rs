//! Session lifecycle: negotiate once, then relay until shutdown
//!
//! Ordering is strict. Ingress sockets are bound, the offer/answer exchange
//! completes and the signaling channel is closed before any worker starts.
//! If any of that fails the running flag is cleared and no worker is spawned.

use crate::config::RelayConfig;
use crate::engine::{LoggingObserver, MediaSession};
use crate::media::MediaKind;
use crate::negotiation::{BoundTrack, SdpNegotiator};
use crate::relay::{bind_ingress, RelayStatsSnapshot, RelayWorker, RunningFlag};
use crate::signaling::{self, SignalingMessage, SignalingTransport};
use crate::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Final per-stream counters, in descriptor order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub streams: Vec<(MediaKind, RelayStatsSnapshot)>,
}

impl RelayReport {
    /// Counters for `kind`, if a worker ran for it
    pub fn get(&self, kind: MediaKind) -> Option<&RelayStatsSnapshot> {
        self.streams
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, stats)| stats)
    }

    pub fn total_forwarded(&self) -> u64 {
        self.streams.iter().map(|(_, s)| s.forwarded).sum()
    }

    /// Counters as a JSON object keyed by media kind
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut streams = serde_json::Map::new();
        for (kind, stats) in &self.streams {
            streams.insert(kind.to_string(), serde_json::to_value(stats)?);
        }
        Ok(serde_json::Value::Object(streams))
    }
}

/// Running relay workers
pub struct RelayHandle {
    running: RunningFlag,
    workers: Vec<(MediaKind, JoinHandle<RelayStatsSnapshot>)>,
    tracks: Vec<BoundTrack>,
    ingress: Vec<(MediaKind, SocketAddr)>,
}

impl RelayHandle {
    /// Number of workers that have not exited yet
    pub fn workers_running(&self) -> usize {
        self.workers
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Local address the ingress socket for `kind` is bound to
    pub fn ingress_addr(&self, kind: MediaKind) -> Option<SocketAddr> {
        self.ingress
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, address)| *address)
    }

    /// Tracks the workers forward into
    pub fn tracks(&self) -> &[BoundTrack] {
        &self.tracks
    }

    /// Block until shutdown is requested, then join every worker
    pub async fn wait(self) -> RelayReport {
        self.running.stopped().await;
        info!("Shutdown requested");
        self.join().await
    }

    /// Request shutdown and join every worker
    pub async fn shutdown(self) -> RelayReport {
        if self.running.stop() {
            info!("Shutdown requested");
        }
        self.join().await
    }

    async fn join(self) -> RelayReport {
        let mut report = RelayReport::default();
        for (kind, handle) in self.workers {
            let snapshot = match handle.await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(kind = %kind, error = %e, "Relay worker task failed");
                    RelayStatsSnapshot::default()
                }
            };
            report.streams.push((kind, snapshot));
        }
        info!(
            workers = report.streams.len(),
            forwarded = report.total_forwarded(),
            "Relay workers joined"
        );
        report
    }
}

/// Owns the media session for one relay run
pub struct RelaySession {
    config: RelayConfig,
    session: Arc<dyn MediaSession>,
    running: RunningFlag,
}

impl RelaySession {
    /// Wrap an engine session; state changes are logged from here on
    pub fn new(config: RelayConfig, session: Arc<dyn MediaSession>, running: RunningFlag) -> Self {
        session.subscribe(Arc::new(LoggingObserver));
        Self {
            config,
            session,
            running,
        }
    }

    pub fn running(&self) -> &RunningFlag {
        &self.running
    }

    /// Connect the configured signaling channel and run to completion
    pub async fn run(self) -> Result<RelayReport> {
        let transport = match signaling::connect(&self.config.signaling).await {
            Ok(transport) => transport,
            Err(e) => {
                self.abort(&e).await;
                return Err(e);
            }
        };
        self.run_with_transport(transport).await
    }

    /// Run to completion over an already connected signaling channel
    ///
    /// Returns once the running flag is stopped and every worker has exited.
    pub async fn run_with_transport(
        self,
        transport: Box<dyn SignalingTransport>,
    ) -> Result<RelayReport> {
        let handle = match self.start(transport).await {
            Ok(handle) => handle,
            Err(e) => {
                self.abort(&e).await;
                return Err(e);
            }
        };

        let report = handle.wait().await;
        self.close_session().await;
        Ok(report)
    }

    /// Negotiate and spawn the workers without waiting for shutdown
    ///
    /// On error the running flag is stopped and no worker has been started.
    pub async fn start(&self, transport: Box<dyn SignalingTransport>) -> Result<RelayHandle> {
        let result = self.try_start(transport).await;
        if result.is_err() {
            self.running.stop();
        }
        result
    }

    async fn try_start(&self, transport: Box<dyn SignalingTransport>) -> Result<RelayHandle> {
        self.config.validate()?;

        let mut sockets = Vec::new();
        for stream in self.config.streams() {
            let socket = bind_ingress(stream.bind_address, stream.recv_buffer_size)?;
            info!(
                kind = %stream.codec.kind(),
                address = %stream.bind_address,
                "Ingress socket bound"
            );
            sockets.push(socket);
        }

        let tracks = tokio::select! {
            result = self.negotiate(transport) => result?,
            _ = self.running.stopped() => {
                return Err(Error::ConnectionError(
                    "shutdown requested during signaling".to_string(),
                ));
            }
        };

        Ok(self.spawn_workers(sockets, tracks))
    }

    async fn negotiate(&self, mut transport: Box<dyn SignalingTransport>) -> Result<Vec<BoundTrack>> {
        let mut negotiator = SdpNegotiator::new(Arc::clone(&self.session));
        let exchange = async {
            let (offer, tracks) = negotiator.build_offer(&self.config.descriptors()).await?;

            transport.send(&offer.to_json_bytes()?).await?;
            info!(bytes = offer.sdp.len(), "Offer sent");

            let signaling = &self.config.signaling;
            let reply = transport
                .receive(signaling.max_message_size, signaling.receive_timeout())
                .await?;
            info!(bytes = reply.len(), "Answer received");
            Ok::<_, Error>((reply, tracks))
        };
        let exchanged = exchange.await;

        if let Err(e) = transport.close().await {
            warn!(error = %e, "Failed to close signaling channel");
        }
        let (reply, tracks) = exchanged?;

        let answer = SignalingMessage::from_json_bytes(&reply)?;
        negotiator.apply_answer(&answer).await?;
        Ok(tracks)
    }

    fn spawn_workers(&self, sockets: Vec<UdpSocket>, tracks: Vec<BoundTrack>) -> RelayHandle {
        let ingress = sockets
            .iter()
            .zip(&tracks)
            .filter_map(|(socket, bound)| {
                socket
                    .local_addr()
                    .ok()
                    .map(|address| (bound.descriptor.kind, address))
            })
            .collect();

        let workers = sockets
            .into_iter()
            .zip(&tracks)
            .map(|(socket, bound)| {
                let worker = RelayWorker::new(
                    socket,
                    Arc::clone(&bound.track),
                    bound.descriptor.ssrc,
                    self.running.clone(),
                    self.config.receive_buffer_len,
                );
                (bound.descriptor.kind, tokio::spawn(worker.run()))
            })
            .collect::<Vec<_>>();

        info!(workers = workers.len(), "Relay started");
        RelayHandle {
            running: self.running.clone(),
            workers,
            tracks,
            ingress,
        }
    }

    async fn abort(&self, e: &Error) {
        error!(error = %e, "Relay setup failed");
        self.running.stop();
        self.close_session().await;
    }

    async fn close_session(&self) {
        if let Err(e) = self.session.close().await {
            warn!(error = %e, "Failed to close media session");
        }
    }
}
