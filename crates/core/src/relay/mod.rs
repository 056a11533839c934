//! RTP relay: UDP ingress sockets forwarded into media tracks
//!
//! One [`RelayWorker`] runs per media kind. Workers share nothing but the
//! [`RunningFlag`]; each owns its socket, its receive buffer and its stats.

mod ingress;
mod shutdown;
mod stats;
mod worker;

pub use ingress::bind_ingress;
pub use shutdown::RunningFlag;
pub use stats::{RelayStats, RelayStatsSnapshot};
pub use worker::{relay_packet, PacketOutcome, RelayWorker};
