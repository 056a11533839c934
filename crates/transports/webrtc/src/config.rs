//! Media engine configuration

use rtpforward_core::{Error, RelayConfig, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for one webrtc-rs peer connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRtcSessionConfig {
    /// STUN/TURN server URLs (empty: host candidates only)
    pub ice_servers: Vec<String>,

    /// Upper bound on waiting for ICE gathering before the offer is returned
    pub gathering_timeout_ms: u64,

    /// Media stream id shared by every track of the session
    pub stream_id: String,
}

impl Default for WebRtcSessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            gathering_timeout_ms: 5000,
            stream_id: "rtpforward".to_string(),
        }
    }
}

impl From<&RelayConfig> for WebRtcSessionConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            gathering_timeout_ms: config.gathering_timeout_ms,
            ..Default::default()
        }
    }
}

impl WebRtcSessionConfig {
    pub fn gathering_timeout(&self) -> Duration {
        Duration::from_millis(self.gathering_timeout_ms)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.gathering_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "gathering_timeout_ms must be positive".to_string(),
            ));
        }
        if self.stream_id.is_empty() {
            return Err(Error::InvalidConfig("stream_id cannot be empty".to_string()));
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
