//! Signaling wire message: `{"type": "offer"|"answer", "sdp": "..."}`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

pub const OFFER_TYPE: &str = "offer";
pub const ANSWER_TYPE: &str = "answer";

/// One offer or answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// `"offer"` or `"answer"`
    #[serde(rename = "type")]
    pub sdp_type: String,

    /// Session description, carried verbatim
    pub sdp: String,
}

/// Lenient shape used to report missing fields as a malformed answer
#[derive(Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    sdp_type: Option<String>,
    sdp: Option<String>,
}

impl SignalingMessage {
    /// Create an offer message
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: OFFER_TYPE.to_string(),
            sdp: sdp.into(),
        }
    }

    /// Create an answer message
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: ANSWER_TYPE.to_string(),
            sdp: sdp.into(),
        }
    }

    pub fn is_answer(&self) -> bool {
        self.sdp_type == ANSWER_TYPE
    }

    /// Serialize to UTF-8 JSON, sent as a single message
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a received message
    ///
    /// Invalid JSON or a missing `type`/`sdp` field is a
    /// [`Error::MalformedAnswer`]; the type value itself is not checked here.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: RawMessage = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedAnswer(format!("invalid JSON: {}", e)))?;

        let sdp_type = raw
            .sdp_type
            .ok_or_else(|| Error::MalformedAnswer("missing field `type`".to_string()))?;
        let sdp = raw
            .sdp
            .ok_or_else(|| Error::MalformedAnswer("missing field `sdp`".to_string()))?;

        Ok(Self { sdp_type, sdp })
    }
}
