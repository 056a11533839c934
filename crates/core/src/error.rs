//! Error types for the relay core

use std::net::SocketAddr;

/// Result type alias using the relay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while negotiating or running the relay
///
/// Per-packet relay failures are not represented here: the relay loop
/// reports them as [`crate::relay::PacketOutcome`] values and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Signaling channel could not be established
    #[error("Signaling connection error: {0}")]
    ConnectionError(String),

    /// Signaling message could not be written
    #[error("Signaling send error: {0}")]
    SendError(String),

    /// Operation timeout
    #[error("Operation timeout: {0}")]
    OperationTimeout(String),

    /// Incoming signaling message exceeds the receive limit
    #[error("Signaling message too large: {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Observed message length (at least this many bytes)
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Signaling peer closed the channel
    #[error("Signaling peer closed the channel: {0}")]
    PeerClosed(String),

    /// Local offer could not be produced
    #[error("SDP negotiation error: {0}")]
    NegotiationError(String),

    /// Answer is missing required fields or is not an answer
    #[error("Malformed SDP answer: {0}")]
    MalformedAnswer(String),

    /// Media session rejected the remote description
    #[error("Failed to apply remote description: {0}")]
    ApplyError(String),

    /// Operation not valid in the current negotiation state
    #[error("Protocol state error: {0}")]
    ProtocolStateError(String),

    /// Ingress socket could not be bound
    #[error("Failed to bind UDP socket {address}: {source}")]
    BindError {
        /// Requested local address
        address: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Media track error
    #[error("Media track error: {0}")]
    MediaTrackError(String),

    /// Media engine error
    #[error("WebRTC error: {0}")]
    WebRtcError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Check if this error aborts startup (handshake phase)
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::ConnectionError(_)
                | Error::SendError(_)
                | Error::OperationTimeout(_)
                | Error::PeerClosed(_)
                | Error::NegotiationError(_)
                | Error::MalformedAnswer(_)
                | Error::ApplyError(_)
                | Error::BindError { .. }
                | Error::WebRtcError(_)
                | Error::IoError(_)
        )
    }

    /// Check if this error is a signaling protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::MessageTooLarge { .. } | Error::ProtocolStateError(_)
        )
    }

    /// Check if this error only affects a single relayed packet
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::MediaTrackError(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
