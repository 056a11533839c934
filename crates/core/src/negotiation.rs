//! SDP offer/answer negotiation against a [`MediaSession`]

use crate::engine::{MediaSession, MediaTrack};
use crate::media::MediaDescriptor;
use crate::sdp::media_sections;
use crate::signaling::SignalingMessage;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Negotiation progress; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No offer built yet
    Idle,
    /// Offer built and applied locally, waiting for the answer
    OfferCreated,
    /// Answer applied; no renegotiation is possible
    Answered,
}

/// A descriptor together with the track registered for it
#[derive(Clone)]
pub struct BoundTrack {
    pub descriptor: MediaDescriptor,
    pub track: Arc<dyn MediaTrack>,
}

impl std::fmt::Debug for BoundTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundTrack")
            .field("descriptor", &self.descriptor)
            .field("ready", &self.track.is_ready())
            .finish()
    }
}

/// Builds the single offer and applies the single answer
pub struct SdpNegotiator {
    session: Arc<dyn MediaSession>,
    state: NegotiationState,
    descriptors: Vec<MediaDescriptor>,
}

impl SdpNegotiator {
    pub fn new(session: Arc<dyn MediaSession>) -> Self {
        Self {
            session,
            state: NegotiationState::Idle,
            descriptors: Vec::new(),
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Register one track per descriptor and produce the offer
    ///
    /// The returned offer has exactly one media section per descriptor, in
    /// order, each carrying its descriptor's payload type and SSRC.
    ///
    /// # Errors
    ///
    /// * [`Error::NegotiationError`] - no descriptors, a duplicate SSRC, or
    ///   the session produced an offer that does not match the descriptors
    /// * [`Error::ProtocolStateError`] - an offer was already built
    pub async fn build_offer(
        &mut self,
        descriptors: &[MediaDescriptor],
    ) -> Result<(SignalingMessage, Vec<BoundTrack>)> {
        if self.state != NegotiationState::Idle {
            return Err(Error::ProtocolStateError(format!(
                "offer already built (state {:?})",
                self.state
            )));
        }
        if descriptors.is_empty() {
            return Err(Error::NegotiationError(
                "no media descriptors supplied".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = descriptors.iter().find(|d| !seen.insert(d.ssrc)) {
            return Err(Error::NegotiationError(format!(
                "SSRC {} declared more than once",
                duplicate.ssrc
            )));
        }

        let mut bound = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let track = self.session.add_track(descriptor).await?;
            debug!(
                kind = %descriptor.kind,
                ssrc = descriptor.ssrc,
                payload_type = descriptor.payload_type,
                "Track registered"
            );
            bound.push(BoundTrack {
                descriptor: descriptor.clone(),
                track,
            });
        }

        let sdp = self.session.create_offer().await?;
        verify_offer(&sdp, descriptors)?;

        self.state = NegotiationState::OfferCreated;
        self.descriptors = descriptors.to_vec();
        info!(
            sections = descriptors.len(),
            ssrcs = ?descriptors.iter().map(|d| d.ssrc).collect::<Vec<_>>(),
            "Offer built"
        );

        Ok((SignalingMessage::offer(sdp), bound))
    }

    /// Apply the peer's answer
    ///
    /// # Errors
    ///
    /// * [`Error::ProtocolStateError`] - no offer outstanding, or an answer was
    ///   already applied; the state is left unchanged
    /// * [`Error::MalformedAnswer`] - the message is not an answer or has no SDP
    /// * [`Error::ApplyError`] - the session rejected the description
    pub async fn apply_answer(&mut self, message: &SignalingMessage) -> Result<()> {
        match self.state {
            NegotiationState::OfferCreated => {}
            NegotiationState::Answered => {
                return Err(Error::ProtocolStateError(
                    "answer already applied, renegotiation is not supported".to_string(),
                ));
            }
            NegotiationState::Idle => {
                return Err(Error::ProtocolStateError(
                    "answer received before an offer was built".to_string(),
                ));
            }
        }

        if !message.is_answer() {
            return Err(Error::MalformedAnswer(format!(
                "expected type \"answer\", got {:?}",
                message.sdp_type
            )));
        }
        if message.sdp.trim().is_empty() {
            return Err(Error::MalformedAnswer("empty sdp".to_string()));
        }

        if let Err(e) = self.session.apply_answer(message.sdp.clone()).await {
            warn!(error = %e, "Remote description rejected");
            return Err(match e {
                Error::ApplyError(_) => e,
                other => Error::ApplyError(other.to_string()),
            });
        }

        self.state = NegotiationState::Answered;
        info!("Answer applied");
        Ok(())
    }

    /// Descriptors the outstanding or applied offer was built from
    pub fn descriptors(&self) -> &[MediaDescriptor] {
        &self.descriptors
    }
}

fn verify_offer(sdp: &str, descriptors: &[MediaDescriptor]) -> Result<()> {
    let sections: Vec<_> = media_sections(sdp)
        .into_iter()
        .filter(|s| s.kind.is_some())
        .collect();

    if sections.len() != descriptors.len() {
        return Err(Error::NegotiationError(format!(
            "offer has {} media sections for {} descriptors",
            sections.len(),
            descriptors.len()
        )));
    }
    for (section, descriptor) in sections.iter().zip(descriptors) {
        if !section.is_bound_to(descriptor) {
            return Err(Error::NegotiationError(format!(
                "offer section for {} does not carry payload type {} and SSRC {}",
                descriptor.kind, descriptor.payload_type, descriptor.ssrc
            )));
        }
    }
    Ok(())
}
