//! Negotiation value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed role of an endpoint within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    /// Produces the offer and applies the answer
    Initiator,
    /// Applies the offer and produces the answer
    Responder,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Initiator => "initiator",
            EndpointRole::Responder => "responder",
        }
    }

    /// The role on the other side of the session
    pub fn peer(&self) -> EndpointRole {
        match self {
            EndpointRole::Initiator => EndpointRole::Responder,
            EndpointRole::Responder => EndpointRole::Initiator,
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of a session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionKind {
    Offer,
    Answer,
}

impl DescriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionKind::Offer => "offer",
            DescriptionKind::Answer => "answer",
        }
    }
}

impl fmt::Display for DescriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four steps of the offer/answer handshake, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStep {
    CreateOffer,
    ApplyOffer,
    CreateAnswer,
    ApplyAnswer,
}

impl HandshakeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStep::CreateOffer => "create-offer",
            HandshakeStep::ApplyOffer => "apply-offer",
            HandshakeStep::CreateAnswer => "create-answer",
            HandshakeStep::ApplyAnswer => "apply-answer",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Negotiation state of a single endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// No descriptions exchanged
    Idle,
    /// Local offer produced, waiting for the remote answer
    HaveLocalOffer,
    /// Remote offer applied, an answer has yet to be produced
    HaveRemoteOffer,
    /// Both descriptions in place, negotiation complete
    Stable,
}

impl NegotiationState {
    /// Check if a state transition is valid
    pub fn can_transition_to(&self, new_state: &NegotiationState) -> bool {
        use NegotiationState::*;

        match (self, new_state) {
            // Initiator path
            (Idle, HaveLocalOffer) => true,
            (HaveLocalOffer, Stable) => true,

            // Responder path
            (Idle, HaveRemoteOffer) => true,
            (HaveRemoteOffer, Stable) => true,

            // Reset is legal from anywhere
            (_, Idle) => true,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Which remote description kind this state accepts, if any
    pub fn expected_description_kind(&self) -> Option<DescriptionKind> {
        match self {
            NegotiationState::Idle => Some(DescriptionKind::Offer),
            NegotiationState::HaveLocalOffer => Some(DescriptionKind::Answer),
            NegotiationState::HaveRemoteOffer | NegotiationState::Stable => None,
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, NegotiationState::Stable)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NegotiationState::Idle => "idle",
            NegotiationState::HaveLocalOffer => "have-local-offer",
            NegotiationState::HaveRemoteOffer => "have-remote-offer",
            NegotiationState::Stable => "stable",
        }
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
