//! Domain errors

use crate::domain::negotiation::value_object::{DescriptionKind, EndpointRole, HandshakeStep, NegotiationState};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What the transport was asked to apply when it refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyTarget {
    Description,
    Candidate,
}

impl fmt::Display for ApplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyTarget::Description => write!(f, "description"),
            ApplyTarget::Candidate => write!(f, "candidate"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum NegotiationError {
    /// Operation attempted by an endpoint whose role does not permit it
    #[error("{action} is not available to the {role} role")]
    Role {
        action: &'static str,
        role: EndpointRole,
    },

    /// Operation attempted in a state that does not permit it
    #[error("{action} is not legal in the {state} state")]
    InvalidState {
        action: &'static str,
        state: NegotiationState,
    },

    /// Remote description kind conflicts with the current state
    #[error("a remote {kind} cannot be applied in the {state} state")]
    DescriptionMismatch {
        kind: DescriptionKind,
        state: NegotiationState,
    },

    /// The external transport refused a description or candidate.
    /// Recoverable: a candidate failure is isolated to that candidate,
    /// a description failure aborts only the step that attempted it.
    #[error("transport rejected {target}: {reason}")]
    TransportApply { target: ApplyTarget, reason: String },

    /// A handshake step failed; wraps the step's own error
    #[error("handshake failed at {step}: {source}")]
    HandshakeFailed {
        step: HandshakeStep,
        #[source]
        source: Box<NegotiationError>,
    },
}

impl NegotiationError {
    pub fn transport_description(reason: impl Into<String>) -> Self {
        NegotiationError::TransportApply {
            target: ApplyTarget::Description,
            reason: reason.into(),
        }
    }

    pub fn transport_candidate(reason: impl Into<String>) -> Self {
        NegotiationError::TransportApply {
            target: ApplyTarget::Candidate,
            reason: reason.into(),
        }
    }

    pub fn at_step(self, step: HandshakeStep) -> Self {
        NegotiationError::HandshakeFailed {
            step,
            source: Box::new(self),
        }
    }
}
