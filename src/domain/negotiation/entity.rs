//! Negotiation entities - the values exchanged between endpoints

use crate::domain::negotiation::value_object::DescriptionKind;
use crate::domain::shared::value_objects::EndpointId;
use serde::{Deserialize, Serialize};

/// A session description produced by one endpoint for the other to apply.
///
/// Immutable once created; the payload is an opaque SDP-shaped blob as far
/// as the negotiation engine is concerned. Serializable because a real
/// signaling relay carries these across a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    kind: DescriptionKind,
    payload: String,
}

impl SessionDescription {
    pub fn new(kind: DescriptionKind, payload: String) -> Self {
        Self { kind, payload }
    }

    pub fn offer(payload: String) -> Self {
        Self::new(DescriptionKind::Offer, payload)
    }

    pub fn answer(payload: String) -> Self {
        Self::new(DescriptionKind::Answer, payload)
    }

    pub fn kind(&self) -> DescriptionKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }
}

/// A network path descriptor discovered by one endpoint's transport and
/// proposed to the other endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    origin: EndpointId,
    payload: String,
}

impl Candidate {
    pub fn new(origin: EndpointId, payload: String) -> Self {
        Self { origin, payload }
    }

    pub fn origin(&self) -> EndpointId {
        self.origin
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_accessors() {
        let offer = SessionDescription::offer("v=0\r\n".to_string());
        assert_eq!(offer.kind(), DescriptionKind::Offer);
        assert_eq!(offer.payload(), "v=0\r\n");
        assert_eq!(offer.size_bytes(), 6);
    }

    #[test]
    fn test_candidate_accessors() {
        let origin = EndpointId::new();
        let candidate = Candidate::new(origin, "candidate:1 1 UDP 1 192.0.2.1 9 typ host".to_string());
        assert_eq!(candidate.origin(), origin);
        assert!(candidate.payload().starts_with("candidate:"));
    }

    #[test]
    fn test_description_round_trips_through_serde() {
        let answer = SessionDescription::answer("v=0\r\ns=demo\r\n".to_string());
        let json = serde_json::to_string(&answer).unwrap();
        let back: SessionDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(back, answer);
    }
}
