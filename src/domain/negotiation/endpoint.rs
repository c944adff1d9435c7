//! Endpoint aggregate root
//!
//! One side of a negotiation: its role, its state machine, its candidate
//! buffer and its handle to the externally supplied transport capability.
//! All mutations validate before they touch the transport, and the state
//! only advances after the transport has accepted the change.

use crate::domain::negotiation::buffer::{CandidateBuffer, DrainReport};
use crate::domain::negotiation::entity::{Candidate, SessionDescription};
use crate::domain::negotiation::event::{NegotiationEvent, NegotiationEventKind};
use crate::domain::negotiation::transport::{ConnectivityState, TransportCapability, TransportHints};
use crate::domain::negotiation::value_object::{DescriptionKind, EndpointRole, NegotiationState};
use crate::domain::shared::error::{ApplyTarget, NegotiationError};
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{EndpointId, SessionId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

const NO_TRANSPORT: &str = "no transport capability attached";

/// What became of a candidate handed to `add_remote_candidate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateDisposition {
    /// Held back until a remote description is applied
    Buffered,
    /// Applied through the transport immediately
    Applied,
}

/// Endpoint aggregate root
pub struct Endpoint {
    id: EndpointId,
    session_id: SessionId,
    role: EndpointRole,
    state: NegotiationState,
    buffer: CandidateBuffer,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    transport: Option<Arc<dyn TransportCapability>>,
    /// Pending domain events
    events: Vec<NegotiationEvent>,
}

impl Endpoint {
    /// Create a new endpoint bound to a session, with its transport attached
    pub fn new(
        id: EndpointId,
        session_id: SessionId,
        role: EndpointRole,
        transport: Arc<dyn TransportCapability>,
    ) -> Self {
        Self {
            id,
            session_id,
            role,
            state: NegotiationState::Idle,
            buffer: CandidateBuffer::new(),
            local_description: None,
            remote_description: None,
            transport: Some(transport),
            events: Vec::new(),
        }
    }

    /// Produce and install the local offer. Initiator only, idle only.
    pub async fn create_offer(&mut self, hints: &TransportHints) -> Result<SessionDescription> {
        if self.role != EndpointRole::Initiator {
            return Err(NegotiationError::Role {
                action: "create_offer",
                role: self.role,
            });
        }
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::InvalidState {
                action: "create_offer",
                state: self.state,
            });
        }

        let transport = self.require_transport(ApplyTarget::Description)?;
        let offer = transport
            .generate_local_description(DescriptionKind::Offer, hints)
            .await?;

        self.local_description = Some(offer.clone());
        self.transition_to("create_offer", NegotiationState::HaveLocalOffer)?;
        self.record_event(NegotiationEventKind::OfferCreated {
            size_bytes: offer.size_bytes(),
        });

        info!("Endpoint {} created offer ({} bytes)", self.id, offer.size_bytes());
        Ok(offer)
    }

    /// Apply a description received from the peer, then drain any buffered
    /// candidates in arrival order. A transport refusal aborts the step with
    /// no state change; per-candidate drain failures are collected in the
    /// report and do not poison the session.
    pub async fn apply_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<DrainReport> {
        let kind = description.kind();

        match self.state.expected_description_kind() {
            None => {
                return Err(NegotiationError::InvalidState {
                    action: "apply_remote_description",
                    state: self.state,
                });
            }
            Some(expected) if expected != kind => {
                return Err(NegotiationError::DescriptionMismatch {
                    kind,
                    state: self.state,
                });
            }
            Some(_) => {}
        }

        // Roles are fixed: only a responder applies an offer, only an
        // initiator applies an answer.
        let required_role = match kind {
            DescriptionKind::Offer => EndpointRole::Responder,
            DescriptionKind::Answer => EndpointRole::Initiator,
        };
        if self.role != required_role {
            return Err(NegotiationError::Role {
                action: match kind {
                    DescriptionKind::Offer => "apply_remote_offer",
                    DescriptionKind::Answer => "apply_remote_answer",
                },
                role: self.role,
            });
        }

        let transport = self.require_transport(ApplyTarget::Description)?;
        transport.apply_description(&description).await?;

        self.remote_description = Some(description);
        let next = match kind {
            DescriptionKind::Offer => NegotiationState::HaveRemoteOffer,
            DescriptionKind::Answer => NegotiationState::Stable,
        };
        self.transition_to("apply_remote_description", next)?;

        let report = self
            .buffer
            .drain_into(|candidate| {
                let transport = Arc::clone(&transport);
                async move { transport.apply_candidate(&candidate).await }
            })
            .await;

        self.record_event(NegotiationEventKind::DescriptionApplied {
            kind,
            drained: report.applied,
            drain_failures: report.failures.len(),
        });
        for failure in &report.failures {
            self.record_event(NegotiationEventKind::CandidateRejected {
                origin: failure.candidate.origin(),
                reason: failure.error.to_string(),
            });
        }

        info!(
            "Endpoint {} applied remote {} (drained {} buffered candidates, {} failures)",
            self.id,
            kind,
            report.applied,
            report.failures.len()
        );
        Ok(report)
    }

    /// Produce and install the local answer. Responder only, after the
    /// remote offer has been applied.
    pub async fn create_answer(&mut self, hints: &TransportHints) -> Result<SessionDescription> {
        if self.role != EndpointRole::Responder {
            return Err(NegotiationError::Role {
                action: "create_answer",
                role: self.role,
            });
        }
        if self.state != NegotiationState::HaveRemoteOffer {
            return Err(NegotiationError::InvalidState {
                action: "create_answer",
                state: self.state,
            });
        }

        let transport = self.require_transport(ApplyTarget::Description)?;
        let answer = transport
            .generate_local_description(DescriptionKind::Answer, hints)
            .await?;

        self.local_description = Some(answer.clone());
        self.transition_to("create_answer", NegotiationState::Stable)?;
        self.record_event(NegotiationEventKind::AnswerCreated {
            size_bytes: answer.size_bytes(),
        });

        info!("Endpoint {} created answer ({} bytes)", self.id, answer.size_bytes());
        Ok(answer)
    }

    /// Accept a candidate relayed from the peer. Buffered while no remote
    /// description is in place, applied through the transport otherwise.
    pub async fn add_remote_candidate(
        &mut self,
        candidate: Candidate,
    ) -> Result<CandidateDisposition> {
        if self.remote_description.is_none() {
            debug!(
                "Endpoint {} buffering candidate from {} (no remote description yet)",
                self.id,
                candidate.origin()
            );
            self.record_event(NegotiationEventKind::CandidateBuffered {
                origin: candidate.origin(),
            });
            self.buffer.enqueue(candidate);
            return Ok(CandidateDisposition::Buffered);
        }

        let transport = self.require_transport(ApplyTarget::Candidate)?;
        match transport.apply_candidate(&candidate).await {
            Ok(()) => {
                debug!(
                    "Endpoint {} applied candidate from {}",
                    self.id,
                    candidate.origin()
                );
                self.record_event(NegotiationEventKind::CandidateApplied {
                    origin: candidate.origin(),
                });
                Ok(CandidateDisposition::Applied)
            }
            Err(error) => {
                self.record_event(NegotiationEventKind::CandidateRejected {
                    origin: candidate.origin(),
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Return to idle: discard both descriptions and the buffer, close and
    /// release the transport. Safe to call at any point; a second reset in
    /// a row is a no-op.
    pub async fn reset(&mut self) {
        let had_anything = self.transport.is_some()
            || self.state != NegotiationState::Idle
            || self.local_description.is_some()
            || self.remote_description.is_some()
            || !self.buffer.is_empty();

        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }

        self.state = NegotiationState::Idle;
        self.local_description = None;
        self.remote_description = None;
        self.buffer.clear();

        if had_anything {
            self.record_event(NegotiationEventKind::EndpointReset);
            info!("Endpoint {} reset to idle", self.id);
        }
    }

    /// Arm a reset endpoint with a fresh transport for the next session.
    /// Only legal in the idle state; a still-attached handle is closed first.
    pub async fn attach_transport(
        &mut self,
        transport: Arc<dyn TransportCapability>,
    ) -> Result<()> {
        if self.state != NegotiationState::Idle {
            return Err(NegotiationError::InvalidState {
                action: "attach_transport",
                state: self.state,
            });
        }

        if let Some(previous) = self.transport.take() {
            previous.close().await;
        }
        self.transport = Some(transport);
        Ok(())
    }

    /// Take the transport's stream of locally discovered candidates
    pub async fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<Candidate>> {
        match &self.transport {
            Some(transport) => transport.take_local_candidates().await,
            None => None,
        }
    }

    /// The transport's connectivity signal, if a transport is attached
    pub fn connectivity(&self) -> Option<watch::Receiver<ConnectivityState>> {
        self.transport.as_ref().map(|t| t.connectivity())
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<NegotiationEvent> {
        std::mem::take(&mut self.events)
    }

    /// Transition to a new state
    fn transition_to(&mut self, action: &'static str, new_state: NegotiationState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(NegotiationError::InvalidState {
                action,
                state: self.state,
            });
        }

        self.state = new_state;
        Ok(())
    }

    fn record_event(&mut self, kind: NegotiationEventKind) {
        self.events
            .push(NegotiationEvent::new(self.session_id, kind).with_role(self.role));
    }

    fn require_transport(&self, target: ApplyTarget) -> Result<Arc<dyn TransportCapability>> {
        self.transport
            .clone()
            .ok_or(NegotiationError::TransportApply {
                target,
                reason: NO_TRANSPORT.to_string(),
            })
    }

    // Getters
    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn role(&self) -> EndpointRole {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn local_description(&self) -> Option<&SessionDescription> {
        self.local_description.as_ref()
    }

    pub fn remote_description(&self) -> Option<&SessionDescription> {
        self.remote_description.as_ref()
    }

    pub fn buffered_candidates(&self) -> usize {
        self.buffer.len()
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::negotiation::transport::MockTransportCapability;
    use mockall::Sequence;

    fn offer_text() -> String {
        "v=0\r\no=- 1 1 IN IP4 192.0.2.1\r\n".to_string()
    }

    fn answer_text() -> String {
        "v=0\r\no=- 2 1 IN IP4 192.0.2.2\r\n".to_string()
    }

    fn endpoint_with(role: EndpointRole, mock: MockTransportCapability) -> Endpoint {
        Endpoint::new(EndpointId::new(), SessionId::new(), role, Arc::new(mock))
    }

    #[tokio::test]
    async fn test_create_offer_requires_initiator_role() {
        let mut endpoint = endpoint_with(EndpointRole::Responder, MockTransportCapability::new());

        let err = endpoint
            .create_offer(&TransportHints::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Role {
                action: "create_offer",
                role: EndpointRole::Responder,
            }
        ));
        assert_eq!(endpoint.state(), NegotiationState::Idle);
    }

    #[tokio::test]
    async fn test_create_offer_transitions_and_records_event() {
        let mut mock = MockTransportCapability::new();
        mock.expect_generate_local_description()
            .withf(|kind, _| *kind == DescriptionKind::Offer)
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);

        let offer = endpoint.create_offer(&TransportHints::default()).await.unwrap();
        assert_eq!(offer.kind(), DescriptionKind::Offer);
        assert_eq!(endpoint.state(), NegotiationState::HaveLocalOffer);
        assert!(endpoint.local_description().is_some());

        let events = endpoint.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            NegotiationEventKind::OfferCreated { .. }
        ));
        assert_eq!(events[0].role, Some(EndpointRole::Initiator));
    }

    #[tokio::test]
    async fn test_second_create_offer_is_a_state_error() {
        let mut mock = MockTransportCapability::new();
        mock.expect_generate_local_description()
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);

        endpoint.create_offer(&TransportHints::default()).await.unwrap();
        let err = endpoint
            .create_offer(&TransportHints::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::InvalidState {
                action: "create_offer",
                state: NegotiationState::HaveLocalOffer,
            }
        ));
    }

    #[tokio::test]
    async fn test_answer_in_idle_is_a_description_mismatch() {
        let mut endpoint = endpoint_with(EndpointRole::Initiator, MockTransportCapability::new());

        let err = endpoint
            .apply_remote_description(SessionDescription::answer(answer_text()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::DescriptionMismatch {
                kind: DescriptionKind::Answer,
                state: NegotiationState::Idle,
            }
        ));
    }

    #[tokio::test]
    async fn test_applying_an_offer_requires_responder_role() {
        let mut endpoint = endpoint_with(EndpointRole::Initiator, MockTransportCapability::new());

        let err = endpoint
            .apply_remote_description(SessionDescription::offer(offer_text()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Role {
                action: "apply_remote_offer",
                role: EndpointRole::Initiator,
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_rejection_leaves_state_unchanged() {
        let mut mock = MockTransportCapability::new();
        mock.expect_generate_local_description()
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        mock.expect_apply_description()
            .times(1)
            .returning(|_| Err(NegotiationError::transport_description("refused by transport")));
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);

        endpoint.create_offer(&TransportHints::default()).await.unwrap();
        let err = endpoint
            .apply_remote_description(SessionDescription::answer(answer_text()))
            .await
            .unwrap_err();

        assert!(matches!(err, NegotiationError::TransportApply { .. }));
        assert_eq!(endpoint.state(), NegotiationState::HaveLocalOffer);
        assert!(endpoint.remote_description().is_none());
    }

    #[tokio::test]
    async fn test_candidates_buffer_then_drain_in_order() {
        let origin = EndpointId::new();
        let mut seq = Sequence::new();
        let mut mock = MockTransportCapability::new();
        mock.expect_apply_description()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_apply_candidate()
            .withf(|c| c.payload() == "candidate-0")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_apply_candidate()
            .withf(|c| c.payload() == "candidate-1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut endpoint = endpoint_with(EndpointRole::Responder, mock);

        for i in 0..2 {
            let disposition = endpoint
                .add_remote_candidate(Candidate::new(origin, format!("candidate-{}", i)))
                .await
                .unwrap();
            assert_eq!(disposition, CandidateDisposition::Buffered);
        }
        assert_eq!(endpoint.buffered_candidates(), 2);

        let report = endpoint
            .apply_remote_description(SessionDescription::offer(offer_text()))
            .await
            .unwrap();

        assert_eq!(report.applied, 2);
        assert!(report.is_clean());
        assert_eq!(endpoint.buffered_candidates(), 0);
        assert_eq!(endpoint.state(), NegotiationState::HaveRemoteOffer);
    }

    #[tokio::test]
    async fn test_candidate_applies_directly_once_remote_description_exists() {
        let origin = EndpointId::new();
        let mut mock = MockTransportCapability::new();
        mock.expect_apply_description().times(1).returning(|_| Ok(()));
        mock.expect_apply_candidate().times(1).returning(|_| Ok(()));
        let mut endpoint = endpoint_with(EndpointRole::Responder, mock);

        endpoint
            .apply_remote_description(SessionDescription::offer(offer_text()))
            .await
            .unwrap();

        let disposition = endpoint
            .add_remote_candidate(Candidate::new(origin, "candidate-9".to_string()))
            .await
            .unwrap();
        assert_eq!(disposition, CandidateDisposition::Applied);
        assert_eq!(endpoint.buffered_candidates(), 0);
    }

    #[tokio::test]
    async fn test_drain_failures_are_reported_not_fatal() {
        let origin = EndpointId::new();
        let mut mock = MockTransportCapability::new();
        mock.expect_apply_description().times(1).returning(|_| Ok(()));
        mock.expect_apply_candidate()
            .times(2)
            .returning(|_| Err(NegotiationError::transport_candidate("refused")));
        let mut endpoint = endpoint_with(EndpointRole::Responder, mock);

        for i in 0..2 {
            endpoint
                .add_remote_candidate(Candidate::new(origin, format!("candidate-{}", i)))
                .await
                .unwrap();
        }

        let report = endpoint
            .apply_remote_description(SessionDescription::offer(offer_text()))
            .await
            .unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.failures.len(), 2);
        // The step itself still succeeded
        assert_eq!(endpoint.state(), NegotiationState::HaveRemoteOffer);

        let events = endpoint.take_events();
        let rejected = events
            .iter()
            .filter(|e| matches!(e.kind, NegotiationEventKind::CandidateRejected { .. }))
            .count();
        assert_eq!(rejected, 2);
    }

    #[tokio::test]
    async fn test_reset_closes_transport_and_is_idempotent() {
        let mut mock = MockTransportCapability::new();
        mock.expect_generate_local_description()
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        mock.expect_close().times(1).return_const(());
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);

        endpoint.create_offer(&TransportHints::default()).await.unwrap();
        endpoint.reset().await;

        assert_eq!(endpoint.state(), NegotiationState::Idle);
        assert!(endpoint.local_description().is_none());
        assert!(endpoint.remote_description().is_none());
        assert!(!endpoint.has_transport());

        let events = endpoint.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.kind, NegotiationEventKind::EndpointReset)));

        // Second reset records nothing and does not error
        endpoint.reset().await;
        assert!(endpoint.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_operations_without_transport_fail_as_transport_apply() {
        let mut mock = MockTransportCapability::new();
        mock.expect_close().times(1).return_const(());
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);
        endpoint.reset().await;

        let err = endpoint
            .create_offer(&TransportHints::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NegotiationError::TransportApply { .. }));
    }

    #[tokio::test]
    async fn test_attach_transport_rearms_after_reset() {
        let mut first = MockTransportCapability::new();
        first.expect_close().times(1).return_const(());
        let mut endpoint = endpoint_with(EndpointRole::Initiator, first);
        endpoint.reset().await;

        let mut second = MockTransportCapability::new();
        second
            .expect_generate_local_description()
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        endpoint.attach_transport(Arc::new(second)).await.unwrap();

        endpoint.create_offer(&TransportHints::default()).await.unwrap();
        assert_eq!(endpoint.state(), NegotiationState::HaveLocalOffer);
    }

    #[tokio::test]
    async fn test_attach_transport_outside_idle_is_rejected() {
        let mut mock = MockTransportCapability::new();
        mock.expect_generate_local_description()
            .times(1)
            .returning(|_, _| Ok(SessionDescription::offer(offer_text())));
        let mut endpoint = endpoint_with(EndpointRole::Initiator, mock);
        endpoint.create_offer(&TransportHints::default()).await.unwrap();

        let err = endpoint
            .attach_transport(Arc::new(MockTransportCapability::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::InvalidState {
                action: "attach_transport",
                ..
            }
        ));
    }
}
