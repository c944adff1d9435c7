//! Negotiation events and the observability sink port

use crate::domain::negotiation::transport::ConnectivityState;
use crate::domain::negotiation::value_object::{DescriptionKind, EndpointRole, HandshakeStep};
use crate::domain::shared::value_objects::{EndpointId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Things that happen during a negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NegotiationEventKind {
    /// Session wiring complete, candidate relay running
    SessionStarted {
        initiator: EndpointId,
        responder: EndpointId,
    },

    /// Local description produced and installed
    OfferCreated { size_bytes: usize },
    AnswerCreated { size_bytes: usize },

    /// Remote description applied; counts cover the buffer drain it triggered
    DescriptionApplied {
        kind: DescriptionKind,
        drained: usize,
        drain_failures: usize,
    },

    /// Candidate lifecycle on the receiving endpoint
    CandidateBuffered { origin: EndpointId },
    CandidateApplied { origin: EndpointId },
    CandidateRejected { origin: EndpointId, reason: String },

    /// Handshake progress as driven by the coordinator
    StepCompleted {
        step: HandshakeStep,
        elapsed_ms: u64,
        size_bytes: Option<usize>,
    },
    HandshakeCompleted { elapsed_ms: u64 },
    HandshakeFailed { step: HandshakeStep, reason: String },

    /// Reported by the connectivity monitor, never negotiated
    ConnectivityChanged { state: ConnectivityState },

    EndpointReset,
    SessionClosed,
}

impl NegotiationEventKind {
    /// True for kinds a sink should surface at warning severity
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NegotiationEventKind::CandidateRejected { .. }
                | NegotiationEventKind::HandshakeFailed { .. }
                | NegotiationEventKind::ConnectivityChanged {
                    state: ConnectivityState::Failed,
                }
        )
    }
}

/// Event record handed to the observability sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub session_id: SessionId,
    /// Which endpoint the event concerns; None for session-level events
    pub role: Option<EndpointRole>,
    pub kind: NegotiationEventKind,
}

impl NegotiationEvent {
    pub fn new(session_id: SessionId, kind: NegotiationEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            session_id,
            role: None,
            kind,
        }
    }

    pub fn with_role(mut self, role: EndpointRole) -> Self {
        self.role = Some(role);
        self
    }
}

/// Observability sink port
///
/// The engine emits structured events through this; what happens to them
/// (logging, storage, forwarding) is the sink's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn record(&self, event: NegotiationEvent);
}
