//! Session - one call lifecycle pairing exactly two endpoints

use crate::domain::negotiation::endpoint::Endpoint;
use crate::domain::negotiation::event::NegotiationEvent;
use crate::domain::negotiation::value_object::{EndpointRole, NegotiationState};
use crate::domain::shared::error::NegotiationError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::SessionId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A session owns its two endpoints for one complete call lifecycle.
///
/// Each endpoint sits behind its own async mutex: every operation locks the
/// endpoint for its full duration, so at most one mutation per endpoint is
/// in flight at a time and completions come back in issue order.
pub struct Session {
    id: SessionId,
    initiator: Arc<Mutex<Endpoint>>,
    responder: Arc<Mutex<Endpoint>>,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Pair two endpoints into a session. The first must hold the initiator
    /// role and the second the responder role; both must have been created
    /// with the same session id.
    pub fn pair(initiator: Endpoint, responder: Endpoint) -> Result<Self> {
        if initiator.role() != EndpointRole::Initiator {
            return Err(NegotiationError::Role {
                action: "pair_session",
                role: initiator.role(),
            });
        }
        if responder.role() != EndpointRole::Responder {
            return Err(NegotiationError::Role {
                action: "pair_session",
                role: responder.role(),
            });
        }

        let id = initiator.session_id();

        Ok(Self {
            id,
            initiator: Arc::new(Mutex::new(initiator)),
            responder: Arc::new(Mutex::new(responder)),
            started_at: Utc::now(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> &DateTime<Utc> {
        &self.started_at
    }

    pub fn initiator(&self) -> Arc<Mutex<Endpoint>> {
        Arc::clone(&self.initiator)
    }

    pub fn responder(&self) -> Arc<Mutex<Endpoint>> {
        Arc::clone(&self.responder)
    }

    pub fn endpoint(&self, role: EndpointRole) -> Arc<Mutex<Endpoint>> {
        match role {
            EndpointRole::Initiator => self.initiator(),
            EndpointRole::Responder => self.responder(),
        }
    }

    /// Snapshot both negotiation states (initiator first)
    pub async fn states(&self) -> (NegotiationState, NegotiationState) {
        let initiator = self.initiator.lock().await.state();
        let responder = self.responder.lock().await.state();
        (initiator, responder)
    }

    /// Reset both endpoints back to idle, returning whatever events they
    /// had pending (including the resets themselves)
    pub async fn reset_both(&self) -> Vec<NegotiationEvent> {
        let mut events = Vec::new();

        let mut initiator = self.initiator.lock().await;
        initiator.reset().await;
        events.extend(initiator.take_events());
        drop(initiator);

        let mut responder = self.responder.lock().await;
        responder.reset().await;
        events.extend(responder.take_events());

        events
    }
}
