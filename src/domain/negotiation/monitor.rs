//! Connectivity monitor
//!
//! Observes the connectivity each transport reports and republishes changes
//! as events. Connectivity is reported, never negotiated: nothing here
//! feeds back into the negotiation state machine.

use crate::domain::negotiation::event::{EventSink, NegotiationEvent, NegotiationEventKind};
use crate::domain::negotiation::transport::ConnectivityState;
use crate::domain::negotiation::value_object::EndpointRole;
use crate::domain::shared::value_objects::SessionId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Latest-value view of both endpoints' connectivity
pub struct ConnectivityMonitor {
    session_id: SessionId,
    initiator_rx: watch::Receiver<ConnectivityState>,
    responder_rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(
        session_id: SessionId,
        initiator_rx: watch::Receiver<ConnectivityState>,
        responder_rx: watch::Receiver<ConnectivityState>,
    ) -> Self {
        Self {
            session_id,
            initiator_rx,
            responder_rx,
        }
    }

    fn receiver(&self, role: EndpointRole) -> &watch::Receiver<ConnectivityState> {
        match role {
            EndpointRole::Initiator => &self.initiator_rx,
            EndpointRole::Responder => &self.responder_rx,
        }
    }

    /// Latest reported connectivity for one endpoint
    pub fn current(&self, role: EndpointRole) -> ConnectivityState {
        *self.receiver(role).borrow()
    }

    /// Both endpoints report a usable path
    pub fn both_usable(&self) -> bool {
        self.current(EndpointRole::Initiator).is_usable()
            && self.current(EndpointRole::Responder).is_usable()
    }

    /// Wait until one endpoint reports `target`, up to `timeout`.
    /// Returns false on timeout or if the transport went away first.
    pub async fn wait_for(
        &self,
        role: EndpointRole,
        target: ConnectivityState,
        timeout: Duration,
    ) -> bool {
        let mut rx = self.receiver(role).clone();
        let reached = async move {
            loop {
                if *rx.borrow_and_update() == target {
                    return true;
                }
                if rx.changed().await.is_err() {
                    return *rx.borrow() == target;
                }
            }
        };

        tokio::time::timeout(timeout, reached).await.unwrap_or(false)
    }

    /// Wait until both endpoints report a usable path
    pub async fn wait_both_usable(&self, timeout: Duration) -> bool {
        let (initiator, responder) = tokio::join!(
            self.wait_for(EndpointRole::Initiator, ConnectivityState::Connected, timeout),
            self.wait_for(EndpointRole::Responder, ConnectivityState::Connected, timeout),
        );
        initiator && responder
    }

    /// Forward every connectivity change to the sink until both transports
    /// drop their side of the signal
    pub fn spawn_observer(&self, sink: Arc<dyn EventSink>) -> JoinHandle<()> {
        let session_id = self.session_id;
        let mut initiator_rx = self.initiator_rx.clone();
        let mut responder_rx = self.responder_rx.clone();

        tokio::spawn(async move {
            let mut initiator_open = true;
            let mut responder_open = true;

            while initiator_open || responder_open {
                tokio::select! {
                    changed = initiator_rx.changed(), if initiator_open => match changed {
                        Ok(()) => {
                            let state = *initiator_rx.borrow_and_update();
                            debug!("Connectivity changed: initiator -> {}", state);
                            sink.record(
                                NegotiationEvent::new(
                                    session_id,
                                    NegotiationEventKind::ConnectivityChanged { state },
                                )
                                .with_role(EndpointRole::Initiator),
                            )
                            .await;
                        }
                        Err(_) => initiator_open = false,
                    },
                    changed = responder_rx.changed(), if responder_open => match changed {
                        Ok(()) => {
                            let state = *responder_rx.borrow_and_update();
                            debug!("Connectivity changed: responder -> {}", state);
                            sink.record(
                                NegotiationEvent::new(
                                    session_id,
                                    NegotiationEventKind::ConnectivityChanged { state },
                                )
                                .with_role(EndpointRole::Responder),
                            )
                            .await;
                        }
                        Err(_) => responder_open = false,
                    },
                }
            }
        })
    }
}
