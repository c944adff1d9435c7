//! Negotiation coordinator
//!
//! Drives one session through the four-step offer/answer handshake and
//! relays discovered candidates between the two endpoints for the lifetime
//! of the session. Candidate relay is independent of handshake progress:
//! it starts before the first step and keeps running after the last.

use crate::domain::negotiation::endpoint::Endpoint;
use crate::domain::negotiation::entity::{Candidate, SessionDescription};
use crate::domain::negotiation::event::{EventSink, NegotiationEvent, NegotiationEventKind};
use crate::domain::negotiation::monitor::ConnectivityMonitor;
use crate::domain::negotiation::session::Session;
use crate::domain::negotiation::transport::TransportHints;
use crate::domain::negotiation::value_object::{DescriptionKind, EndpointRole, HandshakeStep};
use crate::domain::shared::error::NegotiationError;
use crate::domain::shared::result::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Coordinates the handshake and candidate relay for one session
pub struct NegotiationCoordinator {
    session: Session,
    sink: Arc<dyn EventSink>,
    hints: TransportHints,
    monitor: Option<ConnectivityMonitor>,
    relay_tasks: Vec<JoinHandle<()>>,
    observer_task: Option<JoinHandle<()>>,
    closed: bool,
}

impl NegotiationCoordinator {
    pub fn new(session: Session, sink: Arc<dyn EventSink>) -> Self {
        Self {
            session,
            sink,
            hints: TransportHints::default(),
            monitor: None,
            relay_tasks: Vec::new(),
            observer_task: None,
            closed: false,
        }
    }

    /// Hints passed to both endpoints when they produce descriptions
    pub fn with_hints(mut self, hints: TransportHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn monitor(&self) -> Option<&ConnectivityMonitor> {
        self.monitor.as_ref()
    }

    /// Wire the session: take both candidate streams and spawn one relay
    /// task per direction, plus the connectivity observer. Idempotent.
    pub async fn start(&mut self) -> Result<()> {
        if self.monitor.is_some() {
            return Ok(());
        }
        self.closed = false;

        let initiator = self.session.initiator();
        let responder = self.session.responder();

        let (initiator_id, initiator_candidates, initiator_conn) = {
            let endpoint = initiator.lock().await;
            (
                endpoint.id(),
                endpoint.take_local_candidates().await,
                endpoint.connectivity(),
            )
        };
        let (responder_id, responder_candidates, responder_conn) = {
            let endpoint = responder.lock().await;
            (
                endpoint.id(),
                endpoint.take_local_candidates().await,
                endpoint.connectivity(),
            )
        };

        let initiator_candidates = initiator_candidates.ok_or_else(|| {
            NegotiationError::transport_candidate("initiator candidate stream unavailable")
        })?;
        let responder_candidates = responder_candidates.ok_or_else(|| {
            NegotiationError::transport_candidate("responder candidate stream unavailable")
        })?;
        let initiator_conn = initiator_conn.ok_or_else(|| {
            NegotiationError::transport_description("no transport capability attached")
        })?;
        let responder_conn = responder_conn.ok_or_else(|| {
            NegotiationError::transport_description("no transport capability attached")
        })?;

        let monitor =
            ConnectivityMonitor::new(self.session.id(), initiator_conn, responder_conn);
        self.observer_task = Some(monitor.spawn_observer(Arc::clone(&self.sink)));
        self.monitor = Some(monitor);

        // Candidates discovered by one side are delivered to the other.
        self.relay_tasks.push(Self::spawn_relay(
            initiator_candidates,
            Arc::clone(&responder),
            Arc::clone(&self.sink),
        ));
        self.relay_tasks.push(Self::spawn_relay(
            responder_candidates,
            Arc::clone(&initiator),
            Arc::clone(&self.sink),
        ));

        self.emit(
            NegotiationEventKind::SessionStarted {
                initiator: initiator_id,
                responder: responder_id,
            },
            None,
        )
        .await;

        info!(
            "Session {} started: candidate relay running between {} and {}",
            self.session.id(),
            initiator_id,
            responder_id
        );
        Ok(())
    }

    /// Run the four handshake steps in order. The first failing step aborts
    /// the handshake with a `HandshakeFailed` wrapping its error; partial
    /// state is left as-is for the caller to inspect or reset.
    pub async fn run_handshake(&mut self) -> Result<()> {
        let handshake_started = Instant::now();
        info!("Running offer/answer handshake for session {}", self.session.id());

        let offer = self.step_create(DescriptionKind::Offer).await?;
        self.step_apply(offer).await?;
        let answer = self.step_create(DescriptionKind::Answer).await?;
        self.step_apply(answer).await?;

        let elapsed_ms = handshake_started.elapsed().as_millis() as u64;
        self.emit(NegotiationEventKind::HandshakeCompleted { elapsed_ms }, None)
            .await;
        info!(
            "Handshake for session {} complete in {}ms",
            self.session.id(),
            elapsed_ms
        );
        Ok(())
    }

    /// Wait until both transports report a usable path. False until
    /// `start()` has run.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        match &self.monitor {
            Some(monitor) => monitor.wait_both_usable(timeout).await,
            None => false,
        }
    }

    /// Hang up: stop the relay and observer tasks first so deliveries from
    /// this session die with them, then reset both endpoints. Idempotent.
    pub async fn teardown(&mut self) {
        for task in self.relay_tasks.drain(..) {
            task.abort();
        }
        if let Some(task) = self.observer_task.take() {
            task.abort();
        }
        self.monitor = None;

        let events = self.session.reset_both().await;
        self.forward(events).await;

        if !self.closed {
            self.closed = true;
            self.emit(NegotiationEventKind::SessionClosed, None).await;
            info!("Session {} closed", self.session.id());
        }
    }

    async fn step_create(&self, kind: DescriptionKind) -> Result<SessionDescription> {
        let (role, step) = match kind {
            DescriptionKind::Offer => (EndpointRole::Initiator, HandshakeStep::CreateOffer),
            DescriptionKind::Answer => (EndpointRole::Responder, HandshakeStep::CreateAnswer),
        };
        let started = Instant::now();

        let endpoint = self.session.endpoint(role);
        let mut guard = endpoint.lock().await;
        let result = match kind {
            DescriptionKind::Offer => guard.create_offer(&self.hints).await,
            DescriptionKind::Answer => guard.create_answer(&self.hints).await,
        };
        let events = guard.take_events();
        drop(guard);
        self.forward(events).await;

        match result {
            Ok(description) => {
                self.emit(
                    NegotiationEventKind::StepCompleted {
                        step,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        size_bytes: Some(description.size_bytes()),
                    },
                    Some(role),
                )
                .await;
                Ok(description)
            }
            Err(error) => Err(self.fail_step(step, error).await),
        }
    }

    async fn step_apply(&self, description: SessionDescription) -> Result<()> {
        let (role, step) = match description.kind() {
            DescriptionKind::Offer => (EndpointRole::Responder, HandshakeStep::ApplyOffer),
            DescriptionKind::Answer => (EndpointRole::Initiator, HandshakeStep::ApplyAnswer),
        };
        let size_bytes = description.size_bytes();
        let started = Instant::now();

        let endpoint = self.session.endpoint(role);
        let mut guard = endpoint.lock().await;
        let result = guard.apply_remote_description(description).await;
        let events = guard.take_events();
        drop(guard);
        self.forward(events).await;

        match result {
            Ok(report) => {
                if !report.is_clean() {
                    warn!(
                        "Session {}: {} of {} buffered candidates were rejected during {}",
                        self.session.id(),
                        report.failures.len(),
                        report.attempted(),
                        step
                    );
                }
                self.emit(
                    NegotiationEventKind::StepCompleted {
                        step,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        size_bytes: Some(size_bytes),
                    },
                    Some(role),
                )
                .await;
                Ok(())
            }
            Err(error) => Err(self.fail_step(step, error).await),
        }
    }

    async fn fail_step(&self, step: HandshakeStep, error: NegotiationError) -> NegotiationError {
        warn!(
            "Session {}: handshake step {} failed: {}",
            self.session.id(),
            step,
            error
        );
        self.emit(
            NegotiationEventKind::HandshakeFailed {
                step,
                reason: error.to_string(),
            },
            None,
        )
        .await;
        error.at_step(step)
    }

    fn spawn_relay(
        mut candidates: mpsc::UnboundedReceiver<Candidate>,
        target: Arc<Mutex<Endpoint>>,
        sink: Arc<dyn EventSink>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(candidate) = candidates.recv().await {
                let mut endpoint = target.lock().await;
                // A refused candidate is reported and the relay moves on.
                if let Err(error) = endpoint.add_remote_candidate(candidate).await {
                    warn!("Candidate relay: {}", error);
                }
                let events = endpoint.take_events();
                drop(endpoint);
                for event in events {
                    sink.record(event).await;
                }
            }
        })
    }

    async fn emit(&self, kind: NegotiationEventKind, role: Option<EndpointRole>) {
        let mut event = NegotiationEvent::new(self.session.id(), kind);
        if let Some(role) = role {
            event = event.with_role(role);
        }
        self.sink.record(event).await;
    }

    async fn forward(&self, events: Vec<NegotiationEvent>) {
        for event in events {
            self.sink.record(event).await;
        }
    }
}
