//! In-process loopback transport
//!
//! Implements the transport capability for the co-located configuration
//! where both endpoints live in the same process: descriptions are
//! fabricated SDP blobs, candidates are fabricated host candidates emitted
//! by a gather task, and connectivity is walked locally instead of probed
//! on a real network. Rejection toggles let tests script transport
//! failures.

use crate::domain::negotiation::entity::{Candidate, SessionDescription};
use crate::domain::negotiation::transport::{
    ConnectivityState, TransportCapability, TransportHints,
};
use crate::domain::negotiation::value_object::DescriptionKind;
use crate::domain::shared::error::NegotiationError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::EndpointId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Loopback transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Address advertised in fabricated candidates
    pub advertised_ip: String,
    /// First media port; subsequent candidates step up from here
    pub base_port: u16,
    /// How many host candidates the gather task emits
    pub candidate_count: usize,
    /// Delay between candidate emissions
    pub gather_delay_ms: u64,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            advertised_ip: "127.0.0.1".to_string(),
            base_port: 40000,
            candidate_count: 2,
            gather_delay_ms: 5,
        }
    }
}

impl LoopbackConfig {
    pub fn gather_delay(&self) -> Duration {
        Duration::from_millis(self.gather_delay_ms)
    }
}

/// Loopback transport
///
/// Connectivity walk: `New` until both descriptions are known, `Checking`
/// once they are, `Connected` when the first remote candidate has been
/// applied, `Failed` when a description is refused, `Closed` on close.
pub struct LoopbackTransport {
    endpoint_id: EndpointId,
    config: LoopbackConfig,
    connectivity_tx: watch::Sender<ConnectivityState>,
    candidate_tx: mpsc::UnboundedSender<Candidate>,
    candidate_rx: Mutex<Option<mpsc::UnboundedReceiver<Candidate>>>,
    gather_task: Mutex<Option<JoinHandle<()>>>,
    has_local: AtomicBool,
    has_remote: AtomicBool,
    any_applied: AtomicBool,
    reject_descriptions: AtomicBool,
    reject_candidates: AtomicBool,
    applied_candidates: RwLock<Vec<Candidate>>,
}

impl LoopbackTransport {
    pub fn new(endpoint_id: EndpointId, config: LoopbackConfig) -> Self {
        let (connectivity_tx, _) = watch::channel(ConnectivityState::New);
        let (candidate_tx, candidate_rx) = mpsc::unbounded_channel();

        Self {
            endpoint_id,
            config,
            connectivity_tx,
            candidate_tx,
            candidate_rx: Mutex::new(Some(candidate_rx)),
            gather_task: Mutex::new(None),
            has_local: AtomicBool::new(false),
            has_remote: AtomicBool::new(false),
            any_applied: AtomicBool::new(false),
            reject_descriptions: AtomicBool::new(false),
            reject_candidates: AtomicBool::new(false),
            applied_candidates: RwLock::new(Vec::new()),
        }
    }

    /// Refuse the next remote descriptions offered to this transport
    pub fn set_reject_descriptions(&self, reject: bool) {
        self.reject_descriptions.store(reject, Ordering::SeqCst);
    }

    /// Refuse the next remote candidates offered to this transport
    pub fn set_reject_candidates(&self, reject: bool) {
        self.reject_candidates.store(reject, Ordering::SeqCst);
    }

    /// Remote candidates this transport has accepted, in application order
    pub async fn applied_candidates(&self) -> Vec<Candidate> {
        self.applied_candidates.read().await.clone()
    }

    fn fabricate_sdp(&self, hints: &TransportHints) -> String {
        let session_token: u32 = rand::random();
        let audio_direction = if hints.receive_audio { "recvonly" } else { "inactive" };

        let mut sdp = String::new();
        sdp.push_str("v=0\r\n");
        sdp.push_str(&format!(
            "o=confab {} 1 IN IP4 {}\r\n",
            session_token, self.config.advertised_ip
        ));
        sdp.push_str("s=confab loopback\r\n");
        sdp.push_str("t=0 0\r\n");
        sdp.push_str(&format!(
            "m=audio {} UDP/TLS/RTP/SAVPF 111\r\n",
            self.config.base_port
        ));
        sdp.push_str("c=IN IP4 0.0.0.0\r\n");
        sdp.push_str(&format!("a={}\r\n", audio_direction));
        if hints.receive_video {
            sdp.push_str(&format!(
                "m=video {} UDP/TLS/RTP/SAVPF 96\r\n",
                self.config.base_port + 2
            ));
            sdp.push_str("c=IN IP4 0.0.0.0\r\n");
            sdp.push_str("a=recvonly\r\n");
        }
        sdp
    }

    async fn start_gathering(&self) {
        let mut slot = self.gather_task.lock().await;
        if slot.is_some() {
            return;
        }

        let tx = self.candidate_tx.clone();
        let endpoint_id = self.endpoint_id;
        let config = self.config.clone();
        *slot = Some(tokio::spawn(async move {
            for index in 0..config.candidate_count {
                tokio::time::sleep(config.gather_delay()).await;
                // RFC 5245 host priority, decremented so earlier candidates
                // sort first.
                let priority = 2_130_706_431u32 - index as u32;
                let payload = format!(
                    "candidate:{} 1 UDP {} {} {} typ host",
                    index + 1,
                    priority,
                    config.advertised_ip,
                    config.base_port + (index as u16) * 2
                );
                debug!("Endpoint {} gathered candidate: {}", endpoint_id, payload);
                if tx.send(Candidate::new(endpoint_id, payload)).is_err() {
                    break;
                }
            }
        }));
        info!(
            "Endpoint {} gathering {} host candidates",
            self.endpoint_id, self.config.candidate_count
        );
    }

    /// Move the walk forward without ever regressing or leaving a terminal
    /// state.
    fn refresh_connectivity(&self) {
        let both_descriptions =
            self.has_local.load(Ordering::SeqCst) && self.has_remote.load(Ordering::SeqCst);
        let next = if both_descriptions && self.any_applied.load(Ordering::SeqCst) {
            ConnectivityState::Connected
        } else if both_descriptions {
            ConnectivityState::Checking
        } else {
            return;
        };

        self.connectivity_tx.send_if_modified(|current| {
            let terminal = matches!(
                *current,
                ConnectivityState::Failed | ConnectivityState::Closed
            );
            if terminal || *current == ConnectivityState::Connected || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn fail_connectivity(&self) {
        self.connectivity_tx.send_if_modified(|current| {
            if *current == ConnectivityState::Closed || *current == ConnectivityState::Failed {
                return false;
            }
            *current = ConnectivityState::Failed;
            true
        });
    }
}

#[async_trait::async_trait]
impl TransportCapability for LoopbackTransport {
    async fn generate_local_description(
        &self,
        kind: DescriptionKind,
        hints: &TransportHints,
    ) -> Result<SessionDescription> {
        let sdp = self.fabricate_sdp(hints);
        self.has_local.store(true, Ordering::SeqCst);
        self.start_gathering().await;
        self.refresh_connectivity();
        debug!(
            "Endpoint {} produced local {} ({} bytes)",
            self.endpoint_id,
            kind,
            sdp.len()
        );
        Ok(SessionDescription::new(kind, sdp))
    }

    async fn apply_description(&self, description: &SessionDescription) -> Result<()> {
        if self.reject_descriptions.load(Ordering::SeqCst) {
            self.fail_connectivity();
            return Err(NegotiationError::transport_description(format!(
                "scripted rejection of the remote {}",
                description.kind()
            )));
        }
        if !description.payload().starts_with("v=0") {
            self.fail_connectivity();
            return Err(NegotiationError::transport_description(
                "malformed description payload",
            ));
        }

        self.has_remote.store(true, Ordering::SeqCst);
        self.refresh_connectivity();
        debug!(
            "Endpoint {} installed remote {}",
            self.endpoint_id,
            description.kind()
        );
        Ok(())
    }

    async fn apply_candidate(&self, candidate: &Candidate) -> Result<()> {
        // Candidate failures are isolated: they never fail the walk.
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(NegotiationError::transport_candidate(
                "scripted rejection of remote candidate",
            ));
        }
        if !candidate.payload().starts_with("candidate:") {
            return Err(NegotiationError::transport_candidate(
                "malformed candidate payload",
            ));
        }

        self.applied_candidates.write().await.push(candidate.clone());
        self.any_applied.store(true, Ordering::SeqCst);
        self.refresh_connectivity();
        debug!(
            "Endpoint {} applied remote candidate from {}",
            self.endpoint_id,
            candidate.origin()
        );
        Ok(())
    }

    async fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<Candidate>> {
        self.candidate_rx.lock().await.take()
    }

    fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.connectivity_tx.subscribe()
    }

    async fn close(&self) {
        if let Some(task) = self.gather_task.lock().await.take() {
            task.abort();
        }
        self.connectivity_tx.send_replace(ConnectivityState::Closed);
        info!("Endpoint {} transport closed", self.endpoint_id);
    }
}
