//! Transport capability port
//!
//! The engine negotiates; an externally supplied transport generates and
//! applies descriptions, discovers candidates and reports connectivity.
//! Everything the engine knows about the transport goes through this trait.

use crate::domain::negotiation::entity::{Candidate, SessionDescription};
use crate::domain::negotiation::value_object::DescriptionKind;
use crate::domain::shared::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::{mpsc, watch};

/// Connectivity of the underlying network path.
///
/// Reported by the transport, observed by the monitor, never fed back into
/// the negotiation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    New,
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectivityState {
    /// A usable path exists
    pub fn is_usable(&self) -> bool {
        matches!(self, ConnectivityState::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityState::New => "new",
            ConnectivityState::Checking => "checking",
            ConnectivityState::Connected => "connected",
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Failed => "failed",
            ConnectivityState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the produced description should ask the far side to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportHints {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Default for TransportHints {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Transport capability port
///
/// `generate_local_description` both produces and installs the local
/// description, which is what starts local candidate discovery. Discovered
/// candidates arrive on the stream returned by `take_local_candidates`
/// (take-once); the latest connectivity is always readable from the watch
/// channel returned by `connectivity`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TransportCapability: Send + Sync {
    /// Generate and install the local description
    async fn generate_local_description(
        &self,
        kind: DescriptionKind,
        hints: &TransportHints,
    ) -> Result<SessionDescription>;

    /// Apply the remote description
    async fn apply_description(&self, description: &SessionDescription) -> Result<()>;

    /// Apply a single remote candidate
    async fn apply_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// Take the stream of locally discovered candidates; None once taken
    async fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<Candidate>>;

    /// Latest-value connectivity signal
    fn connectivity(&self) -> watch::Receiver<ConnectivityState>;

    /// Stop discovery and release transport resources
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_states() {
        assert!(ConnectivityState::Connected.is_usable());
        assert!(!ConnectivityState::Checking.is_usable());
        assert!(!ConnectivityState::Failed.is_usable());
    }

    #[test]
    fn test_default_hints_receive_everything() {
        let hints = TransportHints::default();
        assert!(hints.receive_audio);
        assert!(hints.receive_video);
    }
}
