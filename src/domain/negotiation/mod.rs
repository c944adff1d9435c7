//! Offer/answer negotiation context
//!
//! Everything needed to negotiate one session between two endpoints: the
//! description and candidate value types, the per-endpoint state machine,
//! candidate buffering, the coordinator that drives the handshake, and the
//! connectivity monitor that watches the resulting transport pair.

pub mod buffer;
pub mod coordinator;
pub mod endpoint;
pub mod entity;
pub mod event;
pub mod monitor;
pub mod session;
pub mod transport;
pub mod value_object;

pub use buffer::{CandidateBuffer, DrainFailure, DrainReport};
pub use coordinator::NegotiationCoordinator;
pub use endpoint::{CandidateDisposition, Endpoint};
pub use entity::{Candidate, SessionDescription};
pub use event::{EventSink, NegotiationEvent, NegotiationEventKind};
pub use monitor::ConnectivityMonitor;
pub use session::Session;
pub use transport::{ConnectivityState, TransportCapability, TransportHints};
pub use value_object::{DescriptionKind, EndpointRole, HandshakeStep, NegotiationState};
