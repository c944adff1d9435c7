//! Confab - a session negotiation engine
//!
//! Two endpoints negotiate a shared session configuration through an
//! offer/answer handshake, exchange transport candidates as they are
//! discovered, and report connectivity for the path that results. The
//! engine owns negotiation state only; producing and probing actual
//! transport paths is behind the transport capability port.

pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use domain::shared::error::NegotiationError;
pub use domain::shared::result::Result;
