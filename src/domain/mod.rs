//! Domain layer - Core negotiation logic and rules
//!
//! This layer contains:
//! - Entities: Descriptions and candidates exchanged between endpoints
//! - Value Objects: Roles, states and handshake steps
//! - Aggregates: The endpoint state machine and its candidate buffer
//! - Domain Services: The coordinator and connectivity monitor
//! - Ports: Transport capability and event sink interfaces
//! - Domain Events: Things that happened during negotiation

pub mod negotiation;
pub mod shared;

// Re-export commonly used types
pub use shared::{NegotiationError, Result};
