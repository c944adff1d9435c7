//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Transport adapters implementing the transport capability port
//! - Observability sinks implementing the event sink port

pub mod observability;
pub mod transport;
