//! Domain result type

use super::error::NegotiationError;

/// Standard result type for domain operations
pub type Result<T> = std::result::Result<T, NegotiationError>;
