//! Shared kernel - Common types and utilities used across the domain

pub mod error;
pub mod result;
pub mod value_objects;

pub use error::{ApplyTarget, NegotiationError};
pub use result::Result;
pub use value_objects::*;
