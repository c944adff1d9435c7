//! Transport adapters

pub mod loopback;

pub use loopback::{LoopbackConfig, LoopbackTransport};
