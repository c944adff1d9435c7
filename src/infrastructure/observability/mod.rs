//! Observability sinks
//!
//! Two `EventSink` implementations: one tees negotiation events into
//! `tracing`, one keeps them in memory for inspection and export.

use crate::domain::negotiation::event::{EventSink, NegotiationEvent};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Sink that logs every event through `tracing`
///
/// Failure kinds are logged at warning severity, everything else at info.
/// The event kind is serialized so log lines stay grep-able.
pub struct TracingEventSink;

#[async_trait::async_trait]
impl EventSink for TracingEventSink {
    async fn record(&self, event: NegotiationEvent) {
        let detail = serde_json::to_string(&event.kind)
            .unwrap_or_else(|_| format!("{:?}", event.kind));
        let scope = match event.role {
            Some(role) => format!("{} {}", event.session_id, role),
            None => event.session_id.to_string(),
        };

        if event.kind.is_failure() {
            warn!("NEGOTIATION: [{}] {}", scope, detail);
        } else {
            info!("NEGOTIATION: [{}] {}", scope, detail);
        }
    }
}

/// In-memory sink
#[derive(Clone)]
pub struct MemoryEventSink {
    events: Arc<RwLock<Vec<NegotiationEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Everything recorded so far, in arrival order
    pub async fn events(&self) -> Vec<NegotiationEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventSink for MemoryEventSink {
    async fn record(&self, event: NegotiationEvent) {
        self.events.write().await.push(event);
    }
}
