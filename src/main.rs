use confab::config::Config;
use confab::domain::negotiation::coordinator::NegotiationCoordinator;
use confab::domain::negotiation::endpoint::Endpoint;
use confab::domain::negotiation::event::EventSink;
use confab::domain::negotiation::session::Session;
use confab::domain::negotiation::value_object::EndpointRole;
use confab::domain::shared::value_objects::{EndpointId, SessionId};
use confab::infrastructure::observability::{MemoryEventSink, TracingEventSink};
use confab::infrastructure::transport::LoopbackTransport;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting Confab session negotiation engine");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded: {:?}", config);

    // Events stream straight into the log, unless a timeline export was
    // requested, in which case they are collected for the export instead.
    let memory = MemoryEventSink::new();
    let sink: Arc<dyn EventSink> = if config.demo.timeline_path.is_some() {
        Arc::new(memory.clone())
    } else {
        Arc::new(TracingEventSink)
    };

    // Demo: place back-to-back loopback calls through the full
    // offer/answer handshake
    for call_number in 1..=config.demo.call_count {
        info!("=== Negotiation Demo, Call {} ===", call_number);
        demo_call(&config, Arc::clone(&sink)).await?;
    }

    if let Some(path) = &config.demo.timeline_path {
        let timeline = serde_json::to_string_pretty(&memory.events().await)?;
        std::fs::write(path, timeline)?;
        info!(
            "Event timeline ({} events) exported to {}",
            memory.len().await,
            path.display()
        );
    }

    info!("Confab demo complete");
    Ok(())
}

/// Negotiate one session between two co-located endpoints
async fn demo_call(config: &Config, sink: Arc<dyn EventSink>) -> anyhow::Result<()> {
    let session_id = SessionId::new();
    let initiator_id = EndpointId::new();
    let responder_id = EndpointId::new();

    let initiator = Endpoint::new(
        initiator_id,
        session_id,
        EndpointRole::Initiator,
        Arc::new(LoopbackTransport::new(initiator_id, config.transport.clone())),
    );
    let responder = Endpoint::new(
        responder_id,
        session_id,
        EndpointRole::Responder,
        Arc::new(LoopbackTransport::new(responder_id, config.transport.clone())),
    );

    let session = Session::pair(initiator, responder)?;
    let mut coordinator = NegotiationCoordinator::new(session, sink);

    let setup_started = Instant::now();
    coordinator.start().await?;
    coordinator.run_handshake().await?;

    let (initiator_state, responder_state) = coordinator.session().states().await;
    info!(
        "Negotiation settled: initiator {}, responder {}",
        initiator_state, responder_state
    );

    let timeout = Duration::from_millis(config.demo.connect_timeout_ms);
    if coordinator.wait_connected(timeout).await {
        info!(
            "Media path usable {}ms after call setup began",
            setup_started.elapsed().as_millis()
        );
    } else {
        warn!("Connectivity was not confirmed within {:?}", timeout);
    }

    // Hang up
    coordinator.teardown().await;
    let (initiator_state, responder_state) = coordinator.session().states().await;
    info!(
        "Call torn down: initiator {}, responder {}",
        initiator_state, responder_state
    );

    Ok(())
}
