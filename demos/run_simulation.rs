//! # Run Simulation Example
//!
//! Connects to a running firewall game backend, starts the infection
//! simulation and prints each step as it streams in:
//!
//! 1. Open the stream (proxied primary endpoint, then the direct fallback)
//! 2. Send `START` once the session is ready
//! 3. Print every infection wave until completion, error or disconnect
//! 4. Shut down gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the backend on localhost:8000 (and optionally the dev server on 5173), then:
//! cargo run --example run_simulation
//!
//! # Point at another deployment:
//! FIREWALL_SIM_ORIGIN=https://play.example.com \
//! FIREWALL_SIM_FALLBACK_URL=wss://api.example.com/api/ws/simulate \
//!     cargo run --example run_simulation
//! ```

use firewall_sim_client::{
    SessionConfig, SimulationPhase, SimulationSession, StartOutcome, WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for per-frame output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let mut config = match std::env::var("FIREWALL_SIM_ORIGIN") {
        Ok(origin) => SessionConfig::new(origin),
        Err(_) => SessionConfig::default(),
    };
    if let Ok(fallback) = std::env::var("FIREWALL_SIM_FALLBACK_URL") {
        config = config.with_fallback_url(fallback);
    }

    let mut session = SimulationSession::new(WebSocketConnector::new(), config)?;
    tracing::info!(session_id = %session.id(), "connecting");

    // ── Run ─────────────────────────────────────────────────────────
    tokio::select! {
        phase = drive(&mut session) => {
            tracing::info!("simulation ended: {phase}");
            if let Some(message) = session.last_error() {
                tracing::warn!("{message}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, shutting down…");
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    session.shutdown().await;
    Ok(())
}

/// Wait for the stream, start the run and print steps until it ends.
async fn drive(session: &mut SimulationSession<WebSocketConnector>) -> SimulationPhase {
    if !session.wait_until_ready().await {
        return session.phase();
    }
    if let Some(role) = session.active_role() {
        tracing::info!("stream open via {role} endpoint");
    }

    match session.start() {
        StartOutcome::Started => {}
        other => {
            tracing::error!("could not start: {other:?}");
            return session.phase();
        }
    }

    let mut printed = 0;
    while let Some(state) = session.next_update().await {
        for step in state.steps.iter().skip(printed) {
            let nodes: Vec<&str> = step.infected_nodes.iter().map(String::as_str).collect();
            println!("step {:>3}: {}", step.step, nodes.join(", "));
        }
        printed = state.steps.len();
        if state.phase.is_terminal() {
            break;
        }
    }
    session.phase()
}
