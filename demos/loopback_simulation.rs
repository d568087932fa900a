//! # Loopback Simulation Example
//!
//! Runs a full simulation session against an in-process backend, no network
//! required. Shows how to implement [`Transport`] and [`Connector`] for a
//! custom I/O layer:
//!
//! - the primary endpoint refuses, so the session fails over to the fallback
//! - the fallback "backend" waits for `START`, then streams breadth-first
//!   infection waves over a small network with two firewalls
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_simulation
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use firewall_sim_client::{
    ConnectionTarget, Connector, SessionConfig, SimClientError, SimulationSession, StartOutcome,
    TargetRole, Transport, START_COMMAND,
};
use tokio::sync::mpsc;

/// Delay between streamed steps.
const STEP_DELAY: Duration = Duration::from_millis(250);

// ─────────────────────────────────────────────────────────────────────
// Loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half of an in-process stream.
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), SimClientError> {
        self.tx
            .send(message)
            .map_err(|e| SimClientError::TransportSend(e.to_string()))
    }

    /// `None` once the backend task drops its sender.
    async fn recv(&mut self) -> Option<Result<String, SimClientError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), SimClientError> {
        self.rx.close();
        Ok(())
    }
}

/// Refuses the primary target and serves the fallback from a local task.
struct LoopbackConnector {
    graph: BTreeMap<&'static str, Vec<&'static str>>,
    start_node: &'static str,
    firewalls: BTreeSet<&'static str>,
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, target: &ConnectionTarget) -> Result<LoopbackTransport, SimClientError> {
        if target.role == TargetRole::Primary {
            return Err(SimClientError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("no proxy in front of {}", target.url),
            )));
        }

        let (client_tx, mut backend_rx) = mpsc::unbounded_channel::<String>();
        let (backend_tx, client_rx) = mpsc::unbounded_channel::<String>();
        let waves = infection_waves(&self.graph, self.start_node, &self.firewalls);

        tokio::spawn(async move {
            while let Some(command) = backend_rx.recv().await {
                if command != START_COMMAND {
                    continue;
                }
                for (step, wave) in waves.iter().enumerate() {
                    let frame = serde_json::json!({ "step": step, "newly_infected": wave });
                    if backend_tx.send(frame.to_string()).is_err() {
                        return;
                    }
                    tokio::time::sleep(STEP_DELAY).await;
                }
                let _ = backend_tx.send(serde_json::json!({ "status": "complete" }).to_string());
                return;
            }
        });

        Ok(LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────
// Breadth-first infection
// ─────────────────────────────────────────────────────────────────────

/// Newly infected nodes per step: the start node, then each BFS wave.
///
/// Firewalled nodes are never infected. A firewalled start node yields no
/// steps at all.
fn infection_waves(
    graph: &BTreeMap<&'static str, Vec<&'static str>>,
    start: &'static str,
    firewalls: &BTreeSet<&'static str>,
) -> Vec<Vec<&'static str>> {
    if firewalls.contains(start) {
        return Vec::new();
    }

    let mut infected = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut waves = vec![vec![start]];

    while !queue.is_empty() {
        let mut wave = Vec::new();
        for _ in 0..queue.len() {
            let Some(node) = queue.pop_front() else {
                break;
            };
            for &neighbor in graph.get(node).into_iter().flatten() {
                if !firewalls.contains(neighbor) && infected.insert(neighbor) {
                    wave.push(neighbor);
                    queue.push_back(neighbor);
                }
            }
        }
        if !wave.is_empty() {
            waves.push(wave);
        }
    }
    waves
}

fn demo_network() -> BTreeMap<&'static str, Vec<&'static str>> {
    BTreeMap::from([
        ("gateway", vec!["web-1", "web-2", "vpn"]),
        ("web-1", vec!["gateway", "app-1"]),
        ("web-2", vec!["gateway", "app-2"]),
        ("vpn", vec!["gateway", "admin"]),
        ("app-1", vec!["web-1", "db"]),
        ("app-2", vec!["web-2", "db", "cache"]),
        ("db", vec!["app-1", "app-2", "backup"]),
        ("cache", vec!["app-2"]),
        ("admin", vec!["vpn", "backup"]),
        ("backup", vec!["db", "admin"]),
    ])
}

// ─────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let connector = LoopbackConnector {
        graph: demo_network(),
        start_node: "gateway",
        firewalls: BTreeSet::from(["vpn", "app-1"]),
    };
    let mut session = SimulationSession::new(connector, SessionConfig::default())?;

    if !session.wait_until_ready().await {
        return Err(format!("session ended as {}", session.phase()).into());
    }
    tracing::info!(role = ?session.active_role(), "stream open");

    if session.start() != StartOutcome::Started {
        return Err("backend not ready for START".into());
    }

    let phase = session.run_to_completion().await;
    for step in session.steps() {
        let nodes: Vec<&str> = step.infected_nodes.iter().map(String::as_str).collect();
        println!("step {}: {}", step.step, nodes.join(", "));
    }
    let total = session.state().all_infected().len();
    println!("{phase}: {total} node(s) infected");

    session.shutdown().await;
    Ok(())
}
