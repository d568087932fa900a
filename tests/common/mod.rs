#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the simulation client integration tests.
//!
//! Provides a channel-driven [`MockTransport`] with its [`MockServer`] half,
//! a [`ScriptedConnector`] that plays back connection outcomes and records
//! every attempt, and builders for the backend's JSON frames.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use firewall_sim_client::{
    CloseInfo, ConnectionTarget, Connector, SessionConfig, SimClientError, TargetRole, Transport,
};
use tokio::sync::{mpsc, oneshot};

/// How long a test waits for something that should happen promptly.
pub const PROMPT: Duration = Duration::from_secs(2);

// ── MockTransport ───────────────────────────────────────────────────

/// Client half of an in-process connection.
///
/// Frames pushed through the paired [`MockServer`] come out of `recv()` in
/// order; dropping the server's sender (see [`MockServer::hang_up`]) ends the
/// stream cleanly.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<String, SimClientError>>,
    outbound: mpsc::UnboundedSender<String>,
    closed: Arc<AtomicBool>,
    close_info: Option<CloseInfo>,
}

/// Server half of an in-process connection.
pub struct MockServer {
    inbound_tx: Option<mpsc::UnboundedSender<Result<String, SimClientError>>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    /// Whether the client called `close()` on its transport.
    pub closed: Arc<AtomicBool>,
}

/// Create a connected `(transport, server)` pair.
pub fn mock_pair() -> (MockTransport, MockServer) {
    mock_pair_with_close(None)
}

/// Like [`mock_pair`], but the transport reports `close_info` after the
/// server hangs up.
pub fn mock_pair_with_close(close_info: Option<CloseInfo>) -> (MockTransport, MockServer) {
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let transport = MockTransport {
        inbound,
        outbound,
        closed: Arc::clone(&closed),
        close_info,
    };
    let server = MockServer {
        inbound_tx: Some(inbound_tx),
        outbound_rx,
        closed,
    };
    (transport, server)
}

impl MockServer {
    /// Deliver one text frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.inbound_tx {
            // The client may already have dropped its transport.
            let _ = tx.send(Ok(frame.into()));
        }
    }

    /// Make the client's next `recv()` fail with a transport error.
    pub fn fail(&self, message: &str) {
        if let Some(tx) = &self.inbound_tx {
            let _ = tx.send(Err(SimClientError::TransportReceive(message.into())));
        }
    }

    /// End the stream cleanly, as if the backend closed the connection.
    pub fn hang_up(&mut self) {
        self.inbound_tx = None;
    }

    /// Wait for the next frame the client sent.
    pub async fn next_sent(&mut self) -> Option<String> {
        tokio::time::timeout(PROMPT, self.outbound_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Frames the client has sent so far, without waiting.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(frame) = self.outbound_rx.try_recv() {
            sent.push(frame);
        }
        sent
    }

    pub fn client_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), SimClientError> {
        self.outbound
            .send(message)
            .map_err(|e| SimClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SimClientError>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<(), SimClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn close_info(&self) -> Option<CloseInfo> {
        self.close_info.clone()
    }
}

// ── ScriptedConnector ───────────────────────────────────────────────

/// What the connector does for one connection attempt.
pub enum ConnectOutcome {
    /// Fail immediately, as if the target refused the connection.
    Refuse,
    /// Succeed with the given transport.
    Accept(MockTransport),
    /// Never complete.
    Hang,
    /// Fail once the gate fires (or its sender is dropped).
    RefuseAfter(oneshot::Receiver<()>),
}

/// A [`Connector`] that plays back scripted outcomes in attempt order.
///
/// Attempts beyond the script are refused. Every attempt's role is recorded.
pub struct ScriptedConnector {
    outcomes: StdMutex<VecDeque<ConnectOutcome>>,
    attempts: Arc<StdMutex<Vec<TargetRole>>>,
}

impl ScriptedConnector {
    /// Returns the connector and a shared handle to the recorded attempts.
    pub fn new(outcomes: Vec<ConnectOutcome>) -> (Self, Arc<StdMutex<Vec<TargetRole>>>) {
        let attempts = Arc::new(StdMutex::new(Vec::new()));
        let connector = Self {
            outcomes: StdMutex::new(VecDeque::from(outcomes)),
            attempts: Arc::clone(&attempts),
        };
        (connector, attempts)
    }
}

fn refused(target: &ConnectionTarget) -> SimClientError {
    SimClientError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        format!("{} refused", target.url),
    ))
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = MockTransport;

    async fn connect(&self, target: &ConnectionTarget) -> Result<MockTransport, SimClientError> {
        self.attempts.lock().unwrap().push(target.role);
        let outcome = self.outcomes.lock().unwrap().pop_front();
        match outcome {
            Some(ConnectOutcome::Accept(transport)) => Ok(transport),
            Some(ConnectOutcome::Hang) => std::future::pending().await,
            Some(ConnectOutcome::RefuseAfter(gate)) => {
                let _ = gate.await;
                Err(refused(target))
            }
            Some(ConnectOutcome::Refuse) | None => Err(refused(target)),
        }
    }
}

/// Snapshot of the recorded attempts.
pub fn attempts_of(attempts: &Arc<StdMutex<Vec<TargetRole>>>) -> Vec<TargetRole> {
    attempts.lock().unwrap().clone()
}

// ── Config ──────────────────────────────────────────────────────────

/// Default targets with a short attempt deadline.
pub fn test_config() -> SessionConfig {
    SessionConfig::default()
        .with_connect_timeout(Duration::from_secs(5))
        .with_shutdown_timeout(Duration::from_millis(200))
}

// ── JSON frame builders ─────────────────────────────────────────────

/// A step frame with the given infected nodes.
pub fn step_json(step: u64, infected: &[&str]) -> String {
    serde_json::json!({ "step": step, "infected_nodes": infected }).to_string()
}

/// The completion frame.
pub fn complete_json() -> String {
    serde_json::json!({ "status": "Simulation_Complete" }).to_string()
}

/// An error frame.
pub fn error_json(message: &str) -> String {
    serde_json::json!({ "status": "ERROR", "message": message }).to_string()
}
