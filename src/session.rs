//! The simulation session state machine.
//!
//! [`SimulationSession`] owns a [`ConnectionManager`], feeds every
//! [`ConnectionEvent`] through [`SessionState::apply`], and exposes the
//! `start` / `reset` commands. It is the single source of truth for
//! presentation, either read directly via [`SimulationSession::state`] or
//! observed through [`SimulationSession::subscribe`].
//!
//! ```text
//! IDLE ──open──▶ READY ──start()──▶ RUNNING ──completion──▶ COMPLETE
//!                                      │
//!             error frame (any) ──▶ ERROR      disconnect ──▶ DISCONNECTED
//! ```
//!
//! The session is driven by its owner: each call to
//! [`next_update`](SimulationSession::next_update) waits for one connection
//! event and applies it, so transitions never run concurrently with the
//! commands.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = SimulationSession::new(WebSocketConnector::new(), SessionConfig::default())?;
//!
//! if session.wait_until_ready().await && session.start() == StartOutcome::Started {
//!     let phase = session.run_to_completion().await;
//!     println!("{phase}: {} steps", session.steps().len());
//! }
//! session.shutdown().await;
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, LinkStatus};
use crate::decoder::{decode, DecodedEvent};
use crate::error::Result;
use crate::protocol::{NodeId, SimulationStep, TargetRole, START_COMMAND};
use crate::transport::Connector;

// ── Phase ───────────────────────────────────────────────────────────

/// The session's position in the simulation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    /// No usable connection yet, or the session was reset.
    #[default]
    Idle,
    /// Connected; `start()` is accepted.
    Ready,
    /// `START` was sent; steps are being recorded.
    Running,
    /// The backend reported the end of the run.
    Complete,
    /// The backend reported an error.
    Error,
    /// The connection was lost and will not be retried.
    Disconnected,
}

impl SimulationPhase {
    /// `true` for phases that only `reset()` (or a new connection) can leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SimulationPhase::Complete | SimulationPhase::Error | SimulationPhase::Disconnected
        )
    }

    /// Whether the graph accepts token placement in this phase.
    pub fn allows_graph_interaction(self) -> bool {
        matches!(self, SimulationPhase::Idle | SimulationPhase::Ready)
    }

    /// Whether the "start simulation" control should be enabled: the session
    /// is ready and every firewall token has been placed.
    pub fn start_control_enabled(self, tokens_left: u32) -> bool {
        self == SimulationPhase::Ready && tokens_left == 0
    }
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SimulationPhase::Idle => "idle",
            SimulationPhase::Ready => "ready",
            SimulationPhase::Running => "running",
            SimulationPhase::Complete => "complete",
            SimulationPhase::Error => "error",
            SimulationPhase::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

// ── State ───────────────────────────────────────────────────────────

/// Everything presentation needs to render the simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    /// Current phase.
    pub phase: SimulationPhase,
    /// Steps in arrival order. Never reordered or deduplicated.
    pub steps: Vec<SimulationStep>,
    /// Message for the `Error` and `Disconnected` phases.
    pub last_error: Option<String>,
    /// Frames that were malformed, unrecognized, or arrived outside a run.
    pub ignored_frames: u64,
}

impl SessionState {
    /// Apply one connection event. This is the session's transition function.
    ///
    /// | event | effect |
    /// |---|---|
    /// | `Opened` | → `Ready`, error cleared |
    /// | completion frame while `Running` | → `Complete` |
    /// | step frame while `Running` | step appended |
    /// | error frame | → `Error`, message recorded |
    /// | `Closed` with a fallback pending | none |
    /// | `Closed` otherwise | → `Disconnected`, unless already `Complete` or `Error` |
    ///
    /// Everything else leaves the phase alone.
    pub fn apply(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened { role } => {
                debug!(%role, "connection opened");
                self.phase = SimulationPhase::Ready;
                self.last_error = None;
            }
            ConnectionEvent::Message(raw) => self.apply_frame(&raw),
            ConnectionEvent::Errored { role, message } => {
                debug!(%role, %message, "transport error");
            }
            ConnectionEvent::Closed {
                role,
                will_fail_over: true,
                ..
            } => {
                info!(%role, "connection failed before opening, trying fallback");
            }
            ConnectionEvent::Closed { code, reason, .. } => self.apply_disconnect(code, reason),
        }
    }

    /// The most recent step, which holds the currently infected nodes.
    pub fn latest_step(&self) -> Option<&SimulationStep> {
        self.steps.last()
    }

    /// Nodes infected as of the latest step.
    pub fn currently_infected(&self) -> Option<&BTreeSet<NodeId>> {
        self.latest_step().map(|step| &step.infected_nodes)
    }

    /// Every node reported infected by any step so far.
    ///
    /// Useful with backends that report only the newly infected wave per step.
    pub fn all_infected(&self) -> BTreeSet<NodeId> {
        self.steps
            .iter()
            .flat_map(|step| step.infected_nodes.iter().cloned())
            .collect()
    }

    /// Back to the initial state.
    pub fn reset(&mut self) {
        *self = SessionState::default();
    }

    fn begin_run(&mut self) {
        self.steps.clear();
        self.last_error = None;
        self.phase = SimulationPhase::Running;
    }

    fn apply_frame(&mut self, raw: &str) {
        match decode(raw) {
            DecodedEvent::Completion if self.phase == SimulationPhase::Running => {
                info!(steps = self.steps.len(), "simulation complete");
                self.phase = SimulationPhase::Complete;
            }
            DecodedEvent::Step(step) if self.phase == SimulationPhase::Running => {
                debug!(step = step.step, infected = step.infected_nodes.len(), "step received");
                self.steps.push(step);
            }
            DecodedEvent::Error { message } => {
                error!(%message, "simulation backend reported an error");
                self.phase = SimulationPhase::Error;
                self.last_error = Some(message);
            }
            DecodedEvent::Completion | DecodedEvent::Step(_) => {
                debug!(phase = %self.phase, "progress frame outside a running simulation ignored");
                self.ignored_frames += 1;
            }
            DecodedEvent::Unrecognized { raw } => {
                warn!(%raw, "unrecognized simulation frame ignored");
                self.ignored_frames += 1;
            }
            DecodedEvent::Malformed { reason } => {
                warn!(%reason, "malformed simulation frame ignored");
                self.ignored_frames += 1;
            }
        }
    }

    fn apply_disconnect(&mut self, code: Option<u16>, reason: Option<String>) {
        if matches!(
            self.phase,
            SimulationPhase::Complete | SimulationPhase::Error
        ) {
            debug!(phase = %self.phase, "connection closed after the run finished");
            return;
        }
        let message = match (reason, code) {
            (Some(reason), _) => format!("connection closed: {reason}"),
            (None, Some(code)) => format!("connection closed (code {code})"),
            (None, None) => "connection closed".to_string(),
        };
        warn!(%message, "simulation stream disconnected");
        self.phase = SimulationPhase::Disconnected;
        self.last_error = Some(message);
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Result of [`SimulationSession::start`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// `START` was sent and the session is `Running`.
    Started,
    /// Rejected: the session was not `Ready`.
    NotReady(SimulationPhase),
    /// Rejected: the transport is not open.
    SocketNotReady,
}

// ── Session handle ──────────────────────────────────────────────────

/// A simulation session bound to one connection manager.
///
/// Created with [`SimulationSession::new`], which begins connecting at once.
/// Must be used from within a Tokio runtime.
pub struct SimulationSession<C: Connector> {
    id: Uuid,
    connection: ConnectionManager<C>,
    state: SessionState,
    snapshot_tx: watch::Sender<SessionState>,
    disposed: bool,
}

impl<C: Connector> SimulationSession<C> {
    /// Create a session and start connecting to the primary target.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::InvalidTarget`](crate::SimClientError::InvalidTarget)
    /// if the configured targets cannot be resolved.
    pub fn new(connector: C, config: SessionConfig) -> Result<Self> {
        let mut connection = ConnectionManager::new(connector, &config)?;
        let id = Uuid::new_v4();
        let [primary, fallback] = connection.targets();
        info!(
            session_id = %id,
            primary = %primary.url,
            fallback = %fallback.url,
            "simulation session created"
        );
        connection.connect();

        let (snapshot_tx, _) = watch::channel(SessionState::default());
        Ok(Self {
            id,
            connection,
            state: SessionState::default(),
            snapshot_tx,
            disposed: false,
        })
    }

    /// Send `START` and enter `Running`.
    ///
    /// Only accepted in `Ready`. Anything else is a rejected no-op: no frame
    /// is sent and the state does not change.
    pub fn start(&mut self) -> StartOutcome {
        let phase = self.state.phase;
        if phase != SimulationPhase::Ready {
            warn!(session_id = %self.id, %phase, "cannot start simulation: session not ready");
            return StartOutcome::NotReady(phase);
        }
        if let Err(e) = self.connection.send(START_COMMAND) {
            warn!(session_id = %self.id, "cannot start: socket not ready ({e})");
            return StartOutcome::SocketNotReady;
        }

        self.state.begin_run();
        info!(session_id = %self.id, "simulation started");
        self.publish();
        StartOutcome::Started
    }

    /// Return to `Idle`, clearing steps and error. The connection is left
    /// as it is; use [`reconnect`](Self::reconnect) for a fresh one.
    pub fn reset(&mut self) {
        self.state.reset();
        info!(session_id = %self.id, "session reset");
        self.publish();
    }

    /// Close the current connection and start a new one from the primary
    /// target. The session becomes `Ready` again once it opens.
    ///
    /// The previous transport is closed (or its loop aborted after the
    /// shutdown timeout) before the first new attempt begins.
    pub async fn reconnect(&mut self) {
        if self.disposed {
            warn!(session_id = %self.id, "reconnect() on a closed session ignored");
            return;
        }
        info!(session_id = %self.id, "reconnecting");
        self.connection.shutdown().await;
        self.connection.connect();
    }

    /// Wait for the next connection event and apply it.
    ///
    /// Returns the updated state, or `None` once the connection has no more
    /// events to deliver or the session was closed. Cancel-safe.
    pub async fn next_update(&mut self) -> Option<&SessionState> {
        if self.disposed {
            return None;
        }
        let event = self.connection.next_event().await?;
        self.handle_event(event);
        Some(&self.state)
    }

    /// Apply events until `done` holds for the state or events run out.
    ///
    /// Returns whether `done` holds at the end.
    pub async fn advance_until<F>(&mut self, mut done: F) -> bool
    where
        F: FnMut(&SessionState) -> bool,
    {
        loop {
            if done(&self.state) {
                return true;
            }
            if self.next_update().await.is_none() {
                return done(&self.state);
            }
        }
    }

    /// Wait until the connection opens (or fails for good).
    ///
    /// Returns `true` if the session is `Ready`.
    pub async fn wait_until_ready(&mut self) -> bool {
        self.advance_until(|state| state.phase != SimulationPhase::Idle)
            .await;
        self.state.phase == SimulationPhase::Ready
    }

    /// Apply events until the session reaches a terminal phase, and return it.
    ///
    /// If the connection ends first, the phase at that point is returned.
    pub async fn run_to_completion(&mut self) -> SimulationPhase {
        self.advance_until(|state| state.phase.is_terminal()).await;
        self.state.phase
    }

    /// Tear the session down.
    ///
    /// The connection is closed with failover suppressed and the state goes
    /// back to its initial value. No event that arrives afterwards changes it.
    pub fn close(&mut self) {
        if self.disposed {
            return;
        }
        info!(session_id = %self.id, "closing simulation session");
        self.disposed = true;
        self.connection.close();
        self.state.reset();
        self.publish();
    }

    /// [`close`](Self::close), then wait for the transport to shut down.
    pub async fn shutdown(&mut self) {
        self.close();
        self.connection.shutdown().await;
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Identifier used in this session's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The full current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The current phase.
    pub fn phase(&self) -> SimulationPhase {
        self.state.phase
    }

    /// Steps received in the current run, in arrival order.
    pub fn steps(&self) -> &[SimulationStep] {
        &self.state.steps
    }

    /// Message for the `Error` and `Disconnected` phases.
    pub fn last_error(&self) -> Option<&str> {
        self.state.last_error.as_deref()
    }

    /// State of the underlying transport.
    pub fn connection_status(&self) -> LinkStatus {
        self.connection.status()
    }

    /// Target that accepted the connection, if one did.
    pub fn active_role(&self) -> Option<TargetRole> {
        self.connection.active_role()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.disposed
    }

    /// Watch state snapshots; a new value is published after every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshot_tx.subscribe()
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn handle_event(&mut self, event: ConnectionEvent) {
        let span = tracing::debug_span!("simulation_session", session_id = %self.id);
        let _guard = span.enter();

        let before = self.state.phase;
        self.state.apply(event);
        let after = self.state.phase;
        if before != after {
            info!(from = %before, to = %after, "phase changed");
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.state.clone());
    }
}

impl<C: Connector> fmt::Debug for SimulationSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationSession")
            .field("id", &self.id)
            .field("phase", &self.state.phase)
            .field("steps", &self.state.steps.len())
            .field("connection", &self.connection)
            .field("closed", &self.disposed)
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn opened() -> ConnectionEvent {
        ConnectionEvent::Opened {
            role: TargetRole::Primary,
        }
    }

    fn frame(raw: &str) -> ConnectionEvent {
        ConnectionEvent::Message(raw.to_string())
    }

    fn closed(will_fail_over: bool) -> ConnectionEvent {
        ConnectionEvent::Closed {
            role: TargetRole::Primary,
            code: None,
            reason: None,
            will_fail_over,
        }
    }

    fn running() -> SessionState {
        let mut state = SessionState::default();
        state.apply(opened());
        state.begin_run();
        state
    }

    #[test]
    fn open_makes_session_ready() {
        let mut state = SessionState {
            last_error: Some("old".into()),
            ..SessionState::default()
        };
        state.apply(opened());
        assert_eq!(state.phase, SimulationPhase::Ready);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn steps_then_completion() {
        let mut state = running();
        state.apply(frame(r#"{"step":0,"infected_nodes":["A"]}"#));
        state.apply(frame(r#"{"step":1,"infected_nodes":["A","B"]}"#));
        state.apply(frame(r#"{"status":"Simulation_Complete"}"#));

        assert_eq!(state.phase, SimulationPhase::Complete);
        assert_eq!(
            state.steps,
            vec![
                SimulationStep::new(0, ["A"]),
                SimulationStep::new(1, ["A", "B"])
            ]
        );
        assert_eq!(
            state.currently_infected().unwrap().len(),
            2,
            "latest step holds the current infection"
        );
    }

    #[test]
    fn steps_keep_arrival_order_and_duplicates() {
        let mut state = running();
        for raw in [r#"{"step":2}"#, r#"{"step":0}"#, r#"{"step":2}"#] {
            state.apply(frame(raw));
        }
        let indices: Vec<u64> = state.steps.iter().map(|s| s.step).collect();
        assert_eq!(indices, vec![2, 0, 2]);
    }

    #[test]
    fn log_is_frozen_after_completion() {
        let mut state = running();
        state.apply(frame(r#"{"step":0}"#));
        state.apply(frame(r#"{"status":"complete"}"#));
        state.apply(frame(r#"{"step":1}"#));

        assert_eq!(state.phase, SimulationPhase::Complete);
        assert_eq!(state.steps.len(), 1);
        assert_eq!(state.ignored_frames, 1);
    }

    #[test]
    fn error_frame_is_terminal_and_keeps_log() {
        let mut state = running();
        state.apply(frame(r#"{"step":0,"infected_nodes":["A"]}"#));
        let before = state.steps.clone();

        state.apply(frame(r#"{"status":"ERROR","message":"boom"}"#));
        state.apply(frame(r#"{"step":1}"#));

        assert_eq!(state.phase, SimulationPhase::Error);
        assert_eq!(state.last_error.as_deref(), Some("boom"));
        assert_eq!(state.steps, before);
    }

    #[test]
    fn error_frame_while_ready() {
        let mut state = SessionState::default();
        state.apply(opened());
        state.apply(frame(r#"{"status":"error","message":"No active game."}"#));
        assert_eq!(state.phase, SimulationPhase::Error);
        assert_eq!(state.last_error.as_deref(), Some("No active game."));
    }

    #[test]
    fn junk_frames_do_not_change_phase() {
        let mut state = running();
        state.apply(frame("{{{"));
        state.apply(frame(r#"{"hello":"world"}"#));
        state.apply(frame(r#"{"step":-4}"#));

        assert_eq!(state.phase, SimulationPhase::Running);
        assert!(state.steps.is_empty());
        assert_eq!(state.ignored_frames, 3);
    }

    #[test]
    fn step_before_start_is_ignored() {
        let mut state = SessionState::default();
        state.apply(opened());
        state.apply(frame(r#"{"step":0}"#));
        assert_eq!(state.phase, SimulationPhase::Ready);
        assert!(state.steps.is_empty());
    }

    #[test]
    fn pending_failover_keeps_phase() {
        let mut state = SessionState::default();
        state.apply(ConnectionEvent::Errored {
            role: TargetRole::Primary,
            message: "refused".into(),
        });
        state.apply(closed(true));
        assert_eq!(state.phase, SimulationPhase::Idle);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn final_close_disconnects() {
        let mut state = running();
        state.apply(ConnectionEvent::Closed {
            role: TargetRole::Fallback,
            code: Some(1011),
            reason: None,
            will_fail_over: false,
        });
        assert_eq!(state.phase, SimulationPhase::Disconnected);
        assert_eq!(
            state.last_error.as_deref(),
            Some("connection closed (code 1011)")
        );
    }

    #[test]
    fn close_after_completion_keeps_outcome() {
        let mut state = running();
        state.apply(frame(r#"{"status":"Simulation_Complete"}"#));
        state.apply(closed(false));
        assert_eq!(state.phase, SimulationPhase::Complete);
        assert!(state.last_error.is_none());
    }

    #[test]
    fn reset_returns_to_initial_state_from_any_phase() {
        let mut state = running();
        state.apply(frame(r#"{"step":0}"#));
        state.apply(frame(r#"{"status":"ERROR","message":"boom"}"#));
        state.reset();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn all_infected_unions_waves() {
        let mut state = running();
        state.apply(frame(r#"{"step":0,"newly_infected":["S"]}"#));
        state.apply(frame(r#"{"step":1,"newly_infected":["A","B"]}"#));
        let all: Vec<_> = state.all_infected().into_iter().collect();
        assert_eq!(all, vec!["A", "B", "S"]);
    }

    #[test]
    fn phase_gates() {
        assert!(SimulationPhase::Idle.allows_graph_interaction());
        assert!(SimulationPhase::Ready.allows_graph_interaction());
        assert!(!SimulationPhase::Running.allows_graph_interaction());

        assert!(SimulationPhase::Ready.start_control_enabled(0));
        assert!(!SimulationPhase::Ready.start_control_enabled(2));
        assert!(!SimulationPhase::Idle.start_control_enabled(0));

        assert!(SimulationPhase::Disconnected.is_terminal());
        assert!(!SimulationPhase::Running.is_terminal());
    }

    #[test]
    fn phase_display() {
        assert_eq!(SimulationPhase::Complete.to_string(), "complete");
        assert_eq!(SimulationPhase::Disconnected.to_string(), "disconnected");
    }
}
