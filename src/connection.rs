//! Connection management for the simulation stream.
//!
//! [`ConnectionManager`] owns at most one live transport at a time. A call to
//! [`connect`](ConnectionManager::connect) spawns a background loop that works
//! through the failover plan `[Primary, Fallback]` left to right:
//!
//! - an attempt that fails before the transport opens moves on to the next
//!   target, if there is one;
//! - the first attempt that opens is final for this connection; when that
//!   transport later closes there is no further attempt.
//!
//! Lifecycle notifications come back as [`ConnectionEvent`]s, in transport
//! order, from [`next_event`](ConnectionManager::next_event). The manager does
//! not look inside message frames.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut manager = ConnectionManager::new(WebSocketConnector::new(), &SessionConfig::default())?;
//! manager.connect();
//!
//! while let Some(event) = manager.next_event().await {
//!     match event {
//!         ConnectionEvent::Opened { .. } => manager.send(START_COMMAND)?,
//!         ConnectionEvent::Message(frame) => println!("{frame}"),
//!         ConnectionEvent::Closed { will_fail_over: false, .. } => break,
//!         _ => {}
//!     }
//! }
//! manager.shutdown().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SimClientError};
use crate::protocol::{ConnectionTarget, TargetRole};
use crate::transport::{Connector, Transport};

// ── Events ──────────────────────────────────────────────────────────

/// A lifecycle notification from the connection loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A transport to `role` is open and ready for [`send`](ConnectionManager::send).
    Opened {
        /// Target that accepted the connection.
        role: TargetRole,
    },
    /// One raw text frame from the backend.
    Message(String),
    /// The transport to `role` reported an error. A `Closed` event follows.
    Errored {
        /// Target the error belongs to.
        role: TargetRole,
        /// Human-readable description.
        message: String,
    },
    /// The transport to `role` closed, or never opened.
    Closed {
        /// Target that closed.
        role: TargetRole,
        /// Close code sent by the peer, if any.
        code: Option<u16>,
        /// Close reason or failure description, if any.
        reason: Option<String>,
        /// `true` when a fallback attempt follows this closure.
        will_fail_over: bool,
    },
}

/// State of the manager's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkStatus {
    /// `connect` has not been called.
    Idle = 0,
    /// An attempt (primary or fallback) is in flight.
    Connecting = 1,
    /// A transport is open.
    Open = 2,
    /// The connection ended, or was closed by the owner.
    Closed = 3,
}

impl LinkStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LinkStatus::Idle,
            1 => LinkStatus::Connecting,
            2 => LinkStatus::Open,
            _ => LinkStatus::Closed,
        }
    }
}

// ── Shared state ────────────────────────────────────────────────────

const ROLE_NONE: u8 = 0;
const ROLE_PRIMARY: u8 = 1;
const ROLE_FALLBACK: u8 = 2;

/// State shared between the manager handle and one connection loop.
///
/// Each call to `connect` gets a fresh `LinkState`, so a retired loop can
/// never touch the state of its successor.
struct LinkState {
    status: AtomicU8,
    role: AtomicU8,
    intentionally_closed: AtomicBool,
}

impl LinkState {
    fn new(status: LinkStatus) -> Self {
        Self {
            status: AtomicU8::new(status as u8),
            role: AtomicU8::new(ROLE_NONE),
            intentionally_closed: AtomicBool::new(false),
        }
    }

    fn status(&self) -> LinkStatus {
        LinkStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: LinkStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    /// Move `Connecting → Open`. Fails if the owner closed in the meantime.
    fn open(&self, role: TargetRole) -> bool {
        let opened = self
            .status
            .compare_exchange(
                LinkStatus::Connecting as u8,
                LinkStatus::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if opened {
            let role = match role {
                TargetRole::Primary => ROLE_PRIMARY,
                TargetRole::Fallback => ROLE_FALLBACK,
            };
            self.role.store(role, Ordering::Release);
        }
        opened
    }

    fn role(&self) -> Option<TargetRole> {
        match self.role.load(Ordering::Acquire) {
            ROLE_PRIMARY => Some(TargetRole::Primary),
            ROLE_FALLBACK => Some(TargetRole::Fallback),
            _ => None,
        }
    }

    fn mark_intentionally_closed(&self) {
        self.intentionally_closed.store(true, Ordering::Release);
    }

    fn is_intentionally_closed(&self) -> bool {
        self.intentionally_closed.load(Ordering::Acquire)
    }
}

// ── Manager handle ──────────────────────────────────────────────────

/// Owns the simulation stream connection and its primary/fallback plan.
///
/// All methods except [`next_event`](Self::next_event) and
/// [`shutdown`](Self::shutdown) return immediately. Must be used from within
/// a Tokio runtime.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    targets: [ConnectionTarget; 2],
    connect_timeout: Duration,
    event_channel_capacity: usize,
    shutdown_timeout: Duration,
    link: Arc<LinkState>,
    /// Sender half of the outbound frame channel to the connection loop.
    cmd_tx: Option<mpsc::UnboundedSender<String>>,
    /// Receiver half of the event channel from the connection loop.
    event_rx: Option<mpsc::Receiver<ConnectionEvent>>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create an idle manager for the targets described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::InvalidTarget`] if the targets cannot be
    /// resolved (see [`SessionConfig::targets`]).
    pub fn new(connector: C, config: &SessionConfig) -> Result<Self> {
        Ok(Self {
            connector: Arc::new(connector),
            targets: config.targets()?,
            connect_timeout: config.connect_timeout,
            event_channel_capacity: config.event_channel_capacity.max(1),
            shutdown_timeout: config.shutdown_timeout,
            link: Arc::new(LinkState::new(LinkStatus::Idle)),
            cmd_tx: None,
            event_rx: None,
            task: None,
            shutdown_tx: None,
        })
    }

    /// Start connecting to the primary target.
    ///
    /// Does nothing (apart from a warning) while a connection is already
    /// connecting or open. After [`close`](Self::close) the old loop is
    /// aborted before a fresh plan starts, but the abort only takes effect
    /// the next time the runtime polls it. Call [`shutdown`](Self::shutdown)
    /// first to be sure the previous transport is gone.
    pub fn connect(&mut self) {
        let status = self.status();
        if matches!(status, LinkStatus::Connecting | LinkStatus::Open) {
            warn!(?status, "connect() called while a connection is active; ignoring");
            return;
        }

        self.retire();

        let link = Arc::new(LinkState::new(LinkStatus::Connecting));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<String>();
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(self.event_channel_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(connection_loop(
            Arc::clone(&self.connector),
            self.targets.clone(),
            self.connect_timeout,
            cmd_rx,
            event_tx,
            Arc::clone(&link),
            shutdown_rx,
        ));

        self.link = link;
        self.cmd_tx = Some(cmd_tx);
        self.event_rx = Some(event_rx);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Queue one text frame for the open transport. Fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::NotConnected`] unless the transport is open.
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        if self.status() != LinkStatus::Open {
            return Err(SimClientError::NotConnected);
        }
        let Some(cmd_tx) = &self.cmd_tx else {
            return Err(SimClientError::NotConnected);
        };
        cmd_tx
            .send(payload.into())
            .map_err(|_| SimClientError::NotConnected)
    }

    /// Close the connection. Idempotent and safe from any state.
    ///
    /// The intentionally-closed flag is set before anything else, so no
    /// failover attempt starts and no further event is delivered after this
    /// returns. The loop closes the transport in the background; use
    /// [`shutdown`](Self::shutdown) to wait for it.
    pub fn close(&mut self) {
        self.link.mark_intentionally_closed();
        self.event_rx = None;
        self.cmd_tx = None;
        if let Some(tx) = self.shutdown_tx.take() {
            debug!("connection close requested");
            let _ = tx.send(());
        }
        if self.status() != LinkStatus::Idle {
            self.link.set_status(LinkStatus::Closed);
        }
    }

    /// Close the connection and wait for the loop to finish.
    ///
    /// The loop is given the configured shutdown timeout to close the
    /// transport, after which it is aborted.
    pub async fn shutdown(&mut self) {
        self.close();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("connection loop aborted: {join_err}");
                    }
                }
            }
        }
    }

    /// Wait for the next lifecycle event.
    ///
    /// Returns `None` before [`connect`](Self::connect), after
    /// [`close`](Self::close), and once the loop has exited and every event
    /// has been delivered. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        let event_rx = self.event_rx.as_mut()?;
        let event = event_rx.recv().await;
        if self.link.is_intentionally_closed() {
            return None;
        }
        event
    }

    /// Current state of the transport.
    pub fn status(&self) -> LinkStatus {
        self.link.status()
    }

    /// Target of the transport that opened, if one did.
    pub fn active_role(&self) -> Option<TargetRole> {
        self.link.role()
    }

    /// The failover plan, in attempt order.
    pub fn targets(&self) -> &[ConnectionTarget; 2] {
        &self.targets
    }

    /// Stop the previous loop, if any, and drop its channels.
    fn retire(&mut self) {
        self.link.mark_intentionally_closed();
        self.cmd_tx = None;
        self.event_rx = None;
        self.shutdown_tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("status", &self.status())
            .field("active_role", &self.active_role())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        // No executor to drive a graceful close here; dropping the loop
        // future drops the transport with it.
        self.link.mark_intentionally_closed();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

/// Background loop: run the failover plan, then drive the open transport.
async fn connection_loop<C: Connector>(
    connector: Arc<C>,
    targets: [ConnectionTarget; 2],
    connect_timeout: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    link: Arc<LinkState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("connection loop started");

    let mut plan = targets.into_iter().peekable();
    while let Some(target) = plan.next() {
        let role = target.role;
        if link.is_intentionally_closed() {
            debug!(%role, "connection closed by owner, skipping attempt");
            return;
        }
        let will_fail_over = plan.peek().is_some();
        debug!(%role, url = %target.url, "attempting connection");

        let attempt = tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                debug!(%role, "shutdown requested during connection attempt");
                return;
            }
            result = tokio::time::timeout(connect_timeout, connector.connect(&target)) => {
                result.unwrap_or_else(|_elapsed| Err(SimClientError::Timeout))
            }
        };

        match attempt {
            Ok(mut transport) => {
                if !link.open(role) {
                    debug!(%role, "connection opened after close was requested; discarding");
                    let _ = transport.close().await;
                    return;
                }
                info!(%role, url = %target.url, "simulation stream open");
                emit(&event_tx, &link, ConnectionEvent::Opened { role }).await;
                drive_transport(
                    transport,
                    role,
                    &mut cmd_rx,
                    &event_tx,
                    &link,
                    &mut shutdown_rx,
                )
                .await;
                break;
            }
            Err(e) => {
                if link.is_intentionally_closed() {
                    return;
                }
                warn!(%role, url = %target.url, error = %e, will_fail_over, "connection closed before opening");
                if !will_fail_over {
                    link.set_status(LinkStatus::Closed);
                }
                let message = e.to_string();
                emit(
                    &event_tx,
                    &link,
                    ConnectionEvent::Errored {
                        role,
                        message: message.clone(),
                    },
                )
                .await;
                emit(
                    &event_tx,
                    &link,
                    ConnectionEvent::Closed {
                        role,
                        code: None,
                        reason: Some(message),
                        will_fail_over,
                    },
                )
                .await;
            }
        }
    }

    debug!("connection loop exited");
}

/// Multiplex outbound frames, inbound frames and shutdown on an open transport.
///
/// Returns when the transport closes, errors, or shutdown is requested.
async fn drive_transport<T: Transport>(
    mut transport: T,
    role: TargetRole,
    cmd_rx: &mut mpsc::UnboundedReceiver<String>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    link: &LinkState,
    shutdown_rx: &mut oneshot::Receiver<()>,
) {
    loop {
        if link.is_intentionally_closed() {
            debug!(%role, "connection closed by owner, closing transport");
            let _ = transport.close().await;
            link.set_status(LinkStatus::Closed);
            break;
        }
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(payload) => {
                        debug!(%role, %payload, "sending frame");
                        if let Err(e) = transport.send(payload).await {
                            error!(%role, "transport send error: {e}");
                            link.set_status(LinkStatus::Closed);
                            let _ = transport.close().await;
                            report_lost(event_tx, link, role, e.to_string()).await;
                            break;
                        }
                    }
                    // Command channel closed: the owner closed or retired us.
                    None => {
                        debug!(%role, "command channel closed, closing transport");
                        let _ = transport.close().await;
                        link.set_status(LinkStatus::Closed);
                        break;
                    }
                }
            }

            _ = &mut *shutdown_rx => {
                debug!(%role, "shutdown signal received");
                let _ = transport.close().await;
                link.set_status(LinkStatus::Closed);
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        emit(event_tx, link, ConnectionEvent::Message(text)).await;
                    }
                    Some(Err(e)) => {
                        error!(%role, "transport receive error: {e}");
                        link.set_status(LinkStatus::Closed);
                        report_lost(event_tx, link, role, e.to_string()).await;
                        break;
                    }
                    None => {
                        let close_info = transport.close_info();
                        info!(%role, ?close_info, "simulation stream closed by backend");
                        link.set_status(LinkStatus::Closed);
                        let (code, reason) = match close_info {
                            Some(info) => (
                                Some(info.code),
                                Some(info.reason).filter(|r| !r.is_empty()),
                            ),
                            None => (None, None),
                        };
                        emit(
                            event_tx,
                            link,
                            ConnectionEvent::Closed {
                                role,
                                code,
                                reason,
                                will_fail_over: false,
                            },
                        )
                        .await;
                        break;
                    }
                }
            }
        }
    }
}

/// Emit `Errored` then `Closed` for a transport that failed after opening.
async fn report_lost(
    event_tx: &mpsc::Sender<ConnectionEvent>,
    link: &LinkState,
    role: TargetRole,
    message: String,
) {
    emit(
        event_tx,
        link,
        ConnectionEvent::Errored {
            role,
            message: message.clone(),
        },
    )
    .await;
    emit(
        event_tx,
        link,
        ConnectionEvent::Closed {
            role,
            code: None,
            reason: Some(message),
            will_fail_over: false,
        },
    )
    .await;
}

/// Deliver an event to the owner.
///
/// Waits for channel capacity instead of dropping, so frames are never lost
/// or reordered. Nothing is delivered once the owner has closed.
async fn emit(event_tx: &mpsc::Sender<ConnectionEvent>, link: &LinkState, event: ConnectionEvent) {
    if link.is_intentionally_closed() {
        debug!(?event, "connection closed by owner, suppressing event");
        return;
    }
    if event_tx.send(event).await.is_err() {
        debug!("event channel closed, receiver dropped");
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
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    // ── Mock transport / connector ──────────────────────────────────

    /// A transport that replays scripted frames, then stays open.
    struct MockTransport {
        incoming: VecDeque<String>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, message: String) -> std::result::Result<(), SimClientError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, SimClientError>> {
            match self.incoming.pop_front() {
                Some(frame) => Some(Ok(frame)),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), SimClientError> {
            self.closed.store(true, Ordering::Relaxed);
            Ok(())
        }
    }

    /// Accepts every attempt with a fresh `MockTransport`, or refuses all.
    struct MockConnector {
        accept: bool,
        incoming: Vec<String>,
        attempts: Arc<StdMutex<Vec<TargetRole>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
    }

    impl MockConnector {
        fn new(accept: bool, incoming: Vec<&str>) -> Self {
            Self {
                accept,
                incoming: incoming.into_iter().map(String::from).collect(),
                attempts: Arc::default(),
                sent: Arc::default(),
                closed: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(
            &self,
            target: &ConnectionTarget,
        ) -> std::result::Result<MockTransport, SimClientError> {
            self.attempts.lock().unwrap().push(target.role);
            if !self.accept {
                return Err(SimClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            Ok(MockTransport {
                incoming: self.incoming.iter().cloned().collect(),
                sent: Arc::clone(&self.sent),
                closed: Arc::clone(&self.closed),
            })
        }
    }

    fn manager(connector: MockConnector) -> ConnectionManager<MockConnector> {
        ConnectionManager::new(connector, &SessionConfig::default()).unwrap()
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn send_before_connect_is_not_connected() {
        let manager = manager(MockConnector::new(true, vec![]));
        assert_eq!(manager.status(), LinkStatus::Idle);
        let err = manager.send("START").unwrap_err();
        assert!(matches!(err, SimClientError::NotConnected));
        assert_eq!(manager.status(), LinkStatus::Idle);
    }

    #[tokio::test]
    async fn open_then_messages_in_order() {
        let mut manager = manager(MockConnector::new(true, vec!["a", "b"]));
        manager.connect();

        assert_eq!(
            manager.next_event().await,
            Some(ConnectionEvent::Opened {
                role: TargetRole::Primary
            })
        );
        assert_eq!(
            manager.next_event().await,
            Some(ConnectionEvent::Message("a".into()))
        );
        assert_eq!(
            manager.next_event().await,
            Some(ConnectionEvent::Message("b".into()))
        );
        assert_eq!(manager.status(), LinkStatus::Open);
        assert_eq!(manager.active_role(), Some(TargetRole::Primary));

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn second_connect_while_active_is_ignored() {
        let connector = MockConnector::new(true, vec![]);
        let attempts = Arc::clone(&connector.attempts);
        let mut manager = manager(connector);

        manager.connect();
        manager.connect();
        assert!(matches!(
            manager.next_event().await,
            Some(ConnectionEvent::Opened { .. })
        ));
        manager.connect();

        assert_eq!(*attempts.lock().unwrap(), vec![TargetRole::Primary]);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn send_reaches_transport_once_open() {
        let connector = MockConnector::new(true, vec![]);
        let sent = Arc::clone(&connector.sent);
        let mut manager = manager(connector);
        manager.connect();
        let _ = manager.next_event().await; // Opened

        manager.send("START").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*sent.lock().unwrap(), vec!["START".to_string()]);

        manager.shutdown().await;
    }

    #[tokio::test]
    async fn refused_targets_fail_over_once() {
        let connector = MockConnector::new(false, vec![]);
        let attempts = Arc::clone(&connector.attempts);
        let mut manager = manager(connector);
        manager.connect();

        let mut closes = Vec::new();
        while let Some(event) = manager.next_event().await {
            if let ConnectionEvent::Closed {
                role,
                will_fail_over,
                ..
            } = event
            {
                closes.push((role, will_fail_over));
            }
        }

        assert_eq!(
            closes,
            vec![(TargetRole::Primary, true), (TargetRole::Fallback, false)]
        );
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![TargetRole::Primary, TargetRole::Fallback]
        );
        assert_eq!(manager.status(), LinkStatus::Closed);
        assert_eq!(manager.active_role(), None);
    }

    #[tokio::test]
    async fn shutdown_closes_transport_and_ends_events() {
        let connector = MockConnector::new(true, vec![]);
        let closed = Arc::clone(&connector.closed);
        let mut manager = manager(connector);
        manager.connect();
        let _ = manager.next_event().await; // Opened

        manager.shutdown().await;

        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(manager.status(), LinkStatus::Closed);
        assert!(manager.next_event().await.is_none());
        assert!(matches!(
            manager.send("START"),
            Err(SimClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_from_any_state() {
        let mut manager = manager(MockConnector::new(true, vec![]));
        manager.close();
        assert_eq!(manager.status(), LinkStatus::Idle);

        manager.connect();
        manager.close();
        manager.close();
        assert_eq!(manager.status(), LinkStatus::Closed);
        assert!(manager.next_event().await.is_none());
    }

    #[tokio::test]
    async fn connect_after_close_starts_a_fresh_plan() {
        let connector = MockConnector::new(true, vec![]);
        let attempts = Arc::clone(&connector.attempts);
        let mut manager = manager(connector);

        manager.connect();
        let _ = manager.next_event().await; // Opened
        manager.close();

        manager.connect();
        assert_eq!(
            manager.next_event().await,
            Some(ConnectionEvent::Opened {
                role: TargetRole::Primary
            })
        );
        assert_eq!(
            *attempts.lock().unwrap(),
            vec![TargetRole::Primary, TargetRole::Primary]
        );

        manager.shutdown().await;
    }

    #[test]
    fn link_status_round_trips_through_u8() {
        for status in [
            LinkStatus::Idle,
            LinkStatus::Connecting,
            LinkStatus::Open,
            LinkStatus::Closed,
        ] {
            assert_eq!(LinkStatus::from_u8(status as u8), status);
        }
    }
}
