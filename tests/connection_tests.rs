#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for `ConnectionManager`.
//!
//! Uses the shared `ScriptedConnector` from `tests/common` to script each
//! connection attempt and checks the event sequence, the one-shot failover
//! and the guarantees around `close()`.

mod common;

use std::time::Duration;

use firewall_sim_client::{
    CloseInfo, ConnectionEvent, ConnectionManager, LinkStatus, SimClientError, TargetRole,
};

use common::{
    attempts_of, mock_pair, mock_pair_with_close, test_config, ConnectOutcome, ScriptedConnector,
    PROMPT,
};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

type Attempts = std::sync::Arc<std::sync::Mutex<Vec<TargetRole>>>;

fn manager(outcomes: Vec<ConnectOutcome>) -> (ConnectionManager<ScriptedConnector>, Attempts) {
    let (connector, attempts) = ScriptedConnector::new(outcomes);
    let manager = ConnectionManager::new(connector, &test_config()).unwrap();
    (manager, attempts)
}

async fn next(manager: &mut ConnectionManager<ScriptedConnector>) -> Option<ConnectionEvent> {
    tokio::time::timeout(PROMPT, manager.next_event())
        .await
        .expect("event should arrive")
}

/// Collect events until the manager has nothing more to deliver.
async fn drain(manager: &mut ConnectionManager<ScriptedConnector>) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Some(event) = next(manager).await {
        events.push(event);
    }
    events
}

// ════════════════════════════════════════════════════════════════════
// Targets
// ════════════════════════════════════════════════════════════════════

#[test]
fn targets_are_primary_then_fallback() {
    let (manager, _attempts) = manager(vec![]);
    let [primary, fallback] = manager.targets();
    assert_eq!(primary.role, TargetRole::Primary);
    assert_eq!(primary.url, "ws://localhost:5173/api/ws/simulate");
    assert_eq!(fallback.role, TargetRole::Fallback);
    assert_eq!(fallback.url, "ws://localhost:8000/api/ws/simulate");
}

#[test]
fn invalid_fallback_is_rejected_up_front() {
    let (connector, _attempts) = ScriptedConnector::new(vec![]);
    let config = test_config().with_fallback_url("localhost:8000/api/ws/simulate");
    let err = ConnectionManager::new(connector, &config).unwrap_err();
    assert!(matches!(err, SimClientError::InvalidTarget(_)), "{err}");
}

// ════════════════════════════════════════════════════════════════════
// send()
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn send_while_connecting_is_not_connected() {
    let (mut manager, _attempts) = manager(vec![ConnectOutcome::Hang]);
    manager.connect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(manager.status(), LinkStatus::Connecting);
    assert!(matches!(
        manager.send("START"),
        Err(SimClientError::NotConnected)
    ));
    manager.shutdown().await;
}

#[tokio::test]
async fn frames_are_sent_in_call_order() {
    let (transport, mut server) = mock_pair();
    let (mut manager, _attempts) = manager(vec![ConnectOutcome::Accept(transport)]);
    manager.connect();
    assert!(matches!(
        next(&mut manager).await,
        Some(ConnectionEvent::Opened { .. })
    ));

    manager.send("START").unwrap();
    manager.send("PING").unwrap();
    assert_eq!(server.next_sent().await.as_deref(), Some("START"));
    assert_eq!(server.next_sent().await.as_deref(), Some("PING"));

    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Event sequence
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn messages_arrive_verbatim_and_in_order() {
    let (transport, server) = mock_pair();
    let (mut manager, _attempts) = manager(vec![ConnectOutcome::Accept(transport)]);
    manager.connect();

    server.push("first");
    server.push(r#"{"step":0}"#);
    server.push("third");

    assert_eq!(
        next(&mut manager).await,
        Some(ConnectionEvent::Opened {
            role: TargetRole::Primary
        })
    );
    for expected in ["first", r#"{"step":0}"#, "third"] {
        assert_eq!(
            next(&mut manager).await,
            Some(ConnectionEvent::Message(expected.into()))
        );
    }
    manager.shutdown().await;
}

#[tokio::test]
async fn backend_close_reports_code_and_reason() {
    let (transport, mut server) = mock_pair_with_close(Some(CloseInfo {
        code: 1000,
        reason: "simulation finished".into(),
    }));
    let (mut manager, _attempts) = manager(vec![ConnectOutcome::Accept(transport)]);
    manager.connect();
    server.hang_up();

    let events = drain(&mut manager).await;
    assert_eq!(
        events,
        vec![
            ConnectionEvent::Opened {
                role: TargetRole::Primary
            },
            ConnectionEvent::Closed {
                role: TargetRole::Primary,
                code: Some(1000),
                reason: Some("simulation finished".into()),
                will_fail_over: false,
            },
        ]
    );
    assert_eq!(manager.status(), LinkStatus::Closed);
}

#[tokio::test]
async fn transport_error_is_followed_by_close() {
    let (transport, server) = mock_pair();
    let (mut manager, attempts) = manager(vec![ConnectOutcome::Accept(transport)]);
    manager.connect();
    server.fail("reset by peer");

    let events = drain(&mut manager).await;
    assert_eq!(events.len(), 3, "{events:?}");
    assert!(matches!(
        &events[1],
        ConnectionEvent::Errored { role: TargetRole::Primary, message } if message.contains("reset by peer")
    ));
    assert!(matches!(
        events[2],
        ConnectionEvent::Closed {
            role: TargetRole::Primary,
            will_fail_over: false,
            ..
        }
    ));
    // An opened primary never falls back.
    assert_eq!(attempts_of(&attempts), vec![TargetRole::Primary]);
}

// ════════════════════════════════════════════════════════════════════
// Failover
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refused_primary_then_open_fallback() {
    let (transport, _server) = mock_pair();
    let (mut manager, attempts) = manager(vec![
        ConnectOutcome::Refuse,
        ConnectOutcome::Accept(transport),
    ]);
    manager.connect();

    assert!(matches!(
        next(&mut manager).await,
        Some(ConnectionEvent::Errored {
            role: TargetRole::Primary,
            ..
        })
    ));
    assert!(matches!(
        next(&mut manager).await,
        Some(ConnectionEvent::Closed {
            role: TargetRole::Primary,
            will_fail_over: true,
            ..
        })
    ));
    assert_eq!(
        next(&mut manager).await,
        Some(ConnectionEvent::Opened {
            role: TargetRole::Fallback
        })
    );
    assert_eq!(manager.active_role(), Some(TargetRole::Fallback));
    assert_eq!(
        attempts_of(&attempts),
        vec![TargetRole::Primary, TargetRole::Fallback]
    );
    manager.shutdown().await;
}

#[tokio::test]
async fn fallback_is_attempted_at_most_once() {
    let (spare, _spare_server) = mock_pair();
    let (mut manager, attempts) = manager(vec![
        ConnectOutcome::Refuse,
        ConnectOutcome::Refuse,
        ConnectOutcome::Accept(spare),
    ]);
    manager.connect();

    let closes: Vec<_> = drain(&mut manager)
        .await
        .into_iter()
        .filter_map(|event| match event {
            ConnectionEvent::Closed {
                role,
                will_fail_over,
                ..
            } => Some((role, will_fail_over)),
            _ => None,
        })
        .collect();
    assert_eq!(
        closes,
        vec![(TargetRole::Primary, true), (TargetRole::Fallback, false)]
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        attempts_of(&attempts),
        vec![TargetRole::Primary, TargetRole::Fallback]
    );
    assert_eq!(manager.status(), LinkStatus::Closed);
}

#[tokio::test]
async fn slow_primary_times_out_into_fallback() {
    let (transport, _server) = mock_pair();
    let (connector, attempts) = ScriptedConnector::new(vec![
        ConnectOutcome::Hang,
        ConnectOutcome::Accept(transport),
    ]);
    let config = test_config().with_connect_timeout(Duration::from_millis(50));
    let mut manager = ConnectionManager::new(connector, &config).unwrap();
    manager.connect();

    assert!(matches!(
        next(&mut manager).await,
        Some(ConnectionEvent::Errored { role: TargetRole::Primary, message })
            if message == SimClientError::Timeout.to_string()
    ));
    let _ = next(&mut manager).await; // Closed (will_fail_over)
    assert_eq!(
        next(&mut manager).await,
        Some(ConnectionEvent::Opened {
            role: TargetRole::Fallback
        })
    );
    assert_eq!(attempts_of(&attempts).len(), 2);
    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// close()
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn close_during_primary_attempt_suppresses_fallback() {
    let (gate_tx, gate_rx) = tokio::sync::oneshot::channel();
    let (spare, _spare_server) = mock_pair();
    let (mut manager, attempts) = manager(vec![
        ConnectOutcome::RefuseAfter(gate_rx),
        ConnectOutcome::Accept(spare),
    ]);
    manager.connect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    manager.close();
    let _ = gate_tx.send(());
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(manager.next_event().await.is_none());
    assert_eq!(attempts_of(&attempts), vec![TargetRole::Primary]);
    assert_eq!(manager.status(), LinkStatus::Closed);
    assert_eq!(manager.active_role(), None);
}

#[tokio::test]
async fn close_between_primary_failure_events_suppresses_fallback() {
    for _ in 0..50 {
        let (connector, attempts) =
            ScriptedConnector::new(vec![ConnectOutcome::Refuse, ConnectOutcome::Hang]);
        let config = test_config().with_event_channel_capacity(1);
        let mut manager = ConnectionManager::new(connector, &config).unwrap();
        manager.connect();

        assert!(matches!(
            next(&mut manager).await,
            Some(ConnectionEvent::Errored {
                role: TargetRole::Primary,
                ..
            })
        ));
        // The primary's `Closed` event is still pending in the loop.
        manager.close();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(attempts_of(&attempts), vec![TargetRole::Primary]);
        assert!(manager.next_event().await.is_none());
        manager.shutdown().await;
    }
}

#[tokio::test]
async fn shutdown_closes_open_transport() {
    let (transport, server) = mock_pair();
    let (mut manager, _attempts) = manager(vec![ConnectOutcome::Accept(transport)]);
    manager.connect();
    let _ = next(&mut manager).await; // Opened

    manager.shutdown().await;
    assert!(server.client_closed());
    assert!(manager.next_event().await.is_none());
    assert!(matches!(
        manager.send("START"),
        Err(SimClientError::NotConnected)
    ));
}

#[tokio::test]
async fn shutdown_without_connect_is_harmless() {
    let (mut manager, attempts) = manager(vec![]);
    manager.shutdown().await;
    assert_eq!(manager.status(), LinkStatus::Idle);
    assert!(attempts_of(&attempts).is_empty());
}
