#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the simulation stream.
//!
//! Feeds frames shaped exactly like the backend's output through `decode` and
//! checks the serialized form of the types presentation code consumes.

use firewall_sim_client::decoder::{decode, DecodedEvent};
use firewall_sim_client::{SessionState, SimulationPhase, SimulationStep, START_COMMAND};

// ════════════════════════════════════════════════════════════════════
// Backend fixtures
// ════════════════════════════════════════════════════════════════════

/// A full run as the backend streams it: start node, then each wave.
const BACKEND_RUN: [&str; 4] = [
    r#"{"step": 0, "newly_infected": ["router-1"]}"#,
    r#"{"step": 1, "newly_infected": ["db-1", "web-2"]}"#,
    r#"{"step": 2, "newly_infected": []}"#,
    r#"{"status": "complete"}"#,
];

#[test]
fn backend_run_decodes_to_steps_then_completion() {
    let events: Vec<DecodedEvent> = BACKEND_RUN.iter().copied().map(decode).collect();

    assert_eq!(
        events,
        vec![
            DecodedEvent::Step(SimulationStep::new(0, ["router-1"])),
            DecodedEvent::Step(SimulationStep::new(1, ["db-1", "web-2"])),
            DecodedEvent::Step(SimulationStep::new(2, Vec::<String>::new())),
            DecodedEvent::Completion,
        ]
    );
}

#[test]
fn backend_rejects_run_without_game() {
    assert_eq!(
        decode(r#"{"status": "error", "message": "No active game."}"#),
        DecodedEvent::Error {
            message: "No active game.".into()
        }
    );
}

#[test]
fn canonical_frames() {
    assert_eq!(
        decode(r#"{"step":3,"infected_nodes":["A","B","C"]}"#),
        DecodedEvent::Step(SimulationStep::new(3, ["A", "B", "C"]))
    );
    assert_eq!(
        decode(r#"{"status":"Simulation_Complete"}"#),
        DecodedEvent::Completion
    );
    assert_eq!(
        decode(r#"{"status":"ERROR","message":"graph not found"}"#),
        DecodedEvent::Error {
            message: "graph not found".into()
        }
    );
}

#[test]
fn duplicate_node_ids_collapse() {
    let DecodedEvent::Step(step) = decode(r#"{"step":0,"infected_nodes":["A","A","B"]}"#) else {
        panic!("expected a step");
    };
    assert_eq!(step.infected_nodes.len(), 2);
}

#[test]
fn start_command_is_the_bare_literal() {
    assert_eq!(START_COMMAND, "START");
}

// ════════════════════════════════════════════════════════════════════
// Serialized state
// ════════════════════════════════════════════════════════════════════

#[test]
fn step_serializes_with_passthrough_fields() {
    let DecodedEvent::Step(step) = decode(r#"{"step":1,"infected_nodes":["B","A"],"t":0.75}"#)
    else {
        panic!("expected a step");
    };
    let json = serde_json::to_value(&step).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "step": 1, "infected_nodes": ["A", "B"], "t": 0.75 })
    );
}

#[test]
fn session_state_serializes_for_presentation() {
    let state = SessionState {
        phase: SimulationPhase::Disconnected,
        steps: vec![SimulationStep::new(0, ["A"])],
        last_error: Some("connection closed".into()),
        ignored_frames: 2,
    };
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["phase"], "disconnected");
    assert_eq!(json["steps"][0]["infected_nodes"], serde_json::json!(["A"]));
    assert_eq!(json["last_error"], "connection closed");
    assert_eq!(json["ignored_frames"], 2);
}
