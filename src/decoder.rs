//! Classification of inbound simulation frames.
//!
//! [`decode`] turns one raw text frame into a [`DecodedEvent`]. It is a pure
//! function: no shared state, no side effects, and it never fails. Input that
//! cannot be parsed comes back as [`DecodedEvent::Malformed`] and input that
//! parses but matches no known shape comes back as
//! [`DecodedEvent::Unrecognized`]; the caller decides how to log either.
//!
//! Classification order:
//!
//! 1. `status` is the completion marker → [`DecodedEvent::Completion`]
//! 2. `step` is present → [`DecodedEvent::Step`]
//! 3. `status` is `"error"` → [`DecodedEvent::Error`]
//! 4. anything else → [`DecodedEvent::Unrecognized`]

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::protocol::{NodeId, SimulationStep};

/// Completion marker after normalization (see [`is_completion_marker`]).
const COMPLETION_MARKER: &str = "simulation complete";

/// Bare completion marker some backend builds emit.
const SHORT_COMPLETION_MARKER: &str = "complete";

/// Error status marker, compared ignoring ASCII case.
const ERROR_MARKER: &str = "error";

/// Message used when an error frame carries no usable `message`.
const DEFAULT_ERROR_MESSAGE: &str = "simulation reported an error";

/// Field names for the infected node list, in lookup order.
const INFECTED_KEYS: [&str; 2] = ["infected_nodes", "newly_infected"];

/// The classification of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// The backend finished the simulation run.
    Completion,
    /// One simulation step.
    Step(SimulationStep),
    /// The backend reported a failure.
    Error {
        /// Backend-provided description.
        message: String,
    },
    /// Valid JSON that matches no known frame shape.
    Unrecognized {
        /// The frame as received.
        raw: String,
    },
    /// The frame could not be parsed or failed validation.
    Malformed {
        /// Why the frame was rejected.
        reason: String,
    },
}

impl DecodedEvent {
    fn malformed(reason: impl Into<String>) -> Self {
        DecodedEvent::Malformed {
            reason: reason.into(),
        }
    }
}

/// Classify a single raw text frame.
///
/// # Example
///
/// ```
/// use firewall_sim_client::decoder::{decode, DecodedEvent};
///
/// match decode(r#"{"step":0,"infected_nodes":["A"]}"#) {
///     DecodedEvent::Step(step) => assert_eq!(step.step, 0),
///     other => panic!("unexpected {other:?}"),
/// }
/// assert_eq!(
///     decode(r#"{"status":"Simulation_Complete"}"#),
///     DecodedEvent::Completion
/// );
/// ```
pub fn decode(raw: &str) -> DecodedEvent {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => return DecodedEvent::malformed(format!("invalid JSON: {e}")),
    };

    let Value::Object(mut fields) = value else {
        return DecodedEvent::Unrecognized {
            raw: raw.to_owned(),
        };
    };

    let status = fields
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_owned);

    if status.as_deref().is_some_and(is_completion_marker) {
        return DecodedEvent::Completion;
    }

    if let Some(step) = fields.remove("step") {
        return match decode_step(step, fields) {
            Ok(step) => DecodedEvent::Step(step),
            Err(reason) => DecodedEvent::Malformed { reason },
        };
    }

    if status
        .as_deref()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(ERROR_MARKER))
    {
        let message = fields
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_owned();
        return DecodedEvent::Error { message };
    }

    DecodedEvent::Unrecognized {
        raw: raw.to_owned(),
    }
}

/// Returns `true` if `status` names the end of a simulation run.
///
/// Case, surrounding whitespace, and `_`/`-` separators are ignored, so
/// `"Simulation_Complete"`, `"simulation complete"` and `"SIMULATION-COMPLETE"`
/// all match, as does the bare `"complete"`.
fn is_completion_marker(status: &str) -> bool {
    let normalized = status
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    normalized == COMPLETION_MARKER || normalized == SHORT_COMPLETION_MARKER
}

fn decode_step(
    step: Value,
    mut fields: Map<String, Value>,
) -> std::result::Result<SimulationStep, String> {
    let step = match &step {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| format!("step index must be a non-negative integer, got {n}"))?,
        other => return Err(format!("step index must be a number, got {other}")),
    };

    let mut infected_nodes = BTreeSet::new();
    for key in INFECTED_KEYS {
        if let Some(nodes) = fields.remove(key) {
            infected_nodes = decode_nodes(key, nodes)?;
            break;
        }
    }

    Ok(SimulationStep {
        step,
        infected_nodes,
        extra: fields,
    })
}

fn decode_nodes(key: &str, nodes: Value) -> std::result::Result<BTreeSet<NodeId>, String> {
    let Value::Array(items) = nodes else {
        return Err(format!("`{key}` must be an array"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(id) => Ok(id),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            other => Err(format!("`{key}` contains a non-id element: {other}")),
        })
        .collect()
}

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

    fn expect_step(raw: &str) -> SimulationStep {
        match decode(raw) {
            DecodedEvent::Step(step) => step,
            other => panic!("expected Step for {raw}, got {other:?}"),
        }
    }

    #[test]
    fn completion_marker_variants() {
        for raw in [
            r#"{"status":"Simulation_Complete"}"#,
            r#"{"status":"simulation complete"}"#,
            r#"{"status":"SIMULATION-COMPLETE"}"#,
            r#"{"status":"  simulation   complete "}"#,
            r#"{"status":"complete"}"#,
        ] {
            assert_eq!(decode(raw), DecodedEvent::Completion, "{raw}");
        }
    }

    #[test]
    fn completion_wins_over_step() {
        let raw = r#"{"status":"Simulation_Complete","step":4}"#;
        assert_eq!(decode(raw), DecodedEvent::Completion);
    }

    #[test]
    fn step_wins_over_error_status() {
        let step = expect_step(r#"{"status":"ERROR","step":2}"#);
        assert_eq!(step.step, 2);
        assert_eq!(step.extra["status"], "ERROR");
    }

    #[test]
    fn step_without_nodes_defaults_to_empty() {
        let step = expect_step(r#"{"step":0}"#);
        assert!(step.infected_nodes.is_empty());
    }

    #[test]
    fn step_accepts_newly_infected_alias_and_integer_ids() {
        let step = expect_step(r#"{"step":1,"newly_infected":[7,"B"]}"#);
        let nodes: Vec<_> = step.infected_nodes.iter().map(String::as_str).collect();
        assert_eq!(nodes, vec!["7", "B"]);
        assert!(step.extra.is_empty());
    }

    #[test]
    fn step_keeps_passthrough_fields() {
        let step = expect_step(r#"{"step":5,"infected_nodes":[],"elapsed_ms":750}"#);
        assert_eq!(step.extra["elapsed_ms"], 750);
        assert!(!step.extra.contains_key("step"));
        assert!(!step.extra.contains_key("infected_nodes"));
    }

    #[test]
    fn invalid_step_values_are_malformed() {
        for raw in [
            r#"{"step":-1}"#,
            r#"{"step":1.5}"#,
            r#"{"step":"3"}"#,
            r#"{"step":null}"#,
            r#"{"step":1,"infected_nodes":"A"}"#,
            r#"{"step":1,"infected_nodes":[{"id":"A"}]}"#,
        ] {
            assert!(
                matches!(decode(raw), DecodedEvent::Malformed { .. }),
                "{raw} should be malformed"
            );
        }
    }

    #[test]
    fn error_frame_carries_message() {
        assert_eq!(
            decode(r#"{"status":"ERROR","message":"boom"}"#),
            DecodedEvent::Error {
                message: "boom".into()
            }
        );
        assert_eq!(
            decode(r#"{"status":"error"}"#),
            DecodedEvent::Error {
                message: DEFAULT_ERROR_MESSAGE.into()
            }
        );
    }

    #[test]
    fn unknown_shapes_are_unrecognized() {
        for raw in [r#"{"status":"running"}"#, r#"{}"#, "[1,2,3]", "42"] {
            assert_eq!(
                decode(raw),
                DecodedEvent::Unrecognized { raw: raw.into() },
                "{raw}"
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            decode("not json {"),
            DecodedEvent::Malformed { .. }
        ));
        assert!(matches!(decode(""), DecodedEvent::Malformed { .. }));
    }

    #[test]
    fn decode_is_deterministic() {
        let raw = r#"{"step":1,"infected_nodes":["A","B"]}"#;
        assert_eq!(decode(raw), decode(raw));
    }
}
