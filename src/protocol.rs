//! Wire-level types for the simulation stream.
//!
//! The backend speaks one JSON object per text frame. The client sends a
//! single literal command, [`START_COMMAND`], and receives step, completion,
//! and error frames in return. Classification of inbound frames lives in
//! [`decoder`](crate::decoder).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node in the network graph.
pub type NodeId = String;

/// The only command the simulation backend recognizes.
pub const START_COMMAND: &str = "START";

/// Path of the simulation stream on both the proxy and the backend.
pub const DEFAULT_SIMULATE_PATH: &str = "/api/ws/simulate";

/// One unit of simulation progress reported by the backend.
///
/// Created only by [`decode`](crate::decoder::decode) and never mutated after
/// that. Fields the client does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStep {
    /// Step index as reported by the backend.
    pub step: u64,
    /// Nodes the backend reported as infected for this step.
    #[serde(default)]
    pub infected_nodes: BTreeSet<NodeId>,
    /// Passthrough fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SimulationStep {
    /// Build a step with no passthrough fields.
    pub fn new<I, N>(step: u64, infected_nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<NodeId>,
    {
        Self {
            step,
            infected_nodes: infected_nodes.into_iter().map(Into::into).collect(),
            extra: serde_json::Map::new(),
        }
    }
}

// ── Connection targets ──────────────────────────────────────────────

/// Which of the two fixed endpoints a connection attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// Relative path routed through the page's reverse proxy.
    Primary,
    /// Absolute address pointing directly at the backend.
    Fallback,
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRole::Primary => f.write_str("primary"),
            TargetRole::Fallback => f.write_str("fallback"),
        }
    }
}

/// A resolved endpoint for the simulation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Absolute `ws://` or `wss://` URL.
    pub url: String,
    /// Role of this target in the failover plan.
    pub role: TargetRole,
}

impl ConnectionTarget {
    /// Create a target with the given URL and role.
    pub fn new(url: impl Into<String>, role: TargetRole) -> Self {
        Self {
            url: url.into(),
            role,
        }
    }
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

    #[test]
    fn step_serializes_passthrough_fields_inline() {
        let mut step = SimulationStep::new(3, ["B", "A"]);
        step.extra
            .insert("wave_size".into(), serde_json::Value::from(2));

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], 3);
        assert_eq!(json["infected_nodes"], serde_json::json!(["A", "B"]));
        assert_eq!(json["wave_size"], 2);
    }

    #[test]
    fn target_role_display() {
        assert_eq!(TargetRole::Primary.to_string(), "primary");
        assert_eq!(TargetRole::Fallback.to_string(), "fallback");
    }
}
