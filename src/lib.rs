//! # Firewall Sim Client
//!
//! Streaming client for the firewall placement game's real-time infection
//! simulation.
//!
//! Players place firewall tokens on a network graph, then the backend runs a
//! breadth-first infection and streams each step back over a persistent
//! connection. This crate is the client side of that stream:
//!
//! - [`decoder`] classifies each inbound JSON frame
//! - [`ConnectionManager`] opens the stream, failing over once from the
//!   proxied primary endpoint to the direct fallback endpoint
//! - [`SimulationSession`] is the `Idle → Ready → Running → Complete | Error | Disconnected`
//!   state machine the rest of the UI reads from
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: default `transport-websocket` feature provides
//!   `WebSocketTransport` and `WebSocketConnector`
//! - **Observable**: watch state snapshots via [`SimulationSession::subscribe`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), firewall_sim_client::SimClientError> {
//! use firewall_sim_client::{SessionConfig, SimulationSession, StartOutcome, WebSocketConnector};
//!
//! let config = SessionConfig::new("http://localhost:5173");
//! let mut session = SimulationSession::new(WebSocketConnector::new(), config)?;
//!
//! if session.wait_until_ready().await && session.start() == StartOutcome::Started {
//!     let phase = session.run_to_completion().await;
//!     println!("finished as {phase} after {} steps", session.steps().len());
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use config::SessionConfig;
pub use connection::{ConnectionEvent, ConnectionManager, LinkStatus};
pub use decoder::{decode, DecodedEvent};
pub use error::SimClientError;
pub use protocol::{ConnectionTarget, NodeId, SimulationStep, TargetRole, START_COMMAND};
pub use session::{SessionState, SimulationPhase, SimulationSession, StartOutcome};
pub use transport::{CloseInfo, Connector, Transport};

#[cfg(feature = "transport-websocket")]
pub use transports::{WebSocketConnector, WebSocketTransport};
