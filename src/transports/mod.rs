//! Transport implementations for the simulation stream.
//!
//! | Feature                | Transport              | Connector              |
//! |------------------------|------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] | [`WebSocketConnector`] |
//!
//! # Example
//!
//! ```rust,ignore
//! # async fn example() -> Result<(), firewall_sim_client::SimClientError> {
//! use firewall_sim_client::{Transport, WebSocketTransport};
//!
//! let mut ws = WebSocketTransport::connect("ws://localhost:8000/api/ws/simulate").await?;
//! ws.send("START".to_string()).await?;
//!
//! while let Some(Ok(frame)) = ws.recv().await {
//!     println!("backend said: {frame}");
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::{WebSocketConnector, WebSocketTransport};
