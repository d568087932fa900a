//! Transport abstraction for the simulation stream.
//!
//! The [`Transport`] trait is a bidirectional text frame channel between the
//! client and the simulation backend. The [`Connector`] trait establishes a
//! transport for a given [`ConnectionTarget`]; it is the seam the
//! [`ConnectionManager`](crate::connection::ConnectionManager) uses to run its
//! primary/fallback plan, and the place to inject fakes in tests.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use firewall_sim_client::error::SimClientError;
//! use firewall_sim_client::protocol::ConnectionTarget;
//! use firewall_sim_client::transport::{Connector, Transport};
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, message: String) -> Result<(), SimClientError> {
//!         // Write one text frame
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, SimClientError>> {
//!         // Read the next text frame, `None` once the peer closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), SimClientError> {
//!         todo!()
//!     }
//! }
//!
//! struct MyConnector;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     type Transport = MyTransport;
//!
//!     async fn connect(&self, target: &ConnectionTarget) -> Result<MyTransport, SimClientError> {
//!         // Open a connection to `target.url`
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::SimClientError;
use crate::protocol::ConnectionTarget;

/// Close code and reason sent by the peer when it closed the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Numeric close code (e.g. `1000` for a normal closure).
    pub code: u16,
    /// Free-form reason, possibly empty.
    pub reason: String,
}

/// A bidirectional text frame transport.
///
/// Each call to [`send`](Transport::send) transmits one complete frame and
/// each call to [`recv`](Transport::recv) returns one complete frame.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method **MUST** be cancel-safe because it is used
/// inside `tokio::select!`. If `recv` is cancelled before completion, calling it
/// again must not lose data. Channel-based implementations (e.g., wrapping
/// `mpsc::Receiver`) are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame to the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::TransportSend`] if the frame could not be sent,
    /// or [`SimClientError::TransportClosed`] after [`close`](Transport::close).
    async fn send(&mut self, message: String) -> Result<(), SimClientError>;

    /// Receive the next text frame from the backend.
    ///
    /// Returns:
    /// - `Some(Ok(text))`: a complete frame was received
    /// - `Some(Err(e))`: a transport error occurred
    /// - `None`: the connection was closed cleanly by the backend
    async fn recv(&mut self) -> Option<Result<String, SimClientError>>;

    /// Close the transport connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the graceful shutdown fails. Implementations should
    /// still release resources even if the close handshake fails.
    async fn close(&mut self) -> Result<(), SimClientError>;

    /// The close code and reason the peer sent, once [`recv`](Transport::recv)
    /// has returned `None`. Transports without close frames return `None`.
    fn close_info(&self) -> Option<CloseInfo> {
        None
    }
}

/// Establishes a [`Transport`] to a [`ConnectionTarget`].
///
/// An `Err` means the connection closed before it ever opened; the
/// [`ConnectionManager`](crate::connection::ConnectionManager) decides
/// whether to fail over.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport produced on success.
    type Transport: Transport;

    /// Open a connection to `target`.
    ///
    /// # Errors
    ///
    /// Any [`SimClientError`] describing why the target could not be reached.
    async fn connect(&self, target: &ConnectionTarget) -> Result<Self::Transport, SimClientError>;
}
