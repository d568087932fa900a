//! Error types for the simulation streaming client.

use thiserror::Error;

/// Errors that can occur when using the simulation client.
///
/// Most lifecycle failures never reach the caller as an `Err`: the session
/// folds them into a [`SimulationPhase`](crate::session::SimulationPhase) plus
/// an optional message. These variants surface from construction and from
/// the low-level [`ConnectionManager`](crate::connection::ConnectionManager).
#[derive(Debug, Error)]
pub enum SimClientError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was already closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Attempted to send while no transport is open.
    #[error("cannot send: socket not ready")]
    NotConnected,

    /// A configured connection target could not be resolved to a usable URL.
    #[error("invalid connection target: {0}")]
    InvalidTarget(String),

    /// A connection attempt did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<url::ParseError> for SimClientError {
    fn from(e: url::ParseError) -> Self {
        SimClientError::InvalidTarget(e.to_string())
    }
}

/// A specialized [`Result`] type for simulation client operations.
pub type Result<T> = std::result::Result<T, SimClientError>;
