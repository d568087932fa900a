//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport`] carries the simulation stream over a WebSocket
//! connection; both `ws://` and `wss://` URLs are supported, with TLS handled
//! via [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream).
//! [`WebSocketConnector`] plugs it into the primary/fallback plan of the
//! [`ConnectionManager`](crate::connection::ConnectionManager).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is enabled
//! (it is enabled by default).

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::SimClientError;
use crate::protocol::ConnectionTarget;
use crate::transport::{CloseInfo, Connector, Transport};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// The simulation stream over one WebSocket connection.
///
/// Only text frames reach the caller. When the backend sends a close frame
/// the stream ends and the frame's code and reason are kept for
/// [`close_info`](Transport::close_info). `recv` is cancel-safe: the
/// underlying stream buffers partially read frames.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
    close_info: Option<CloseInfo>,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::Io`] if the URL is invalid or the handshake
    /// fails. I/O error kinds (e.g. `ConnectionRefused`) are preserved.
    pub async fn connect(url: &str) -> Result<Self, SimClientError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(handshake_error)?;
        tracing::debug!(%url, "WebSocket handshake complete");
        Ok(Self {
            stream,
            closed: false,
            close_info: None,
        })
    }

    fn record_close(&mut self, frame: Option<CloseFrame>) {
        tracing::debug!(?frame, "backend closed the simulation stream");
        self.close_info = frame.map(|f| CloseInfo {
            code: u16::from(f.code),
            reason: f.reason.as_str().to_owned(),
        });
    }
}

fn handshake_error(e: WsError) -> SimClientError {
    let kind = match &e {
        WsError::Io(io) => io.kind(),
        _ => std::io::ErrorKind::Other,
    };
    SimClientError::Io(std::io::Error::new(kind, e))
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, message: String) -> Result<(), SimClientError> {
        if self.closed {
            return Err(SimClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(message.into()))
            .await
            .map_err(|e| SimClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, SimClientError>> {
        while let Some(next) = self.stream.next().await {
            match next {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    self.record_close(frame);
                    return None;
                }
                Ok(Message::Binary(bytes)) => {
                    tracing::warn!(
                        len = bytes.len(),
                        "binary frame on simulation stream ignored"
                    );
                }
                // Control frames; tungstenite answers pings itself.
                Ok(_) => {}
                Err(e) => return Some(Err(SimClientError::TransportReceive(e.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), SimClientError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| SimClientError::TransportSend(e.to_string()))
    }

    fn close_info(&self) -> Option<CloseInfo> {
        self.close_info.clone()
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// A [`Connector`] that opens a [`WebSocketTransport`] to each target's URL.
///
/// Attempt deadlines are enforced by the connection manager; set
/// `handshake_timeout` to bound the WebSocket handshake on its own.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    handshake_timeout: Option<Duration>,
}

impl WebSocketConnector {
    /// Create a connector with no handshake deadline of its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each WebSocket handshake by `timeout`.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<WebSocketTransport, SimClientError> {
        tracing::debug!(role = %target.role, url = %target.url, "opening WebSocket target");
        let handshake = WebSocketTransport::connect(&target.url);
        match self.handshake_timeout {
            Some(timeout) => tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| SimClientError::Timeout)?,
            None => handshake.await,
        }
    }
}

#[cfg(test)]
#[cfg(feature = "transport-websocket")]
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
    use crate::protocol::TargetRole;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let err = WebSocketTransport::connect("not-a-valid-url")
            .await
            .unwrap_err();
        assert!(matches!(err, SimClientError::Io(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let err = WebSocketTransport::connect("ws://127.0.0.1:1")
            .await
            .unwrap_err();
        assert!(matches!(err, SimClientError::Io(_)));
    }

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/api/ws/simulate")
    }

    #[tokio::test]
    async fn recv_receives_frames_in_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"step":0}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"step":1}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), r#"{"step":0}"#);
        assert_eq!(transport.recv().await.unwrap().unwrap(), r#"{"step":1}"#);
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text("after_binary".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "after_binary");
    }

    #[tokio::test]
    async fn close_frame_is_recorded() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "simulation finished".into(),
            }))
            .await
            .unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert!(transport.close_info().is_none());
        assert!(transport.recv().await.is_none());

        let info = transport.close_info().unwrap();
        assert_eq!(info.code, 1000);
        assert_eq!(info.reason, "simulation finished");
    }

    #[tokio::test]
    async fn start_command_reaches_server() {
        let (seen_tx, seen_rx) = tokio::sync::oneshot::channel();
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("START".to_string()).await.unwrap();
        assert_eq!(seen_rx.await.unwrap(), "START");
    }

    #[tokio::test]
    async fn send_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        // Second close is a no-op.
        transport.close().await.unwrap();

        let err = transport.send("START".to_string()).await.unwrap_err();
        assert!(matches!(err, SimClientError::TransportClosed));
    }

    #[tokio::test]
    async fn connector_handshake_timeout_is_enforced() {
        // Accepts TCP but never answers the WebSocket handshake.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let connector =
            WebSocketConnector::new().with_handshake_timeout(Duration::from_millis(50));
        let url = format!("ws://{addr}/api/ws/simulate");
        let target = ConnectionTarget::new(url, TargetRole::Primary);
        let err = connector.connect(&target).await.unwrap_err();
        assert!(matches!(err, SimClientError::Timeout));
    }

    #[tokio::test]
    async fn connector_opens_target_url() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"{"status":"Simulation_Complete"}"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let connector = WebSocketConnector::new().with_handshake_timeout(Duration::from_secs(5));
        let target = ConnectionTarget::new(url, TargetRole::Fallback);
        let mut transport = connector.connect(&target).await.unwrap();
        assert_eq!(
            transport.recv().await.unwrap().unwrap(),
            r#"{"status":"Simulation_Complete"}"#
        );
    }
}
