//! Session configuration and connection target resolution.

use std::time::Duration;

use url::Url;

use crate::error::{Result, SimClientError};
use crate::protocol::{ConnectionTarget, TargetRole, DEFAULT_SIMULATE_PATH};

/// Default origin of the page hosting the game (the dev server).
pub const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:5173";

/// Default direct-to-backend stream address.
pub const DEFAULT_FALLBACK_URL: &str = "ws://localhost:8000/api/ws/simulate";

/// Default capacity of the bounded event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default per-attempt connection deadline.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a [`SimulationSession`](crate::session::SimulationSession).
///
/// # Example
///
/// ```
/// use firewall_sim_client::config::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("https://game.example.com")
///     .with_fallback_url("wss://backend.example.com:8000/api/ws/simulate")
///     .with_connect_timeout(Duration::from_secs(2));
///
/// let [primary, fallback] = config.targets().unwrap();
/// assert_eq!(primary.url, "wss://game.example.com/api/ws/simulate");
/// assert_eq!(fallback.url, "wss://backend.example.com:8000/api/ws/simulate");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Origin of the page the client runs under. The primary target is the
    /// primary path resolved against it, with `http`/`https` upgraded to
    /// `ws`/`wss`.
    pub page_origin: String,
    /// Relative path routed through the reverse proxy.
    pub primary_path: String,
    /// Absolute `ws://` or `wss://` address of the backend itself.
    pub fallback_url: String,
    /// Deadline for a single connection attempt. An attempt that misses it
    /// counts as closed before opening.
    pub connect_timeout: Duration,
    /// Capacity of the bounded event channel.
    ///
    /// A full channel applies backpressure to the transport loop rather than
    /// dropping frames. Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
    /// Time the transport loop is given to close the transport on
    /// [`shutdown`](crate::connection::ConnectionManager::shutdown) before it
    /// is aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration for a page served from `page_origin`.
    pub fn new(page_origin: impl Into<String>) -> Self {
        Self {
            page_origin: page_origin.into(),
            primary_path: DEFAULT_SIMULATE_PATH.to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the proxied path of the primary target.
    #[must_use]
    pub fn with_primary_path(mut self, path: impl Into<String>) -> Self {
        self.primary_path = path.into();
        self
    }

    /// Set the absolute fallback address.
    #[must_use]
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    /// Set the per-attempt connection deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the capacity of the bounded event channel.
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Set the timeout for the graceful shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Resolve the failover plan: primary first, then fallback.
    ///
    /// # Errors
    ///
    /// Returns [`SimClientError::InvalidTarget`] if the page origin is not an
    /// `http`, `https`, `ws` or `wss` URL, or if the fallback is not an
    /// absolute `ws`/`wss` URL.
    pub fn targets(&self) -> Result<[ConnectionTarget; 2]> {
        let primary = resolve_primary(&self.page_origin, &self.primary_path)?;
        let fallback = resolve_fallback(&self.fallback_url)?;
        Ok([
            ConnectionTarget::new(primary, TargetRole::Primary),
            ConnectionTarget::new(fallback, TargetRole::Fallback),
        ])
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_ORIGIN)
    }
}

fn resolve_primary(origin: &str, path: &str) -> Result<String> {
    let mut base = Url::parse(origin)?;
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SimClientError::InvalidTarget(format!(
                "unsupported page origin scheme `{other}`"
            )))
        }
    };
    base.set_scheme(scheme).map_err(|()| {
        SimClientError::InvalidTarget(format!("cannot use `{scheme}` for origin {origin}"))
    })?;
    Ok(base.join(path)?.to_string())
}

fn resolve_fallback(url: &str) -> Result<String> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed.to_string()),
        other => Err(SimClientError::InvalidTarget(format!(
            "fallback must use ws or wss, got `{other}`"
        ))),
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
    fn config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.page_origin, DEFAULT_PAGE_ORIGIN);
        assert_eq!(config.primary_path, "/api/ws/simulate");
        assert_eq!(config.fallback_url, DEFAULT_FALLBACK_URL);
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn default_targets() {
        let [primary, fallback] = SessionConfig::default().targets().unwrap();
        assert_eq!(primary.role, TargetRole::Primary);
        assert_eq!(primary.url, "ws://localhost:5173/api/ws/simulate");
        assert_eq!(fallback.role, TargetRole::Fallback);
        assert_eq!(fallback.url, DEFAULT_FALLBACK_URL);
    }

    #[test]
    fn secure_page_gets_secure_primary() {
        let [primary, _] = SessionConfig::new("https://play.example.com/board?seed=3")
            .targets()
            .unwrap();
        assert_eq!(primary.url, "wss://play.example.com/api/ws/simulate");
    }

    #[test]
    fn websocket_origin_is_kept() {
        let [primary, _] = SessionConfig::new("ws://127.0.0.1:9000")
            .with_primary_path("/stream")
            .targets()
            .unwrap();
        assert_eq!(primary.url, "ws://127.0.0.1:9000/stream");
    }

    #[test]
    fn rejects_unsupported_origin() {
        let err = SessionConfig::new("file:///tmp/index.html")
            .targets()
            .unwrap_err();
        assert!(matches!(err, SimClientError::InvalidTarget(_)));
    }

    #[test]
    fn rejects_relative_or_http_fallback() {
        for fallback in ["/api/ws/simulate", "http://localhost:8000/api/ws/simulate"] {
            let err = SessionConfig::default()
                .with_fallback_url(fallback)
                .targets()
                .unwrap_err();
            assert!(matches!(err, SimClientError::InvalidTarget(_)), "{fallback}");
        }
    }

    #[test]
    fn event_channel_capacity_is_clamped() {
        let config = SessionConfig::default().with_event_channel_capacity(0);
        assert_eq!(config.event_channel_capacity, 1);
    }
}
