//! Configuration for the Lantern client

use std::time::Duration;

/// Configuration for a [`Client`](crate::Client).
///
/// The defaults match the backend's expectations; most callers only set
/// `url`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the messaging backend
    pub url: String,
    /// Automatic reconnect attempts before giving up
    pub max_retries: u32,
    /// Minimum enforced delay between consecutive connection attempts
    pub reconnect_cooldown: Duration,
    /// How long a connection attempt may take before it is abandoned
    pub connect_timeout: Duration,
    /// Default deadline for correlated requests
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8800".to_string(),
            max_retries: 3,
            reconnect_cooldown: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Config with the given URL and default tunables.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
