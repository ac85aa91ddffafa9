//! Client configuration.

use std::time::Duration;

/// Tunables for the connection manager.
///
/// The defaults match the deployed server's expectations; the `with_*`
/// setters exist mostly so tests can shrink the timers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL, `ws://` or `wss://`.
    pub url: String,
    /// Reconnect attempts before giving up and entering the failed state.
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts. No backoff — the server
    /// expects clients back quickly after a restart.
    pub reconnect_delay: Duration,
    /// Application-level ping cadence. The server drops clients it has not
    /// heard from, so this stays well under the server's idle timeout.
    pub ping_interval: Duration,
    /// How long to wait for a pong before treating the connection as dead.
    /// `None` disables the check; the socket close is then the only liveness
    /// signal, which matches the original client.
    pub pong_timeout: Option<Duration>,
    /// Reconnect automatically after an unexpected close.
    pub auto_reconnect: bool,
    /// How long a logout frame gets to flush before the socket closes.
    pub logout_grace: Duration,
    /// How long login/register wait for the server's verdict.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a config for `url` with production defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(2),
            ping_interval: Duration::from_secs(30),
            pong_timeout: None,
            auto_reconnect: true,
            logout_grace: Duration::from_millis(100),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = Some(timeout);
        self
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_logout_grace(mut self, grace: Duration) -> Self {
        self.logout_grace = grace;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployed_server() {
        let config = ClientConfig::new("ws://localhost:8080");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.pong_timeout, None);
        assert!(config.auto_reconnect);
        assert_eq!(config.logout_grace, Duration::from_millis(100));
    }

    #[test]
    fn test_builder_setters_chain() {
        let config = ClientConfig::new("ws://localhost:8080")
            .with_max_reconnect_attempts(2)
            .with_reconnect_delay(Duration::from_millis(20))
            .with_pong_timeout(Duration::from_secs(5))
            .with_auto_reconnect(false);
        assert_eq!(config.max_reconnect_attempts, 2);
        assert_eq!(config.pong_timeout, Some(Duration::from_secs(5)));
        assert!(!config.auto_reconnect);
    }
}
