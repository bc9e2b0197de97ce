//! Relay configuration from environment.

use std::time::Duration;

/// Encoder cadence and suspension-point bounds for one relay session.
///
/// Every asynchronous step of a session (transport open, token round trip,
/// stream acquisition, encoder-stop drain) is bounded by one of these
/// durations; expiry drives the session to its failed state instead of
/// stalling silently.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host the consumer endpoint listens on. The port always comes from
    /// the activation message.
    pub consumer_host: String,
    /// Encoder chunk cadence.
    pub chunk_interval: Duration,
    /// Bound on the transport open.
    pub connect_timeout: Duration,
    /// Bound on the mediator token round trip.
    pub token_timeout: Duration,
    /// Bound on stream acquisition.
    pub acquire_timeout: Duration,
    /// Bound on the encoder-stop drain during teardown.
    pub stop_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            consumer_host: "localhost".into(),
            chunk_interval: Duration::from_millis(41),
            connect_timeout: Duration::from_secs(5),
            token_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(10),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            consumer_host: std::env::var("TABCAST_HOST")
                .unwrap_or(defaults.consumer_host),
            chunk_interval: env_ms("TABCAST_CHUNK_INTERVAL_MS", defaults.chunk_interval),
            connect_timeout: env_ms("TABCAST_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            token_timeout: env_ms("TABCAST_TOKEN_TIMEOUT_MS", defaults.token_timeout),
            acquire_timeout: env_ms("TABCAST_ACQUIRE_TIMEOUT_MS", defaults.acquire_timeout),
            stop_timeout: env_ms("TABCAST_STOP_TIMEOUT_MS", defaults.stop_timeout),
        }
    }
}

fn env_ms(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.consumer_host, "localhost");
        assert_eq!(config.chunk_interval, Duration::from_millis(41));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_ms_fallback() {
        // Unset variable falls back to the default.
        let d = env_ms("TABCAST_TEST_UNSET_INTERVAL", Duration::from_millis(7));
        assert_eq!(d, Duration::from_millis(7));
    }
}
