//! Client configuration.

use std::time::Duration;

use cardlink_session::DEFAULT_SESSION_KEY;

/// Server the client connects to when none is configured.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:8080/ws";

/// How long a request may stay pending before it fails with a timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Pause after a failed connect attempt before trying again.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Settings for a [`GameClient`](crate::GameClient).
///
/// Build one with `ClientConfig::default()` and override the fields you
/// care about, or use [`GameClientBuilder`](crate::GameClientBuilder).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the game server.
    pub url: String,

    /// Per-request deadline. Also bounds how long an action waits for a
    /// session to open before giving up with `NotConnected`.
    pub request_timeout: Duration,

    /// Delay between failed connect attempts.
    ///
    /// A connection that was open and then closed is retried immediately;
    /// this only paces attempts that fail to connect at all.
    pub reconnect_delay: Duration,

    /// Key the session token is persisted under.
    pub session_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            session_key: DEFAULT_SESSION_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:8080/ws");
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.session_key, "isa_game_session_id");
    }
}
