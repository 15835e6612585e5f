//! Configuration and event types for the realtime database stream.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for streaming a Firebase-compatible realtime database.
#[derive(Clone)]
pub struct RealtimeConfig {
    /// Database root, e.g. `https://encore-default-rtdb.firebaseio.com`.
    pub database_url: String,
    /// Optional database auth token, sent as the `auth` query parameter.
    pub auth_token: Option<String>,
    /// Seconds to wait for the stream (or a one-time read) to respond.
    pub connect_timeout_secs: u64,
    /// Reconnect base delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("database_url", &self.database_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_delay_secs", &self.max_reconnect_delay_secs)
            .finish()
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            connect_timeout_secs: 15,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl RealtimeConfig {
    /// REST URL for `path`: `{database_url}/{path}.json[?auth=token]`.
    pub(crate) fn rest_url(&self, path: &str) -> String {
        let base = self.database_url.trim_end_matches('/');
        let path = path.trim_matches('/');
        let mut url = if path.is_empty() {
            format!("{base}/.json")
        } else {
            format!("{base}/{path}.json")
        };
        if let Some(token) = self.auth_token.as_deref().filter(|t| !t.is_empty()) {
            url.push_str("?auth=");
            url.push_str(token);
        }
        url
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events delivered to a single path listener.
///
/// `path` in `Put`/`Patch` is relative to the listened path; `/` means
/// the listened location itself.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Stream opened. A `Put` at `/` with the full current value follows.
    Connected,
    /// Replace the value at `path`. `Null` deletes it.
    Put {
        path: String,
        data: serde_json::Value,
    },
    /// Merge each child of `data` into the value at `path`.
    Patch {
        path: String,
        data: serde_json::Value,
    },
    /// The server stopped the stream, usually because security rules no
    /// longer allow reading the path. No further events follow.
    Cancelled(String),
    /// The auth token expired or was revoked. No further events follow.
    AuthRevoked,
    /// Stream lost; the listener reconnects on its own.
    Disconnected,
    /// Transient failure while opening or reading the stream.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_url_without_token() {
        let config = RealtimeConfig {
            database_url: "https://demo.firebaseio.com/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.rest_url("/playback/7/"),
            "https://demo.firebaseio.com/playback/7.json"
        );
        assert_eq!(config.rest_url(""), "https://demo.firebaseio.com/.json");
    }

    #[test]
    fn rest_url_appends_auth() {
        let config = RealtimeConfig {
            database_url: "https://demo.firebaseio.com".into(),
            auth_token: Some("tok".into()),
            ..Default::default()
        };
        assert_eq!(
            config.rest_url("streaks/1"),
            "https://demo.firebaseio.com/streaks/1.json?auth=tok"
        );
    }

    #[test]
    fn debug_redacts_token() {
        let config = RealtimeConfig {
            auth_token: Some("secret-token".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
