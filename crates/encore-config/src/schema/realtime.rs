//! Realtime database connection settings.

use serde::{Deserialize, Serialize};

/// Where and how to stream the realtime database.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSection {
    /// Database root, e.g. `https://encore-default-rtdb.firebaseio.com`.
    pub database_url: String,
    /// Optional database auth token appended as `?auth=`.
    pub auth_token: Option<String>,
    /// Seconds to wait for the stream to open.
    pub connect_timeout_secs: u32,
    /// Base reconnect delay in seconds.
    pub reconnect_delay_secs: u32,
    /// Upper bound for the exponential reconnect delay.
    pub max_reconnect_delay_secs: u32,
}

impl std::fmt::Debug for RealtimeSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSection")
            .field("database_url", &self.database_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_delay_secs", &self.max_reconnect_delay_secs)
            .finish()
    }
}

impl Default for RealtimeSection {
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
