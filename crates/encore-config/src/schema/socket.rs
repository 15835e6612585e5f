//! Chat socket and REST endpoint settings.

use serde::{Deserialize, Serialize};

/// STOMP chat socket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketSection {
    /// Backend origin; `http(s)` is rewritten to `ws(s)` when connecting.
    pub base_url: String,
    /// SockJS endpoint path registered by the backend.
    pub endpoint: String,
    /// Private per-user inbound queue.
    pub inbound_queue: String,
    /// Destination for outbound chat messages.
    pub send_destination: String,
    pub connect_timeout_secs: u32,
}

impl Default for SocketSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            endpoint: "/ws-chat".into(),
            inbound_queue: "/user/queue/messages".into(),
            send_destination: "/app/chat.send".into(),
            connect_timeout_secs: 15,
        }
    }
}

/// REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub request_timeout_secs: u32,
    /// USD exchange rate endpoint. Empty disables rate lookups.
    pub exchange_rate_url: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".into(),
            request_timeout_secs: 20,
            exchange_rate_url: "https://api.exchangerate-api.com/v4/latest/USD".into(),
        }
    }
}
