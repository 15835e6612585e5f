//! Settings, identity and event types for the chat socket.

use std::time::Duration;

use encore_common::UserId;

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct SocketSettings {
    /// Backend origin, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// SockJS endpoint path, e.g. `/ws-chat`.
    pub endpoint: String,
    /// Per-user inbound queue subscribed after connecting.
    pub inbound_queue: String,
    /// Destination outbound messages are sent to.
    pub send_destination: String,
    pub connect_timeout: Duration,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".into(),
            endpoint: "/ws-chat".into(),
            inbound_queue: "/user/queue/messages".into(),
            send_destination: "/app/chat.send".into(),
            connect_timeout: Duration::from_secs(15),
        }
    }
}

impl SocketSettings {
    /// Raw WebSocket transport of the SockJS endpoint:
    /// `ws(s)://host/ws-chat/websocket`.
    pub(crate) fn ws_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        let endpoint = self.endpoint.trim_matches('/');
        format!("{base}/{endpoint}/websocket")
    }

    /// Host name sent in the `host` header of CONNECT.
    pub(crate) fn host(&self) -> String {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        without_scheme
            .split(['/', ':'])
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Who the socket connects as.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: UserId,
    pub token: String,
}

impl Credentials {
    pub fn new(user_id: UserId, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: token.into(),
        }
    }

    /// A positive user id and a non-empty token.
    pub fn is_valid(&self) -> bool {
        self.user_id.0 > 0 && !self.token.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Events emitted by the chat socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Handshake completed and the inbound queue is subscribed.
    Connected { user_id: UserId },
    /// A JSON message arrived on the inbound queue.
    Message(serde_json::Value),
    /// The server rejected the session or a frame.
    Error(String),
    /// Connection closed for any reason.
    Disconnected { user_id: UserId },
}

/// Commands from the handle to the connection task.
#[derive(Debug)]
pub(crate) enum SocketCommand {
    Send(String),
    Disconnect,
}
