//! Public handle for the chat socket.

use std::sync::Arc;
use std::time::Duration;

use encore_common::UserId;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::connection::run_connection;
use super::types::{ConnectionState, Credentials, SocketCommand, SocketEvent, SocketSettings};

/// How long teardown waits for the session task before aborting it.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct Active {
    credentials: Credentials,
    command_tx: mpsc::Sender<SocketCommand>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat socket bound to at most one identity at a time.
///
/// The connection never retries on its own: after a failure the state is
/// `Disconnected` until the caller sets an identity again.
pub struct ChatSocket {
    settings: Arc<SocketSettings>,
    state: Arc<watch::Sender<ConnectionState>>,
    event_tx: mpsc::Sender<SocketEvent>,
    active: Option<Active>,
}

impl ChatSocket {
    /// Create a disconnected socket. Returns `(socket, event_receiver)`.
    pub fn new(settings: SocketSettings) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let socket = Self {
            settings: Arc::new(settings),
            state: Arc::new(state),
            event_tx,
            active: None,
        };
        (socket, event_rx)
    }

    /// Create a socket and start connecting as `credentials`, if given.
    /// Must be called from within a tokio runtime.
    pub fn connect(
        settings: SocketSettings,
        credentials: Option<Credentials>,
    ) -> (Self, mpsc::Receiver<SocketEvent>) {
        let (mut socket, events) = Self::new(settings);
        if let Some(credentials) = credentials {
            socket.start(credentials);
        }
        (socket, events)
    }

    /// Switch identity. The previous session is fully torn down before a
    /// new one starts; `None` just disconnects. Setting the identity that
    /// is already connected (or connecting) does nothing.
    pub async fn set_identity(&mut self, credentials: Option<Credentials>) {
        let unchanged = match (&self.active, &credentials) {
            (Some(active), Some(next)) => {
                active.credentials == *next && self.state() != ConnectionState::Disconnected
            }
            _ => false,
        };
        if unchanged {
            return;
        }

        self.disconnect().await;
        if let Some(credentials) = credentials {
            self.start(credentials);
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Identity of the current (or last attempted) session.
    pub fn user_id(&self) -> Option<UserId> {
        self.active.as_ref().map(|a| a.credentials.user_id)
    }

    /// Publish `message` as JSON to the send destination.
    ///
    /// Silently does nothing unless connected. Returns whether the message
    /// was handed to the session.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        if !self.is_connected() {
            debug!("Chat socket not connected, dropping outbound message");
            return false;
        }
        let Some(active) = &self.active else {
            return false;
        };
        let body = match serde_json::to_string(message) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize outbound chat message");
                return false;
            }
        };
        active.command_tx.try_send(SocketCommand::Send(body)).is_ok()
    }

    /// Close the session and wait for it to finish. Idempotent.
    pub async fn disconnect(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.command_tx.send(SocketCommand::Disconnect).await;

        let mut task = active.task;
        if tokio::time::timeout(TEARDOWN_TIMEOUT, &mut task).await.is_err() {
            warn!(user = %active.credentials.user_id, "Chat socket teardown timed out, aborting");
            task.abort();
            let _ = task.await;
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    fn start(&mut self, credentials: Credentials) {
        if !credentials.is_valid() {
            debug!(user = %credentials.user_id, "No usable identity, staying disconnected");
            return;
        }

        let (command_tx, command_rx) = mpsc::channel(64);
        self.state.send_replace(ConnectionState::Connecting);
        let task = tokio::spawn(run_connection(
            Arc::clone(&self.settings),
            credentials.clone(),
            Arc::clone(&self.state),
            self.event_tx.clone(),
            command_rx,
        ));
        self.active = Some(Active {
            credentials,
            command_tx,
            task,
        });
    }
}

impl std::fmt::Debug for ChatSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSocket")
            .field("state", &self.state())
            .field("user_id", &self.user_id())
            .finish()
    }
}
