//! Network-backed realtime source over the streaming REST protocol.

use std::sync::Arc;

use async_trait::async_trait;
use encore_common::Subscription;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::debug;

use super::connection::stream_loop;
use super::source::{Listener, RealtimeSource, LISTENER_BUFFER};
use super::types::RealtimeConfig;
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle for streaming paths of the realtime database.
///
/// Cheap to clone; every [`listen`](RealtimeSource::listen) call runs its
/// own background stream with auto-reconnect.
#[derive(Clone)]
pub struct RealtimeClient {
    http: reqwest::Client,
    config: Arc<RealtimeConfig>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("config", &self.config)
            .finish()
    }
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Result<Self, SyncError> {
        // No overall request timeout: streams stay open indefinitely.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }
}

#[async_trait]
impl RealtimeSource for RealtimeClient {
    fn listen(&self, path: &str) -> Listener {
        let (event_tx, events) = mpsc::channel(LISTENER_BUFFER);
        let task = tokio::spawn(stream_loop(
            self.http.clone(),
            Arc::clone(&self.config),
            path.to_string(),
            event_tx,
        ));

        let path = path.to_string();
        let subscription = Subscription::new(move || {
            debug!(path = %path, "Closing realtime stream");
            task.abort();
        });

        Listener {
            events,
            subscription,
        }
    }

    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>, SyncError> {
        let response = self
            .http
            .get(self.config.rest_url(path))
            .timeout(self.config.connect_timeout())
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SyncError::Unauthorized(format!("{path}: HTTP {status}")));
            }
            StatusCode::NOT_FOUND => return Err(SyncError::NotFound(path.to_string())),
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(SyncError::Transport(format!("HTTP {status}: {body}")));
            }
            _ => {}
        }

        let value: serde_json::Value = response.json().await?;
        Ok((!value.is_null()).then_some(value))
    }
}
