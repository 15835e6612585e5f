//! The seam between watchers and whatever delivers realtime data.

use async_trait::async_trait;
use encore_common::Subscription;
use tokio::sync::mpsc;

use super::types::RealtimeEvent;
use crate::error::SyncError;

/// Channel capacity for a single path listener.
pub(crate) const LISTENER_BUFFER: usize = 256;

/// A live listener on one database path.
///
/// Dropping (or unsubscribing) `subscription` detaches the listener; the
/// receiver then yields `None`.
#[derive(Debug)]
pub struct Listener {
    pub events: mpsc::Receiver<RealtimeEvent>,
    pub subscription: Subscription,
}

/// Source of realtime database data.
///
/// Implemented by [`RealtimeClient`](super::RealtimeClient) over the
/// network and by [`MemorySource`](super::MemorySource) in memory.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// Start listening on `path`. Each call opens exactly one listener.
    /// Must be called from within a tokio runtime.
    fn listen(&self, path: &str) -> Listener;

    /// One-time read of the value at `path`. `Ok(None)` when nothing is
    /// stored there.
    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>, SyncError>;
}

/// Split a database path into its non-empty segments.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
