//! Read-only watcher for `playback/{userId}`.

use std::sync::Arc;

use encore_common::{Subscription, UserId};
use tracing::{debug, warn};

use super::types::PlaybackState;
use crate::error::SyncError;
use crate::realtime::RealtimeSource;
use crate::watch::watch_value;

/// Observes one user's playback state.
///
/// Every change delivers a complete [`PlaybackState`]; the client never
/// sees a half-applied update. The backend is the only writer.
#[derive(Clone)]
pub struct PlaybackWatcher {
    source: Arc<dyn RealtimeSource>,
}

impl PlaybackWatcher {
    pub fn new(source: Arc<dyn RealtimeSource>) -> Self {
        Self { source }
    }

    pub fn path(user_id: UserId) -> String {
        format!("playback/{user_id}")
    }

    /// Call `callback` with the full state after every change, or with
    /// `None` when nothing is stored, the data does not parse, or the read
    /// fails.
    pub fn watch<F>(&self, user_id: UserId, mut callback: F) -> Subscription
    where
        F: FnMut(Option<PlaybackState>) + Send + 'static,
    {
        watch_value(self.source.as_ref(), &Self::path(user_id), move |value| {
            let state = value.and_then(|value| parse_state(user_id, value));
            debug!(
                user = %user_id,
                song = ?state.as_ref().and_then(|s| s.current_song_id),
                playing = state.as_ref().is_some_and(|s| s.is_playing),
                "Playback state received"
            );
            callback(state);
        })
    }

    /// Always fails: only the backend writes playback state, after it has
    /// committed the change to its own store.
    pub fn write(&self, user_id: UserId, _state: &PlaybackState) -> Result<(), SyncError> {
        Err(SyncError::ReadOnly(Self::path(user_id)))
    }

    /// One-time read of the current state.
    pub async fn fetch_once(&self, user_id: UserId) -> Result<Option<PlaybackState>, SyncError> {
        let value = self.source.get(&Self::path(user_id)).await?;
        Ok(value.and_then(|value| parse_state(user_id, value)))
    }
}

fn parse_state(user_id: UserId, value: serde_json::Value) -> Option<PlaybackState> {
    match serde_json::from_value::<PlaybackState>(value) {
        Ok(mut state) => {
            if state.user_id == 0 {
                state.user_id = user_id.0;
            }
            Some(state.normalized())
        }
        Err(e) => {
            warn!(user = %user_id, error = %e, "Malformed playback state");
            None
        }
    }
}
