use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encore_common::Subscription;
use serde_json::Value;
use tracing::{debug, warn};

use crate::realtime::tree::Tree;
use crate::realtime::{Listener, RealtimeEvent, RealtimeSource};

/// Watch the whole value at `path`.
///
/// The callback gets the full current value after every change, and `None`
/// when nothing is stored, when a read error occurs, or when the server
/// cancels the stream. The first snapshot is always delivered; later ones
/// only when the value actually differs from the last delivery.
pub fn watch_value<F>(source: &dyn RealtimeSource, path: &str, mut callback: F) -> Subscription
where
    F: FnMut(Option<Value>) + Send + 'static,
{
    let Listener {
        mut events,
        subscription,
    } = source.listen(path);
    let active = Arc::new(AtomicBool::new(true));
    let task_active = Arc::clone(&active);
    let watched = path.to_string();

    let task = tokio::spawn(async move {
        let mut tree = Tree::new();
        let mut delivered: Option<Option<Value>> = None;
        let mut deliver = |next: Option<Value>| {
            if delivered.as_ref() == Some(&next) {
                return;
            }
            if !task_active.load(Ordering::Acquire) {
                return;
            }
            delivered = Some(next.clone());
            callback(next);
        };

        while let Some(event) = events.recv().await {
            match event {
                RealtimeEvent::Put { path, data } => tree.put(&path, data),
                RealtimeEvent::Patch { path, data } => {
                    if !tree.patch(&path, data) {
                        warn!(path = %watched, "Ignoring non-object patch");
                        continue;
                    }
                }
                RealtimeEvent::Error(message) => {
                    debug!(path = %watched, error = %message, "Value watch read error");
                    deliver(None);
                    continue;
                }
                RealtimeEvent::Cancelled(reason) => {
                    warn!(path = %watched, reason = %reason, "Value watch cancelled");
                    deliver(None);
                    break;
                }
                RealtimeEvent::AuthRevoked => {
                    warn!(path = %watched, "Value watch stopped, auth revoked");
                    deliver(None);
                    break;
                }
                RealtimeEvent::Connected | RealtimeEvent::Disconnected => continue,
            }
            deliver(tree.value().cloned());
        }
    });

    Subscription::new(move || {
        active.store(false, Ordering::Release);
        subscription.unsubscribe();
        task.abort();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::MemorySource;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn collecting_watch(
        source: &MemorySource,
        path: &str,
    ) -> (Subscription, mpsc::UnboundedReceiver<Option<Value>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub = watch_value(source, path, move |value| {
            let _ = tx.send(value);
        });
        (sub, rx)
    }

    #[tokio::test]
    async fn empty_path_delivers_none_first() {
        let source = MemorySource::new();
        let (_sub, mut rx) = collecting_watch(&source, "playback/1");
        assert_eq!(rx.recv().await, Some(None));

        source.set("playback/1", json!({"isPlaying": true}));
        assert_eq!(rx.recv().await, Some(Some(json!({"isPlaying": true}))));
    }

    #[tokio::test]
    async fn nested_writes_deliver_full_value() {
        let source = MemorySource::new();
        source.set("playback/1", json!({"isPlaying": true, "positionMs": 5}));
        let (_sub, mut rx) = collecting_watch(&source, "playback/1");
        rx.recv().await;

        source.set("playback/1/positionMs", json!(9));
        assert_eq!(
            rx.recv().await,
            Some(Some(json!({"isPlaying": true, "positionMs": 9})))
        );
    }

    #[tokio::test]
    async fn identical_snapshot_after_reconnect_is_suppressed() {
        let source = MemorySource::new();
        source.set("playback/1", json!({"isPlaying": true}));
        let (_sub, mut rx) = collecting_watch(&source, "playback/1");
        rx.recv().await;

        source.reconnect_all();
        source.set("playback/1/isPlaying", json!(false));
        assert_eq!(rx.recv().await, Some(Some(json!({"isPlaying": false}))));
    }

    #[tokio::test]
    async fn cancellation_delivers_none() {
        let source = MemorySource::new();
        source.set("playback/1", json!({"isPlaying": true}));
        let (_sub, mut rx) = collecting_watch(&source, "playback/1");
        rx.recv().await;

        source.deny_read("playback");
        assert_eq!(rx.recv().await, Some(None));
        assert_eq!(rx.recv().await, None);
    }
}
