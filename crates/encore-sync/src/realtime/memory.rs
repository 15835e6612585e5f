//! In-process realtime database for tests and offline demos.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use encore_common::Subscription;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::source::{segments, Listener, RealtimeSource, LISTENER_BUFFER};
use super::tree::Tree;
use super::types::RealtimeEvent;
use crate::error::SyncError;

struct Registered {
    id: u64,
    path: Vec<String>,
    tx: mpsc::Sender<RealtimeEvent>,
}

#[derive(Default)]
struct Inner {
    tree: Tree,
    next_id: u64,
    listeners: Vec<Registered>,
    denied: Vec<Vec<String>>,
}

/// A realtime source that keeps the whole database in memory and feeds
/// listeners the same `put`/`patch` event stream a server would.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("listeners", &self.lock().listeners.len())
            .finish()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the value at `path`; `Null` deletes it.
    pub fn set(&self, path: &str, value: Value) {
        let mut inner = self.lock();
        let write = owned_segments(path);
        let before = snapshot(&inner, &write);
        inner.tree.put(path, value.clone());
        dispatch(&mut inner, &write, &before, |rel| RealtimeEvent::Put {
            path: rel,
            data: value.clone(),
        });
    }

    /// Merge the children of `children` into the value at `path`.
    pub fn update(&self, path: &str, children: Value) {
        let mut inner = self.lock();
        let write = owned_segments(path);
        let before = snapshot(&inner, &write);
        if !inner.tree.patch(path, children.clone()) {
            warn!(path = %path, "Ignoring non-object update");
            return;
        }
        dispatch(&mut inner, &write, &before, |rel| RealtimeEvent::Patch {
            path: rel,
            data: children.clone(),
        });
    }

    /// Delete the value at `path`.
    pub fn remove(&self, path: &str) {
        self.set(path, Value::Null);
    }

    /// Current value at `path`.
    pub fn value(&self, path: &str) -> Option<Value> {
        self.lock().tree.get(path).cloned()
    }

    /// Number of live listeners attached exactly at `path`.
    pub fn listener_count(&self, path: &str) -> usize {
        let target = owned_segments(path);
        let mut inner = self.lock();
        inner.listeners.retain(|l| !l.tx.is_closed());
        inner.listeners.iter().filter(|l| l.path == target).count()
    }

    /// Reject reads under `path` from now on. Listeners already attached
    /// there are cancelled.
    pub fn deny_read(&self, path: &str) {
        let denied = owned_segments(path);
        let mut inner = self.lock();
        inner.listeners.retain(|l| {
            if !is_prefix(&denied, &l.path) {
                return true;
            }
            let _ = l
                .tx
                .try_send(RealtimeEvent::Cancelled("Permission denied".into()));
            false
        });
        inner.denied.push(denied);
    }

    /// Simulate every stream dropping and coming back: listeners see
    /// `Disconnected`, `Connected` and a fresh full `Put`.
    pub fn reconnect_all(&self) {
        let inner = self.lock();
        for listener in &inner.listeners {
            let current = current_value(&inner.tree, &listener.path);
            for event in [
                RealtimeEvent::Disconnected,
                RealtimeEvent::Connected,
                RealtimeEvent::Put {
                    path: "/".into(),
                    data: current,
                },
            ] {
                let _ = listener.tx.try_send(event);
            }
        }
    }
}

#[async_trait]
impl RealtimeSource for MemorySource {
    fn listen(&self, path: &str) -> Listener {
        let (tx, events) = mpsc::channel(LISTENER_BUFFER);
        let target = owned_segments(path);
        let mut inner = self.lock();

        if inner.denied.iter().any(|d| is_prefix(d, &target)) {
            let _ = tx.try_send(RealtimeEvent::Cancelled("Permission denied".into()));
            return Listener {
                events,
                subscription: Subscription::noop(),
            };
        }

        let _ = tx.try_send(RealtimeEvent::Connected);
        let _ = tx.try_send(RealtimeEvent::Put {
            path: "/".into(),
            data: current_value(&inner.tree, &target),
        });

        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push(Registered {
            id,
            path: target,
            tx,
        });
        drop(inner);

        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.listeners.retain(|l| l.id != id);
            }
        });

        Listener {
            events,
            subscription,
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, SyncError> {
        let inner = self.lock();
        let target = owned_segments(path);
        if inner.denied.iter().any(|d| is_prefix(d, &target)) {
            return Err(SyncError::Unauthorized(format!("{path}: Permission denied")));
        }
        Ok(inner.tree.get(path).cloned())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn owned_segments(path: &str) -> Vec<String> {
    segments(path).into_iter().map(str::to_string).collect()
}

fn join(path: &[String]) -> String {
    format!("/{}", path.join("/"))
}

fn is_prefix(prefix: &[String], path: &[String]) -> bool {
    path.len() >= prefix.len() && path[..prefix.len()] == *prefix
}

fn current_value(tree: &Tree, path: &[String]) -> Value {
    tree.get(&join(path)).cloned().unwrap_or(Value::Null)
}

/// Values seen by listeners strictly below `write`, before the write.
fn snapshot(inner: &Inner, write: &[String]) -> Vec<(u64, Value)> {
    inner
        .listeners
        .iter()
        .filter(|l| l.path.len() > write.len() && is_prefix(write, &l.path))
        .map(|l| (l.id, current_value(&inner.tree, &l.path)))
        .collect()
}

/// Deliver a write at `write` to every affected listener.
fn dispatch(
    inner: &mut Inner,
    write: &[String],
    before: &[(u64, Value)],
    relative_event: impl Fn(String) -> RealtimeEvent,
) {
    let Inner {
        tree, listeners, ..
    } = inner;

    listeners.retain(|listener| {
        let event = if is_prefix(&listener.path, write) {
            relative_event(join(&write[listener.path.len()..]))
        } else if is_prefix(write, &listener.path) {
            let after = current_value(tree, &listener.path);
            let unchanged = before
                .iter()
                .any(|(id, value)| *id == listener.id && *value == after);
            if unchanged {
                return true;
            }
            RealtimeEvent::Put {
                path: "/".into(),
                data: after,
            }
        } else {
            return true;
        };

        match listener.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(path = %join(&listener.path), "Listener buffer full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(path = %join(&listener.path), "Dropping closed listener");
                false
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn listener_gets_initial_snapshot() {
        let source = MemorySource::new();
        source.set("/playback/7", json!({"isPlaying": true}));

        let mut listener = source.listen("playback/7");
        assert_eq!(listener.events.recv().await, Some(RealtimeEvent::Connected));
        assert_eq!(
            listener.events.recv().await,
            Some(RealtimeEvent::Put {
                path: "/".into(),
                data: json!({"isPlaying": true}),
            })
        );
    }

    #[tokio::test]
    async fn writes_below_listener_are_relative() {
        let source = MemorySource::new();
        let mut listener = source.listen("streaks/1");
        listener.events.recv().await;
        listener.events.recv().await;

        source.set("streaks/1/42", json!({"streak": 3}));
        assert_eq!(
            listener.events.recv().await,
            Some(RealtimeEvent::Put {
                path: "/42".into(),
                data: json!({"streak": 3}),
            })
        );

        source.update("streaks/1/42", json!({"streak": 4}));
        assert_eq!(
            listener.events.recv().await,
            Some(RealtimeEvent::Patch {
                path: "/42".into(),
                data: json!({"streak": 4}),
            })
        );
    }

    #[tokio::test]
    async fn writes_above_listener_send_full_value() {
        let source = MemorySource::new();
        let mut listener = source.listen("presence/users/5");
        listener.events.recv().await;
        listener.events.recv().await;

        source.set("presence/users", json!({"5": {"online": true}, "6": {"online": false}}));
        assert_eq!(
            listener.events.recv().await,
            Some(RealtimeEvent::Put {
                path: "/".into(),
                data: json!({"online": true}),
            })
        );

        // Sibling-only change does not reach the listener.
        source.update("presence/users", json!({"6": {"online": true}}));
        source.set("presence/users/5/online", json!(false));
        assert_eq!(
            listener.events.recv().await,
            Some(RealtimeEvent::Put {
                path: "/online".into(),
                data: json!(false),
            })
        );
    }

    #[tokio::test]
    async fn unrelated_paths_are_not_delivered() {
        let source = MemorySource::new();
        let mut listener = source.listen("a");
        listener.events.recv().await;
        listener.events.recv().await;
        source.set("b", json!(1));
        assert!(listener.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_detaches_listener() {
        let source = MemorySource::new();
        let listener = source.listen("playback/1");
        assert_eq!(source.listener_count("playback/1"), 1);
        listener.subscription.unsubscribe();
        assert_eq!(source.listener_count("playback/1"), 0);
    }

    #[tokio::test]
    async fn denied_paths_cancel_and_fail_reads() {
        let source = MemorySource::new();
        source.set("secret/1", json!(1));
        let mut before = source.listen("secret/1");
        before.events.recv().await;
        before.events.recv().await;

        source.deny_read("secret");
        assert!(matches!(
            before.events.recv().await,
            Some(RealtimeEvent::Cancelled(_))
        ));

        let mut after = source.listen("secret/1");
        assert!(matches!(
            after.events.recv().await,
            Some(RealtimeEvent::Cancelled(_))
        ));
        assert!(matches!(
            source.get("secret/1").await,
            Err(SyncError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn get_returns_none_for_missing() {
        let source = MemorySource::new();
        assert_eq!(source.get("nothing/here").await.unwrap(), None);
        source.set("x", json!({"y": 2}));
        assert_eq!(source.get("x/y").await.unwrap(), Some(json!(2)));
    }
}
