use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use encore_common::Subscription;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::compare_keys;
use crate::realtime::tree::Tree;
use crate::realtime::{Listener, RealtimeEvent, RealtimeSource};

/// A change to one direct child of a watched path.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, value: Value },
    Changed { key: String, value: Value },
    Removed { key: String },
}

impl ChildEvent {
    pub fn key(&self) -> &str {
        match self {
            ChildEvent::Added { key, .. }
            | ChildEvent::Changed { key, .. }
            | ChildEvent::Removed { key } => key,
        }
    }
}

/// Watch the direct children of `path`.
///
/// The first snapshot reports every existing child as `Added`. After a
/// reconnect the fresh snapshot is diffed against what was already seen,
/// so only real differences are reported.
pub fn watch_children<F>(source: &dyn RealtimeSource, path: &str, mut callback: F) -> Subscription
where
    F: FnMut(ChildEvent) + Send + 'static,
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
        while let Some(event) = events.recv().await {
            let before = tree.children();
            match event {
                RealtimeEvent::Put { path, data } => tree.put(&path, data),
                RealtimeEvent::Patch { path, data } => {
                    if !tree.patch(&path, data) {
                        warn!(path = %watched, "Ignoring non-object patch");
                        continue;
                    }
                }
                RealtimeEvent::Cancelled(reason) => {
                    warn!(path = %watched, reason = %reason, "Child watch cancelled");
                    break;
                }
                RealtimeEvent::AuthRevoked => {
                    warn!(path = %watched, "Child watch stopped, auth revoked");
                    break;
                }
                other => {
                    debug!(path = %watched, event = ?other, "Child watch connection event");
                    continue;
                }
            }

            for change in diff_children(&before, &tree.children()) {
                if !task_active.load(Ordering::Acquire) {
                    return;
                }
                callback(change);
            }
        }
    });

    Subscription::new(move || {
        active.store(false, Ordering::Release);
        subscription.unsubscribe();
        task.abort();
    })
}

/// Removed children first, then added, then changed; each group in key order.
pub(crate) fn diff_children(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<ChildEvent> {
    let mut removed: Vec<&String> = before.keys().filter(|k| !after.contains_key(*k)).collect();
    let mut added: Vec<(&String, &Value)> = after
        .iter()
        .filter(|(k, _)| !before.contains_key(*k))
        .collect();
    let mut changed: Vec<(&String, &Value)> = after
        .iter()
        .filter(|(k, v)| before.get(*k).is_some_and(|old| old != *v))
        .collect();

    removed.sort_by(|a, b| compare_keys(a, b));
    added.sort_by(|a, b| compare_keys(a.0, b.0));
    changed.sort_by(|a, b| compare_keys(a.0, b.0));

    let mut events = Vec::with_capacity(removed.len() + added.len() + changed.len());
    events.extend(removed.into_iter().map(|key| ChildEvent::Removed { key: key.clone() }));
    events.extend(added.into_iter().map(|(key, value)| ChildEvent::Added {
        key: key.clone(),
        value: value.clone(),
    }));
    events.extend(changed.into_iter().map(|(key, value)| ChildEvent::Changed {
        key: key.clone(),
        value: value.clone(),
    }));
    events
}
