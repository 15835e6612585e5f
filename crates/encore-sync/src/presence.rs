//! Online status for a set of users from `presence/users/{id}`.

use std::sync::Arc;

use encore_common::{Subscription, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::realtime::RealtimeSource;
use crate::watch::watch_value;

/// Whether one user is online.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatus {
    pub user_id: UserId,
    pub online: bool,
}

/// Watches presence records.
#[derive(Clone)]
pub struct PresenceWatcher {
    source: Arc<dyn RealtimeSource>,
}

impl PresenceWatcher {
    pub fn new(source: Arc<dyn RealtimeSource>) -> Self {
        Self { source }
    }

    pub fn path(user_id: UserId) -> String {
        format!("presence/users/{user_id}")
    }

    /// One listener per user. A user counts as online only while their
    /// record has `online: true`; missing data and read errors mean offline.
    pub fn watch<F>(&self, user_ids: &[UserId], callback: F) -> Subscription
    where
        F: Fn(PresenceStatus) + Send + Sync + 'static,
    {
        if user_ids.is_empty() {
            return Subscription::noop();
        }

        let callback = Arc::new(callback);
        let subscriptions = user_ids
            .iter()
            .map(|&user_id| {
                let callback = Arc::clone(&callback);
                watch_value(self.source.as_ref(), &Self::path(user_id), move |value| {
                    let online = value
                        .as_ref()
                        .and_then(|v| v.get("online"))
                        .and_then(serde_json::Value::as_bool)
                        == Some(true);
                    debug!(user = %user_id, online, "Presence changed");
                    callback(PresenceStatus { user_id, online });
                })
            })
            .collect();

        Subscription::merge(subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::MemorySource;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn reports_each_user() {
        let source = Arc::new(MemorySource::new());
        source.set("presence/users/1", json!({"online": true, "lastSeen": 5}));
        source.set("presence/users/2", json!({"online": "yes"}));
        let watcher = PresenceWatcher::new(source.clone());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = watcher.watch(&[UserId(1), UserId(2), UserId(3)], move |status| {
            let _ = tx.send(status);
        });

        let mut seen = HashMap::new();
        for _ in 0..3 {
            let status = rx.recv().await.unwrap();
            seen.insert(status.user_id, status.online);
        }
        assert!(seen[&UserId(1)]);
        assert!(!seen[&UserId(2)]);
        assert!(!seen[&UserId(3)]);

        source.set("presence/users/3/online", json!(true));
        assert_eq!(
            rx.recv().await.unwrap(),
            PresenceStatus {
                user_id: UserId(3),
                online: true
            }
        );
    }

    #[tokio::test]
    async fn teardown_detaches_every_listener() {
        let source = Arc::new(MemorySource::new());
        let watcher = PresenceWatcher::new(source.clone());
        let sub = watcher.watch(&[UserId(1), UserId(2)], |_| {});
        assert_eq!(source.listener_count("presence/users/1"), 1);
        assert_eq!(source.listener_count("presence/users/2"), 1);

        sub.unsubscribe();
        assert_eq!(source.listener_count("presence/users/1"), 0);
        assert_eq!(source.listener_count("presence/users/2"), 0);
    }

    #[tokio::test]
    async fn empty_list_is_noop() {
        let source = Arc::new(MemorySource::new());
        let watcher = PresenceWatcher::new(source);
        let sub = watcher.watch(&[], |_| {});
        assert!(!sub.is_active());
    }
}
