//! Notification feed from `notifications/{userId}`.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use encore_common::{CreatedAt, NotificationRecord, Subscription, UserId};
use tracing::{debug, warn};

use crate::realtime::tree::children_of;
use crate::realtime::RealtimeSource;
use crate::watch::{compare_keys, watch_value};

/// Default number of most recent entries considered.
pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Reports unread notifications as they arrive.
#[derive(Clone)]
pub struct NotificationFeed {
    source: Arc<dyn RealtimeSource>,
    limit: usize,
}

impl NotificationFeed {
    pub fn new(source: Arc<dyn RealtimeSource>, limit: usize) -> Self {
        Self { source, limit }
    }

    pub fn path(user_id: UserId) -> String {
        format!("notifications/{user_id}")
    }

    /// Call `callback` for unread notifications among the newest `limit`
    /// entries, newest first. The first snapshot reports every unread
    /// entry; later snapshots report only unread entries not reported
    /// before. The record id is the child key.
    pub fn watch<F>(&self, user_id: UserId, mut callback: F) -> Subscription
    where
        F: FnMut(NotificationRecord) + Send + 'static,
    {
        let limit = self.limit;
        let mut unread = UnreadTracker::default();

        watch_value(self.source.as_ref(), &Self::path(user_id), move |value| {
            let records = value
                .as_ref()
                .map(|v| newest_records(v, limit))
                .unwrap_or_default();
            let fresh = unread.fresh(records);

            debug!(user = %user_id, count = fresh.len(), "Notification feed update");
            for record in fresh {
                callback(record);
            }
        })
    }
}

/// Remembers which ids were reported, only for as long as they stay in
/// the window.
#[derive(Debug, Default)]
struct UnreadTracker {
    seen: HashSet<String>,
    started: bool,
}

impl UnreadTracker {
    /// Unread records of `window` not reported before. The first call
    /// reports every unread record.
    fn fresh(&mut self, window: Vec<NotificationRecord>) -> Vec<NotificationRecord> {
        let in_window: HashSet<&str> = window.iter().filter_map(|r| r.id.as_deref()).collect();
        self.seen.retain(|id| in_window.contains(id.as_str()));

        let initial = !self.started;
        self.started = true;
        let fresh: Vec<NotificationRecord> = window
            .into_iter()
            .filter(|r| r.is_unread())
            .filter(|r| r.id.as_ref().is_some_and(|id| initial || !self.seen.contains(id)))
            .collect();
        self.seen.extend(fresh.iter().filter_map(|r| r.id.clone()));
        fresh
    }
}

/// Parse the newest `limit` children (by key order) and sort them newest
/// first.
fn newest_records(value: &serde_json::Value, limit: usize) -> Vec<NotificationRecord> {
    let children = children_of(value);
    let mut keys: Vec<&String> = children.keys().collect();
    keys.sort_by(|a, b| compare_keys(a, b));
    let skip = keys.len().saturating_sub(limit);

    let mut records: Vec<NotificationRecord> = keys
        .into_iter()
        .skip(skip)
        .filter_map(|key| {
            let raw = children.get(key)?.clone();
            match serde_json::from_value::<NotificationRecord>(raw) {
                Ok(mut record) => {
                    record.id = Some(key.clone());
                    Some(record)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Malformed notification");
                    None
                }
            }
        })
        .collect();

    records.sort_by(|a, b| newest_first(a, b));
    records
}

fn newest_first(a: &NotificationRecord, b: &NotificationRecord) -> Ordering {
    match (sort_millis(a), sort_millis(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sort_millis(record: &NotificationRecord) -> Option<i64> {
    match record.created_at.as_ref()? {
        CreatedAt::Millis(ms) => Some(*ms),
        CreatedAt::Text(text) => chrono::DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.timestamp_millis())
            .ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::MemorySource;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn ids(records: &[NotificationRecord]) -> Vec<&str> {
        records.iter().filter_map(|r| r.id.as_deref()).collect()
    }

    #[test]
    fn newest_records_limits_and_sorts() {
        let value = json!({
            "a": {"createdAt": 1},
            "b": {"createdAt": 3},
            "c": {"createdAt": "1970-01-01T00:00:00.002Z"},
        });
        assert_eq!(ids(&newest_records(&value, 50)), vec!["b", "c", "a"]);
        assert_eq!(ids(&newest_records(&value, 2)), vec!["b", "c"]);
    }

    #[test]
    fn reported_ids_are_forgotten_outside_the_window() {
        let record = |id: &str| NotificationRecord {
            id: Some(id.into()),
            ..Default::default()
        };
        let mut unread = UnreadTracker::default();
        assert_eq!(ids(&unread.fresh(vec![record("a"), record("b")])), vec!["a", "b"]);
        assert_eq!(unread.seen.len(), 2);

        assert_eq!(ids(&unread.fresh(vec![record("c"), record("b")])), vec!["c"]);
        assert_eq!(unread.seen.len(), 2);
        assert!(!unread.seen.contains("a"));

        assert!(unread.fresh(vec![]).is_empty());
        assert!(unread.seen.is_empty());
    }

    #[tokio::test]
    async fn reports_initial_unread_then_only_new() {
        let source = Arc::new(MemorySource::new());
        source.set(
            "notifications/7",
            json!({
                "n1": {"type": "MESSAGE", "createdAt": 1, "read": false},
                "n2": {"type": "INVITE", "createdAt": 2, "read": true},
                "n3": {"type": "SHARE", "createdAt": 3},
            }),
        );
        let feed = NotificationFeed::new(source.clone(), DEFAULT_FEED_LIMIT);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = feed.watch(UserId(7), move |record| {
            let _ = tx.send(record);
        });

        assert_eq!(rx.recv().await.unwrap().id.as_deref(), Some("n3"));
        assert_eq!(rx.recv().await.unwrap().id.as_deref(), Some("n1"));

        source.set("notifications/7/n4", json!({"type": "FRIEND_REQUEST", "createdAt": 4}));
        let record = rx.recv().await.unwrap();
        assert_eq!(record.id.as_deref(), Some("n4"));

        // Marking something read does not re-report anything.
        source.set("notifications/7/n1/read", json!(true));
        source.set("notifications/7/n5", json!({"createdAt": 5}));
        assert_eq!(rx.recv().await.unwrap().id.as_deref(), Some("n5"));
    }
}
