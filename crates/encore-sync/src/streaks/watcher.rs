//! Live streak updates from `streaks/{ownerId}`.

use std::sync::Arc;

use encore_common::{AppEvents, StreakChange, StreakState, StreakUpdate, Subscription, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{millis_field, StreakCache};
use crate::realtime::RealtimeSource;
use crate::watch::{watch_children, ChildEvent};

/// A streak record as the backend writes it under `streaks/{owner}/{friend}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakPayload {
    /// `"ended"` once the streak is broken; anything else means active.
    pub event: Option<String>,
    pub streak: Option<u32>,
    pub expire_at: Option<i64>,
    pub last_interaction: Option<String>,
    pub friend_id: Option<i64>,
    pub updated_at: Option<i64>,
}

impl StreakPayload {
    /// Read a record field by field. A field with the wrong type reads as
    /// absent instead of rejecting the record; only non-objects are
    /// rejected.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let text = |name: &str| record.get(name).and_then(Value::as_str).map(str::to_string);
        let millis = |name: &str| millis_field(value, name);
        Some(Self {
            event: text("event"),
            streak: record
                .get("streak")
                .and_then(|v| v.as_u64().or_else(|| whole_number(v)))
                .and_then(|n| u32::try_from(n).ok()),
            expire_at: millis("expireAt"),
            last_interaction: text("lastInteraction"),
            friend_id: record.get("friendId").and_then(Value::as_i64),
            updated_at: millis("updatedAt"),
        })
    }

    pub fn is_ended(&self) -> bool {
        self.event.as_deref() == Some("ended")
    }

    /// Client state for this record.
    pub fn to_state(&self) -> StreakState {
        StreakState {
            streak: self.streak.unwrap_or(0),
            expire_at: self.expire_at,
            last_interaction: self.last_interaction.clone(),
            is_active: !self.is_ended(),
        }
    }
}

/// A non-negative float with no fractional part, as JSON clients sometimes
/// write counters.
fn whole_number(value: &Value) -> Option<u64> {
    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64).then_some(f as u64)
}

/// Watches one user's streaks with every friend.
#[derive(Clone)]
pub struct StreakWatcher {
    source: Arc<dyn RealtimeSource>,
}

impl StreakWatcher {
    pub fn new(source: Arc<dyn RealtimeSource>) -> Self {
        Self { source }
    }

    pub fn path(owner: UserId) -> String {
        format!("streaks/{owner}")
    }

    /// Call `callback(friend, payload)` for every added or changed friend
    /// record and `callback(friend, None)` when one is removed.
    ///
    /// Children whose key is not an integer user id are skipped, as are
    /// records that are not objects.
    pub fn watch<F>(&self, owner: UserId, mut callback: F) -> Subscription
    where
        F: FnMut(UserId, Option<StreakPayload>) + Send + 'static,
    {
        watch_children(self.source.as_ref(), &Self::path(owner), move |event| {
            let Some(friend) = UserId::from_key(event.key()) else {
                debug!(key = %event.key(), "Skipping non-numeric streak key");
                return;
            };
            match event {
                ChildEvent::Added { value, .. } | ChildEvent::Changed { value, .. } => {
                    match StreakPayload::from_value(&value) {
                        Some(payload) => callback(friend, Some(payload)),
                        None => warn!(friend = %friend, record = %value, "Streak record is not an object"),
                    }
                }
                ChildEvent::Removed { .. } => callback(friend, None),
            }
        })
    }

    /// Forward every streak change to the `streak:update` topic, keeping
    /// the local cache in step: updates refresh the cached expiry and
    /// removals invalidate it.
    pub fn bridge(
        &self,
        owner: UserId,
        events: Arc<AppEvents>,
        cache: Option<StreakCache>,
    ) -> Subscription {
        self.watch(owner, move |friend, payload| {
            let friend_id = friend.to_string();
            let change = match payload {
                Some(payload) => {
                    let state = payload.to_state();
                    if let Some(cache) = &cache {
                        cache.write(&friend_id, state.expire_at);
                    }
                    StreakChange::Updated(state)
                }
                None => {
                    if let Some(cache) = &cache {
                        cache.clear(&friend_id);
                    }
                    StreakChange::Invalidate
                }
            };
            events.streak.emit(StreakUpdate { friend_id, change });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::realtime::MemorySource;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<MemorySource>, StreakWatcher) {
        let source = Arc::new(MemorySource::new());
        let watcher = StreakWatcher::new(source.clone());
        (source, watcher)
    }

    #[test]
    fn payload_maps_to_state() {
        let payload: StreakPayload = serde_json::from_value(json!({
            "event": "updated",
            "streak": 4,
            "expireAt": 1_700_000_000_000i64,
            "lastInteraction": "2024-05-01",
        }))
        .unwrap();
        assert_eq!(
            payload.to_state(),
            StreakState {
                streak: 4,
                expire_at: Some(1_700_000_000_000),
                last_interaction: Some("2024-05-01".into()),
                is_active: true,
            }
        );
    }

    #[test]
    fn ended_payload_is_inactive_with_defaults() {
        let payload: StreakPayload = serde_json::from_value(json!({"event": "ended"})).unwrap();
        let state = payload.to_state();
        assert_eq!(state.streak, 0);
        assert_eq!(state.expire_at, None);
        assert!(!state.is_active);
    }

    #[tokio::test]
    async fn watch_reports_numeric_friends_only() {
        let (source, watcher) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = watcher.watch(UserId(1), move |friend, payload| {
            let _ = tx.send((friend, payload));
        });

        source.set("streaks/1/pl_9", json!({"streak": 2}));
        source.set("streaks/1/42", json!({"streak": 3, "event": "started"}));
        let (friend, payload) = rx.recv().await.unwrap();
        assert_eq!(friend, UserId(42));
        assert_eq!(payload.unwrap().streak, Some(3));

        source.remove("streaks/1/42");
        assert_eq!(rx.recv().await.unwrap(), (UserId(42), None));
    }

    #[tokio::test]
    async fn bad_fields_read_as_absent() {
        let (source, watcher) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = watcher.watch(UserId(1), move |friend, payload| {
            let _ = tx.send((friend, payload));
        });

        source.set("streaks/1/5", json!({"streak": "lots", "expireAt": 1_900_000_000_000i64}));
        let (friend, payload) = rx.recv().await.unwrap();
        assert_eq!(friend, UserId(5));
        let payload = payload.unwrap();
        assert_eq!(payload.streak, None);
        assert_eq!(payload.expire_at, Some(1_900_000_000_000));

        source.set("streaks/1/6", json!(7));
        source.set("streaks/1/8", json!({"streak": 2.0}));
        let (friend, payload) = rx.recv().await.unwrap();
        assert_eq!(friend, UserId(8));
        assert_eq!(payload.unwrap().streak, Some(2));
    }

    #[tokio::test]
    async fn non_numeric_keys_never_reach_callback() {
        let (source, watcher) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = watcher.watch(UserId(1), move |friend, payload| {
            let _ = tx.send((friend, payload.and_then(|p| p.streak)));
        });

        source.set("streaks/1/pl_9", json!({"streak": 1}));
        source.set("streaks/1/10", json!({"streak": 1}));
        source.set("streaks/1/-abc", json!({"streak": 4}));
        source.update("streaks/1", json!({"pl_9": {"streak": 2}, "10": {"streak": 2}}));
        source.set("streaks/1/-abc/streak", json!(5));
        source.set("streaks/1/11", json!({"streak": 7}));
        source.remove("streaks/1/pl_9");
        source.remove("streaks/1/10");
        source.update("streaks/1", json!({"-abc": null, "11": null}));

        let mut seen = Vec::new();
        while seen.len() < 5 {
            seen.push(rx.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                (UserId(10), Some(1)),
                (UserId(10), Some(2)),
                (UserId(11), Some(7)),
                (UserId(10), None),
                (UserId(11), None),
            ]
        );
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn bridge_emits_and_maintains_cache() {
        let (source, watcher) = setup();
        let events = Arc::new(AppEvents::default());
        let cache = StreakCache::new(Arc::new(MemoryStore::new()));
        let mut stream = events.streak.stream();
        let _sub = watcher.bridge(UserId(1), Arc::clone(&events), Some(cache.clone()));

        source.set(
            "streaks/1/42",
            json!({"streak": 5, "expireAt": 1_900_000_000_000i64, "event": "updated"}),
        );
        let update = stream.recv().await.unwrap();
        assert_eq!(update.friend_id, "42");
        match update.change {
            StreakChange::Updated(state) => {
                assert_eq!(state.streak, 5);
                assert!(state.is_active);
            }
            other => panic!("unexpected change: {other:?}"),
        }
        assert_eq!(
            cache.read("42").unwrap().expire_at,
            Some(1_900_000_000_000)
        );

        source.remove("streaks/1/42");
        let update = stream.recv().await.unwrap();
        assert_eq!(update.change, StreakChange::Invalidate);
        assert_eq!(cache.read("42"), None);
    }
}
