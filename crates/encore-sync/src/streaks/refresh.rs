//! On-demand streak refresh over the REST API.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use encore_common::{
    now_millis, AppEvents, StreakChange, StreakState, StreakUpdate, Subscription, UserId,
};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::StreakCache;
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Wire type
// ---------------------------------------------------------------------------

/// Streak between two users as returned by `GET /chat-streaks/between`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakDto {
    pub id: Option<i64>,
    pub user1_id: Option<i64>,
    pub user2_id: Option<i64>,
    pub streak: Option<u32>,
    pub current_streak_count: Option<u32>,
    pub last_interaction: Option<String>,
    pub last_interaction_date: Option<String>,
    pub is_active: bool,
    pub expire_at: Option<i64>,
}

impl StreakDto {
    pub fn to_state(&self) -> StreakState {
        StreakState {
            streak: self.streak.or(self.current_streak_count).unwrap_or(0),
            expire_at: self.expire_at,
            last_interaction: self
                .last_interaction
                .clone()
                .or_else(|| self.last_interaction_date.clone()),
            is_active: self.is_active,
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Where authoritative streak state is fetched from.
#[async_trait]
pub trait StreakSource: Send + Sync {
    /// The streak with `friend`, or `Ok(None)` when none exists.
    async fn between(&self, friend: UserId) -> Result<Option<StreakDto>, SyncError>;
}

/// [`StreakSource`] backed by the REST API.
pub struct HttpStreakSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpStreakSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStreakSource")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpStreakSource {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl StreakSource for HttpStreakSource {
    async fn between(&self, friend: UserId) -> Result<Option<StreakDto>, SyncError> {
        let url = format!("{}/chat-streaks/between", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("friendId", friend.0)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::Transport(format!("HTTP {status}: {text}")));
        }

        // `null` means no streak exists between the two users.
        let body = response.text().await?;
        let dto: Option<StreakDto> = serde_json::from_str(&body)?;
        Ok(dto)
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Refreshes streaks from a [`StreakSource`], writes the cache and
/// publishes the result on the `streak:update` topic.
pub struct StreakSync {
    source: Arc<dyn StreakSource>,
    cache: StreakCache,
    events: Arc<AppEvents>,
    ttl: Duration,
    in_flight: Mutex<HashSet<i64>>,
}

impl StreakSync {
    pub fn new(
        source: Arc<dyn StreakSource>,
        cache: StreakCache,
        events: Arc<AppEvents>,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            events,
            ttl,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &StreakCache {
        &self.cache
    }

    /// Refresh only when the cached entry is missing or older than the TTL.
    pub async fn refresh_if_stale(&self, friend_id: &str) -> Result<Option<StreakState>, SyncError> {
        if !self.cache.is_stale(friend_id, self.ttl, now_millis()) {
            debug!(friend = %friend_id, "Streak cache fresh, skipping refresh");
            return Ok(None);
        }
        self.refresh(friend_id).await
    }

    /// Fetch the streak with `friend_id` now.
    ///
    /// Returns `Ok(None)` without fetching when the id is not a numeric
    /// user id (group rooms) or a refresh for it is already running. A
    /// missing streak resolves to the empty state. Any failure also
    /// publishes the empty state and clears the cache before returning
    /// the error.
    pub async fn refresh(&self, friend_id: &str) -> Result<Option<StreakState>, SyncError> {
        let Some(friend) = UserId::from_key(friend_id) else {
            debug!(friend = %friend_id, "Skipping streak refresh for non-user room");
            return Ok(None);
        };
        let Some(_guard) = InFlight::begin(&self.in_flight, friend.0) else {
            debug!(friend = %friend, "Streak refresh already running");
            return Ok(None);
        };

        match self.source.between(friend).await {
            Ok(Some(dto)) => {
                let state = dto.to_state();
                info!(friend = %friend, streak = state.streak, "Streak refreshed");
                self.cache.write(friend_id, state.expire_at);
                self.publish(friend_id, state.clone());
                Ok(Some(state))
            }
            Ok(None) => {
                debug!(friend = %friend, "No streak yet");
                self.cache.clear(friend_id);
                self.publish(friend_id, StreakState::default());
                Ok(Some(StreakState::default()))
            }
            Err(e) => {
                warn!(friend = %friend, error = %e, "Streak refresh failed");
                self.cache.clear(friend_id);
                self.publish(friend_id, StreakState::default());
                Err(e)
            }
        }
    }

    /// Refetch whenever an `Invalidate` change is published for a friend.
    /// Must be called from within a tokio runtime.
    pub fn refresh_on_invalidate(self: &Arc<Self>) -> Subscription {
        let sync = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::current();
        self.events.streak.subscribe(move |update| {
            if update.change != StreakChange::Invalidate {
                return;
            }
            let Some(sync) = sync.upgrade() else {
                return;
            };
            let friend_id = update.friend_id.clone();
            runtime.spawn(async move {
                let _ = sync.refresh(&friend_id).await;
            });
        })
    }

    fn publish(&self, friend_id: &str, state: StreakState) {
        self.events.streak.emit(StreakUpdate {
            friend_id: friend_id.to_string(),
            change: StreakChange::Updated(state),
        });
    }
}

/// Marks one friend's refresh as running until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<i64>>,
    friend: i64,
}

impl<'a> InFlight<'a> {
    fn begin(set: &'a Mutex<HashSet<i64>>, friend: i64) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(friend);
        inserted.then_some(Self { set, friend })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.friend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Found(StreakDto),
        Missing,
        Fail,
    }

    struct FakeSource {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StreakSource for FakeSource {
        async fn between(&self, _friend: UserId) -> Result<Option<StreakDto>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Found(dto) => Ok(Some(dto.clone())),
                Reply::Missing => Ok(None),
                Reply::Fail => Err(SyncError::Transport("HTTP 500".into())),
            }
        }
    }

    fn dto(streak: u32) -> StreakDto {
        StreakDto {
            streak: Some(streak),
            is_active: true,
            expire_at: Some(now_millis() + 86_400_000),
            last_interaction: Some("2024-05-01".into()),
            ..Default::default()
        }
    }

    fn sync_with(source: Arc<FakeSource>) -> (Arc<StreakSync>, Arc<AppEvents>) {
        let events = Arc::new(AppEvents::default());
        let cache = StreakCache::new(Arc::new(MemoryStore::new()));
        let sync = Arc::new(StreakSync::new(
            source,
            cache,
            Arc::clone(&events),
            Duration::from_secs(30),
        ));
        (sync, events)
    }

    async fn http_between(status: &'static str, body: &'static str) -> Result<Option<StreakDto>, SyncError> {
        let (base, head) = crate::test_support::serve_once(status, body).await;
        let source = HttpStreakSource::new(base, "tok", Duration::from_secs(5)).unwrap();
        let result = source.between(UserId(9)).await;
        let head = head.await.unwrap();
        assert!(head.starts_with("GET /chat-streaks/between?friendId=9 "));
        assert!(head.to_ascii_lowercase().contains("authorization: bearer tok"));
        result
    }

    #[tokio::test]
    async fn http_null_body_is_not_found() {
        assert!(matches!(http_between("200 OK", "null").await, Ok(None)));
    }

    #[tokio::test]
    async fn http_status_mapping() {
        assert!(matches!(http_between("404 Not Found", "").await, Ok(None)));
        assert!(matches!(
            http_between("401 Unauthorized", "").await,
            Err(SyncError::Unauthorized(_))
        ));
        let found = http_between("200 OK", r#"{"streak":3,"isActive":true}"#)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.to_state().streak, 3);
    }

    #[test]
    fn dto_falls_back_to_alternate_fields() {
        let dto: StreakDto = serde_json::from_str(
            r#"{"currentStreakCount":6,"lastInteractionDate":"2024-06-01","isActive":true}"#,
        )
        .unwrap();
        let state = dto.to_state();
        assert_eq!(state.streak, 6);
        assert_eq!(state.last_interaction.as_deref(), Some("2024-06-01"));
        assert!(state.is_active);
    }

    #[tokio::test]
    async fn refresh_writes_cache_and_publishes() {
        let (sync, events) = sync_with(FakeSource::new(Reply::Found(dto(7))));
        let mut stream = events.streak.stream();

        let state = sync.refresh("42").await.unwrap().unwrap();
        assert_eq!(state.streak, 7);
        assert!(sync.cache().read("42").is_some());

        let update = stream.recv().await.unwrap();
        assert_eq!(update.friend_id, "42");
        assert_eq!(update.change, StreakChange::Updated(state));
    }

    #[tokio::test]
    async fn non_numeric_friend_is_skipped() {
        let source = FakeSource::new(Reply::Found(dto(1)));
        let (sync, _) = sync_with(Arc::clone(&source));
        assert_eq!(sync.refresh("pl_123").await.unwrap(), None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn not_found_resets_to_empty() {
        let (sync, events) = sync_with(FakeSource::new(Reply::Missing));
        sync.cache().write("42", Some(5));
        let mut stream = events.streak.stream();

        let state = sync.refresh("42").await.unwrap().unwrap();
        assert!(state.is_empty());
        assert_eq!(sync.cache().read("42"), None);
        assert_eq!(
            stream.recv().await.unwrap().change,
            StreakChange::Updated(StreakState::default())
        );
    }

    #[tokio::test]
    async fn failure_is_returned_after_fallback() {
        let (sync, _) = sync_with(FakeSource::new(Reply::Fail));
        sync.cache().write("42", Some(5));
        let err = sync.refresh("42").await.unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(sync.cache().read("42"), None);
    }

    #[tokio::test]
    async fn fresh_cache_skips_fetch() {
        let source = FakeSource::new(Reply::Found(dto(2)));
        let (sync, _) = sync_with(Arc::clone(&source));

        assert!(sync.refresh_if_stale("42").await.unwrap().is_some());
        assert_eq!(sync.refresh_if_stale("42").await.unwrap(), None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_triggers_refetch() {
        let source = FakeSource::new(Reply::Found(dto(3)));
        let (sync, events) = sync_with(Arc::clone(&source));
        let _sub = sync.refresh_on_invalidate();
        let mut stream = events.streak.stream();

        events.streak.emit(StreakUpdate {
            friend_id: "42".into(),
            change: StreakChange::Invalidate,
        });
        assert_eq!(stream.recv().await.unwrap().change, StreakChange::Invalidate);
        let refreshed = stream.recv().await.unwrap();
        assert!(matches!(refreshed.change, StreakChange::Updated(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
