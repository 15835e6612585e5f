//! Concrete cache entries: streak expiry per friend and the USD→VND rate.

use std::sync::Arc;
use std::time::Duration;

use encore_common::now_millis;
use serde::Serialize;

use super::local::{is_stale_at, millis_field, CacheEntry, LocalCache};
use super::store::KeyValueStore;

// ---------------------------------------------------------------------------
// Streaks
// ---------------------------------------------------------------------------

/// Cached streak expiry for one friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakCacheEntry {
    pub expire_at: Option<i64>,
    pub last_fetched_at: i64,
}

impl CacheEntry for StreakCacheEntry {
    fn fetched_at(&self) -> i64 {
        self.last_fetched_at
    }

    fn decode(raw: &serde_json::Value) -> Option<Self> {
        Some(Self {
            last_fetched_at: millis_field(raw, "lastFetchedAt")?,
            expire_at: millis_field(raw, "expireAt"),
        })
    }
}

/// Streak expiry cache keyed `streak:{friendId}`.
#[derive(Debug, Clone)]
pub struct StreakCache {
    inner: LocalCache<StreakCacheEntry>,
}

impl StreakCache {
    pub const PREFIX: &'static str = "streak:";

    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: LocalCache::new(store, Self::PREFIX),
        }
    }

    pub fn read(&self, friend_id: &str) -> Option<StreakCacheEntry> {
        self.inner.read(friend_id)
    }

    /// Record `expire_at`, stamped with the current time.
    pub fn write(&self, friend_id: &str, expire_at: Option<i64>) {
        self.write_at(friend_id, expire_at, now_millis());
    }

    pub fn write_at(&self, friend_id: &str, expire_at: Option<i64>, now: i64) {
        self.inner.write(
            friend_id,
            &StreakCacheEntry {
                expire_at,
                last_fetched_at: now,
            },
        );
    }

    pub fn clear(&self, friend_id: &str) {
        self.inner.invalidate(friend_id);
    }

    /// Whether the entry for `friend_id` is missing or older than `ttl`.
    pub fn is_stale(&self, friend_id: &str, ttl: Duration, now: i64) -> bool {
        is_stale_at(self.read(friend_id).as_ref(), ttl, now)
    }
}

// ---------------------------------------------------------------------------
// Exchange rate
// ---------------------------------------------------------------------------

/// How long a fetched exchange rate stays usable.
pub const EXCHANGE_RATE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cached USD→VND exchange rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateEntry {
    pub rate: f64,
    pub timestamp: i64,
}

impl CacheEntry for ExchangeRateEntry {
    fn fetched_at(&self) -> i64 {
        self.timestamp
    }

    fn decode(raw: &serde_json::Value) -> Option<Self> {
        let rate = raw.get("rate")?.as_f64().filter(|r| r.is_finite() && *r > 0.0)?;
        Some(Self {
            rate,
            timestamp: millis_field(raw, "timestamp")?,
        })
    }
}

/// Single-entry cache for the USD→VND rate, stored under `usd_vnd_rate`.
#[derive(Debug, Clone)]
pub struct ExchangeRateCache {
    inner: LocalCache<ExchangeRateEntry>,
    ttl: Duration,
}

impl ExchangeRateCache {
    const KEY: &'static str = "usd_vnd_rate";

    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self {
            inner: LocalCache::new(store, ""),
            ttl,
        }
    }

    pub fn read(&self) -> Option<ExchangeRateEntry> {
        self.inner.read(Self::KEY)
    }

    /// The cached rate if it is still within the TTL.
    pub fn fresh_rate(&self) -> Option<f64> {
        self.fresh_rate_at(now_millis())
    }

    pub fn fresh_rate_at(&self, now: i64) -> Option<f64> {
        let entry = self.read()?;
        (!is_stale_at(Some(&entry), self.ttl, now)).then_some(entry.rate)
    }

    pub fn write(&self, rate: f64) {
        self.write_at(rate, now_millis());
    }

    pub fn write_at(&self, rate: f64, now: i64) {
        self.inner.write(
            Self::KEY,
            &ExchangeRateEntry {
                rate,
                timestamp: now,
            },
        );
    }

    pub fn clear(&self) {
        self.inner.invalidate(Self::KEY);
    }
}
