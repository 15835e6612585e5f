//! Typed, prefix-namespaced cache entries over a [`KeyValueStore`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use encore_common::now_millis;
use serde::Serialize;
use tracing::debug;

use super::store::KeyValueStore;

/// A value that can live in the local cache.
pub trait CacheEntry: Serialize + Sized {
    /// Epoch millis at which the entry was fetched or written.
    fn fetched_at(&self) -> i64;

    /// Interpret stored JSON. Returning `None` turns the read into a miss,
    /// which is how malformed or foreign data is handled.
    fn decode(raw: &serde_json::Value) -> Option<Self>;
}

/// Entries of one kind stored under `{prefix}{id}`.
///
/// Every operation is best-effort: storage failures and malformed data
/// are logged and treated as a miss, never surfaced to the caller.
pub struct LocalCache<E> {
    store: Arc<dyn KeyValueStore>,
    prefix: &'static str,
    _entry: PhantomData<fn() -> E>,
}

impl<E> Clone for LocalCache<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix,
            _entry: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for LocalCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl<E: CacheEntry> LocalCache<E> {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &'static str) -> Self {
        Self {
            store,
            prefix,
            _entry: PhantomData,
        }
    }

    /// Empty ids are never stored.
    fn key(&self, id: &str) -> Option<String> {
        (!id.is_empty()).then(|| format!("{}{id}", self.prefix))
    }

    pub fn read(&self, id: &str) -> Option<E> {
        let key = self.key(id)?;
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache entry is not JSON");
                return None;
            }
        };
        let entry = E::decode(&value);
        if entry.is_none() {
            debug!(key = %key, "Cache entry has unexpected shape");
        }
        entry
    }

    pub fn write(&self, id: &str, entry: &E) {
        let Some(key) = self.key(id) else {
            return;
        };
        let result = serde_json::to_string(entry)
            .map_err(|e| e.to_string())
            .and_then(|json| self.store.set(&key, &json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            debug!(key = %key, error = %e, "Cache write failed");
        }
    }

    pub fn invalidate(&self, id: &str) {
        let Some(key) = self.key(id) else {
            return;
        };
        if let Err(e) = self.store.remove(&key) {
            debug!(key = %key, error = %e, "Cache invalidate failed");
        }
    }
}

/// True when `entry` is missing or older than `ttl`.
pub fn is_stale<E: CacheEntry>(entry: Option<&E>, ttl: Duration) -> bool {
    is_stale_at(entry, ttl, now_millis())
}

/// [`is_stale`] against an explicit clock.
pub fn is_stale_at<E: CacheEntry>(entry: Option<&E>, ttl: Duration, now: i64) -> bool {
    match entry {
        None => true,
        Some(entry) => {
            let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            now.checked_sub(entry.fetched_at())
                .map_or(true, |age| age > ttl_ms)
        }
    }
}

/// Largest magnitude accepted for a stored timestamp (about year 287396).
const MAX_MILLIS: i64 = 1 << 53;

/// Read an epoch-millis field that may be stored as an integer or a float.
/// Values outside `±2^53` are treated as corrupt.
pub(crate) fn millis_field(raw: &serde_json::Value, name: &str) -> Option<i64> {
    let value = raw.get(name)?;
    let millis = match value.as_i64() {
        Some(millis) => millis,
        None => {
            let f = value.as_f64().filter(|f| f.is_finite())?;
            if f.abs() > MAX_MILLIS as f64 {
                return None;
            }
            f as i64
        }
    };
    (millis.unsigned_abs() <= MAX_MILLIS.unsigned_abs()).then_some(millis)
}
