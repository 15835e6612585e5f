//! Best-effort local cache.
//!
//! Entries are JSON documents in a [`KeyValueStore`], namespaced by key
//! prefix. Reads of missing or malformed data are misses; writes that
//! fail are dropped.

mod entries;
mod local;
mod store;

pub use entries::{
    ExchangeRateCache, ExchangeRateEntry, StreakCache, StreakCacheEntry, EXCHANGE_RATE_TTL,
};
pub use local::{is_stale, is_stale_at, CacheEntry, LocalCache};
pub(crate) use local::millis_field;
pub use store::{FileStore, KeyValueStore, MemoryStore};
