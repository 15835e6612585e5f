//! Local cache and streak notification settings.

use serde::{Deserialize, Serialize};

/// Local cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Storage directory. Empty means the platform data directory.
    pub directory: String,
    /// Streak entries older than this are refetched (valid range: 1000-3600000).
    pub streak_ttl_ms: u64,
    /// Exchange rate entries older than this are refetched.
    pub exchange_rate_ttl_ms: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            directory: String::new(),
            streak_ttl_ms: 30_000,
            exchange_rate_ttl_ms: 60 * 60 * 1000,
        }
    }
}

/// In-session notification behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    /// Streak notifications disappear after this many milliseconds.
    pub auto_dismiss_ms: u64,
    /// Newest entries kept from the realtime notification feed.
    pub feed_limit: u32,
    /// A streak expiring within this many hours raises a warning.
    pub warning_threshold_hours: u32,
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            auto_dismiss_ms: 10_000,
            feed_limit: 50,
            warning_threshold_hours: 4,
        }
    }
}
