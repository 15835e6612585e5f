//! Realtime sync for Encore: database watchers, the local cache store,
//! streak tracking and the STOMP chat socket.

pub mod cache;
pub mod error;
pub mod feed;
pub mod notifications;
pub mod playback;
pub mod presence;
pub mod rates;
pub mod realtime;
pub mod socket;
pub mod streaks;
pub mod watch;

#[cfg(test)]
mod test_support;

pub use cache::{
    ExchangeRateCache, ExchangeRateEntry, FileStore, KeyValueStore, LocalCache, MemoryStore,
    StreakCache, StreakCacheEntry,
};
pub use error::SyncError;
pub use feed::{NotificationFeed, DEFAULT_FEED_LIMIT};
pub use notifications::{
    NewStreakNotification, StreakNotification, StreakNotificationKind, StreakNotifications,
};
pub use playback::{DeviceInfo, PlaybackState, PlaybackWatcher, RepeatMode};
pub use presence::{PresenceStatus, PresenceWatcher};
pub use rates::{ExchangeRates, HttpRateSource, RateSource};
pub use realtime::{
    Listener, MemorySource, RealtimeClient, RealtimeConfig, RealtimeEvent, RealtimeSource,
};
pub use socket::{ChatSocket, ConnectionState, Credentials, SocketEvent, SocketSettings};
pub use streaks::{
    HttpStreakSource, StreakSignal, StreakStatus, StreakSync, StreakTracker, StreakWatcher,
    UpdateSource,
};
pub use watch::{watch_children, watch_value, ChildEvent};
