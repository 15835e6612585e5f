//! Configuration schema types for Encore.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod cache;
mod presence;
mod realtime;
mod socket;
mod system;

pub use cache::*;
pub use presence::*;
pub use realtime::*;
pub use socket::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoreConfig {
    pub realtime: RealtimeSection,
    pub socket: SocketSection,
    pub api: ApiSection,
    pub cache: CacheSection,
    pub notifications: NotificationsSection,
    pub presence: PresenceConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Tests
// =============================================================================
