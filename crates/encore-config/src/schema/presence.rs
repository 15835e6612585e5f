//! Presence watching configuration.

use serde::{Deserialize, Serialize};

/// Presence system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub enabled: bool,
    /// Devices not seen for this long are shown as stale (advisory only).
    pub device_stale_after_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_stale_after_ms: 5 * 60 * 1000,
        }
    }
}
