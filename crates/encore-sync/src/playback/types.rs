//! Cross-device playback state as published under `playback/{userId}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Repeat behaviour of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// A device that announced itself for playback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_name: String,
    #[serde(deserialize_with = "lenient_millis")]
    pub last_seen: u64,
    pub is_active: bool,
}

impl DeviceInfo {
    /// Advisory: whether the device has not been seen for longer than
    /// `threshold_ms`.
    pub fn is_stale(&self, now: i64, threshold_ms: u64) -> bool {
        let now = u64::try_from(now).unwrap_or(0);
        now.saturating_sub(self.last_seen) > threshold_ms
    }
}

/// Playback state for one user. Written only by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackState {
    pub user_id: i64,
    pub active_device_id: Option<String>,
    pub active_device_name: Option<String>,
    pub current_song_id: Option<i64>,
    pub is_playing: bool,
    pub queue: Vec<i64>,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
    /// Milliseconds into the current song.
    #[serde(deserialize_with = "lenient_millis")]
    pub position: u64,
    /// Song length in milliseconds; 0 when unknown.
    #[serde(deserialize_with = "lenient_millis")]
    pub duration: u64,
    /// Epoch millis of the backend write.
    #[serde(deserialize_with = "lenient_millis")]
    pub timestamp: u64,
    pub devices: BTreeMap<String, DeviceInfo>,
}

impl PlaybackState {
    /// Clamp the position into the song when its duration is known.
    pub fn normalized(mut self) -> Self {
        if self.duration > 0 && self.position > self.duration {
            self.position = self.duration;
        }
        self
    }

    pub fn active_device(&self) -> Option<&DeviceInfo> {
        self.active_device_id
            .as_deref()
            .and_then(|id| self.devices.get(id))
    }
}

/// Millisecond fields are written by JavaScript and may arrive as floats,
/// negatives or null; all of those collapse to a non-negative integer.
fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number
        .map(|n| {
            n.as_u64().unwrap_or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f as u64)
                    .unwrap_or(0)
            })
        })
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_state() {
        let state: PlaybackState = serde_json::from_value(json!({
            "userId": 7,
            "activeDeviceId": "web-1",
            "activeDeviceName": "Chrome",
            "currentSongId": 42,
            "isPlaying": true,
            "queue": [42, 43],
            "isShuffled": false,
            "repeatMode": "all",
            "position": 1000,
            "duration": 200000,
            "timestamp": 1_700_000_000_000i64,
            "devices": {
                "web-1": {"deviceId": "web-1", "deviceName": "Chrome", "lastSeen": 1_700_000_000_000i64, "isActive": true}
            }
        }))
        .unwrap();
        assert_eq!(state.current_song_id, Some(42));
        assert_eq!(state.repeat_mode, RepeatMode::All);
        assert_eq!(state.queue, vec![42, 43]);
        assert_eq!(state.active_device().unwrap().device_name, "Chrome");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let state: PlaybackState = serde_json::from_value(json!({"isPlaying": true})).unwrap();
        assert!(state.is_playing);
        assert_eq!(state.current_song_id, None);
        assert!(state.queue.is_empty());
        assert_eq!(state.repeat_mode, RepeatMode::Off);
        assert!(state.devices.is_empty());
    }

    #[test]
    fn millis_are_lenient() {
        let state: PlaybackState =
            serde_json::from_value(json!({"position": 1500.7, "duration": -3, "timestamp": null}))
                .unwrap();
        assert_eq!(state.position, 1500);
        assert_eq!(state.duration, 0);
        assert_eq!(state.timestamp, 0);
    }

    #[test]
    fn position_is_clamped_to_duration() {
        let state = PlaybackState {
            position: 250_000,
            duration: 200_000,
            ..Default::default()
        }
        .normalized();
        assert_eq!(state.position, 200_000);

        let unknown = PlaybackState {
            position: 5_000,
            duration: 0,
            ..Default::default()
        }
        .normalized();
        assert_eq!(unknown.position, 5_000);
    }

    #[test]
    fn device_staleness() {
        let device = DeviceInfo {
            last_seen: 1_000,
            ..Default::default()
        };
        assert!(!device.is_stale(301_000, 300_000));
        assert!(device.is_stale(301_001, 300_000));
    }
}
