//! Scripted data for `--demo` runs against the in-process database.

use std::time::Duration;

use encore_common::{now_millis, UserId};
use encore_sync::playback::PlaybackWatcher;
use encore_sync::presence::PresenceWatcher;
use encore_sync::streaks::StreakWatcher;
use encore_sync::{MemorySource, NotificationFeed};
use serde_json::json;
use tracing::debug;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DEMO_FRIEND: i64 = 2;
const TICK: Duration = Duration::from_secs(3);

/// Initial records: a paused track, one streak close to expiring, every
/// friend online and one unread notification.
pub fn seed(memory: &MemorySource, user: UserId, friends: &[UserId]) {
    let now = now_millis();

    memory.set(
        &PlaybackWatcher::path(user),
        json!({
            "userId": user.0,
            "activeDeviceId": "desktop-1",
            "activeDeviceName": "Desktop",
            "currentSongId": 101,
            "isPlaying": false,
            "queue": [101, 102, 103],
            "repeatMode": "off",
            "position": 0,
            "duration": 215_000,
            "timestamp": now,
            "devices": {
                "desktop-1": {
                    "deviceId": "desktop-1",
                    "deviceName": "Desktop",
                    "lastSeen": now,
                    "isActive": true
                }
            }
        }),
    );

    memory.set(
        &format!("{}/{DEMO_FRIEND}", StreakWatcher::path(user)),
        json!({
            "streak": 3,
            "expireAt": now + 2 * HOUR_MS,
            "lastInteraction": "2026-10-18",
            "friendId": DEMO_FRIEND,
            "updatedAt": now
        }),
    );

    for friend in friends {
        memory.set(&PresenceWatcher::path(*friend), json!({ "online": true }));
    }

    memory.set(
        &format!("{}/welcome", NotificationFeed::path(user)),
        json!({
            "type": "MESSAGE",
            "title": "Welcome",
            "body": "Demo mode is running",
            "createdAt": now,
            "read": false
        }),
    );
}

/// Keep the demo moving: play the track, advance it, then end the streak.
pub async fn script(memory: MemorySource, user: UserId) {
    let playback = PlaybackWatcher::path(user);
    let streak = format!("{}/{DEMO_FRIEND}", StreakWatcher::path(user));
    let mut interval = tokio::time::interval(TICK);
    interval.tick().await;

    for step in 1u64..=10 {
        interval.tick().await;
        debug!(step, "Demo tick");
        memory.update(
            &playback,
            json!({
                "isPlaying": true,
                "position": step * 15_000,
                "timestamp": now_millis()
            }),
        );
        if step == 5 {
            memory.update(&streak, json!({ "streak": 0, "event": "ended" }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_sync::RealtimeSource;

    #[tokio::test]
    async fn seed_writes_every_watched_path() {
        let memory = MemorySource::new();
        let user = UserId(1);
        seed(&memory, user, &[UserId(5)]);

        let playback = memory.get(&PlaybackWatcher::path(user)).await.unwrap();
        assert_eq!(playback.unwrap()["currentSongId"], json!(101));
        assert!(memory.value(&format!("streaks/1/{DEMO_FRIEND}")).is_some());
        assert_eq!(
            memory.value("presence/users/5"),
            Some(json!({ "online": true }))
        );
        assert!(memory.value("notifications/1/welcome").is_some());
    }
}
