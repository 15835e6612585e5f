//! Subscriptions that turn realtime changes into log lines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use encore_common::{now_millis, ChatBubble, StreakChange, Subscription, UserId};
use encore_config::EncoreConfig;
use encore_sync::{
    ChatSocket, Credentials, ExchangeRateCache, ExchangeRates, NewStreakNotification, NotificationFeed, PlaybackWatcher,
    PresenceWatcher, SocketEvent, StreakCache, StreakNotifications, StreakSync, StreakTracker,
    StreakWatcher, UpdateSource,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::setup::{socket_settings, Runtime};

/// Everything started for one watched user.
pub struct Session {
    subscriptions: Vec<Subscription>,
    tasks: Vec<JoinHandle<()>>,
    socket: Option<ChatSocket>,
    // Invalidation refreshes only hold a weak reference.
    _streak_sync: Option<Arc<StreakSync>>,
}

impl Session {
    pub async fn shutdown(mut self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
        for task in &self.tasks {
            task.abort();
        }
        if let Some(socket) = self.socket.as_mut() {
            socket.disconnect().await;
        }
    }
}

pub fn start(runtime: &Runtime, config: &EncoreConfig, user: UserId, friends: &[UserId]) -> Session {
    let mut subscriptions = Vec::new();
    let mut tasks = Vec::new();
    let events = &runtime.events;

    // Playback
    let stale_after = config.presence.device_stale_after_ms;
    subscriptions.push(
        PlaybackWatcher::new(Arc::clone(&runtime.source)).watch(user, move |state| {
            let Some(state) = state else {
                info!(user = %user, "No playback");
                return;
            };
            let now = now_millis();
            let stale = state
                .devices
                .values()
                .filter(|d| d.is_stale(now, stale_after))
                .count();
            info!(
                song = ?state.current_song_id,
                playing = state.is_playing,
                position_ms = state.position,
                duration_ms = state.duration,
                device = ?state.active_device().map(|d| d.device_name.as_str()),
                stale_devices = stale,
                "Playback"
            );
        }),
    );

    // Streaks: realtime bridge, optional HTTP refresh, tracker signals.
    let cache = StreakCache::new(Arc::clone(&runtime.store));
    subscriptions.push(StreakWatcher::new(Arc::clone(&runtime.source)).bridge(
        user,
        Arc::clone(events),
        Some(cache.clone()),
    ));

    let streak_sync = runtime.streak_source.as_ref().map(|source| {
        let sync = Arc::new(StreakSync::new(
            Arc::clone(source),
            cache,
            Arc::clone(events),
            Duration::from_millis(config.cache.streak_ttl_ms),
        ));
        subscriptions.push(sync.refresh_on_invalidate());
        let friend_ids: Vec<String> = friends.iter().map(ToString::to_string).collect();
        let initial = Arc::clone(&sync);
        tasks.push(tokio::spawn(async move {
            for friend in friend_ids {
                if let Err(e) = initial.refresh_if_stale(&friend).await {
                    warn!(friend = %friend, error = %e, "Streak refresh failed");
                }
            }
        }));
        sync
    });

    let center = Arc::new(Mutex::new(StreakNotifications::new(
        config.notifications.auto_dismiss_ms,
    )));
    let trackers: Mutex<HashMap<String, StreakTracker>> = Mutex::new(HashMap::new());
    let threshold = config.notifications.warning_threshold_hours;
    let tracker_center = Arc::clone(&center);
    subscriptions.push(events.streak.subscribe(move |update| {
        let StreakChange::Updated(state) = &update.change else {
            return;
        };
        let mut trackers = trackers.lock().unwrap_or_else(|e| e.into_inner());
        let tracker = trackers
            .entry(update.friend_id.clone())
            .or_insert_with(|| StreakTracker::new(update.friend_id.as_str(), threshold));
        let signals = tracker.apply(state.clone(), UpdateSource::Fetch, now_millis());
        info!(friend = %update.friend_id, streak = state.streak, active = state.is_active, "Streak");

        let mut center = tracker_center.lock().unwrap_or_else(|e| e.into_inner());
        for signal in signals {
            let name = format!("friend {}", update.friend_id);
            let id = center.add(NewStreakNotification::from_signal(
                &signal,
                update.friend_id.as_str(),
                name,
            ));
            info!(id = %id, signal = ?signal, "Streak notification");
        }
    }));

    let prune_center = Arc::clone(&center);
    tasks.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let mut center = prune_center.lock().unwrap_or_else(|e| e.into_inner());
            let pruned = center.prune_expired(now_millis());
            if pruned > 0 {
                info!(pruned, remaining = center.len(), "Streak notifications dismissed");
            }
        }
    }));

    // Exchange rate, logged once.
    if let Some(source) = &runtime.rate_source {
        let rates = ExchangeRates::new(
            Arc::clone(source),
            ExchangeRateCache::new(
                Arc::clone(&runtime.store),
                Duration::from_millis(config.cache.exchange_rate_ttl_ms),
            ),
        );
        tasks.push(tokio::spawn(async move {
            let rate = rates.usd_to_vnd().await;
            info!(rate, "USD to VND exchange rate");
        }));
    }

    // Presence
    subscriptions.push(
        PresenceWatcher::new(Arc::clone(&runtime.source)).watch(friends, |status| {
            info!(user = %status.user_id, online = status.online, "Presence");
        }),
    );

    // Notification feed, republished as temporary notifications.
    subscriptions.push(events.temp_notification.subscribe(|record| {
        info!(
            id = ?record.id,
            kind = ?record.kind,
            title = ?record.title,
            "Notification"
        );
    }));
    let feed_events = Arc::clone(events);
    let feed_limit = usize::try_from(config.notifications.feed_limit).unwrap_or(usize::MAX);
    subscriptions.push(
        NotificationFeed::new(Arc::clone(&runtime.source), feed_limit).watch(user, move |record| {
            feed_events.temp_notification.emit(record);
        }),
    );

    // Chat socket, only with a token.
    subscriptions.push(events.chat_bubble.subscribe(|bubble| {
        info!(from = %bubble.from, message = %bubble.message, "Chat");
    }));
    let socket = runtime.token.as_ref().map(|token| {
        let (socket, socket_events) = ChatSocket::connect(
            socket_settings(&config.socket),
            Some(Credentials::new(user, token.as_str())),
        );
        tasks.push(tokio::spawn(forward_socket_events(
            socket_events,
            Arc::clone(events),
        )));
        socket
    });

    Session {
        subscriptions,
        tasks,
        socket,
        _streak_sync: streak_sync,
    }
}

async fn forward_socket_events(
    mut socket_events: mpsc::Receiver<SocketEvent>,
    events: Arc<encore_common::AppEvents>,
) {
    while let Some(event) = socket_events.recv().await {
        match event {
            SocketEvent::Connected { user_id } => info!(user = %user_id, "Chat connected"),
            SocketEvent::Disconnected { user_id } => info!(user = %user_id, "Chat disconnected"),
            SocketEvent::Error(reason) => warn!(reason = %reason, "Chat socket error"),
            SocketEvent::Message(value) => {
                events.chat_bubble.emit(chat_bubble(&value));
            }
        }
    }
}

/// Bubble for an inbound chat message: sender name when present, else id.
fn chat_bubble(message: &Value) -> ChatBubble {
    let from = message
        .get("senderName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| message.get("senderId").map(Value::to_string))
        .unwrap_or_default();
    let text = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    ChatBubble {
        from,
        message: text,
        ..Default::default()
    }
}
