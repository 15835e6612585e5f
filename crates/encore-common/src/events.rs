//! Typed in-process publish/subscribe.
//!
//! Each [`Topic`] carries one payload type. `emit` runs every handler
//! registered at the moment of emission, synchronously and in subscription
//! order. Handlers may subscribe or unsubscribe from inside a dispatch; the
//! dispatch in progress keeps iterating the listener list it started with,
//! skipping any handler torn down since it began.
//! Async consumers can also take a broadcast stream of the same topic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::id::{new_id, now_millis};
use crate::subscription::Subscription;
use crate::types::{NotificationRecord, StreakState};

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// A payload that can travel through the bus.
pub trait BusPayload: Clone + Send + Sync + 'static {
    /// Fill fields the emitter left empty (ids, variants).
    fn fill_defaults(self) -> Self {
        self
    }
}

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Entry<P> {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Handler<P>,
}

impl<P> Clone for Entry<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            handler: Arc::clone(&self.handler),
        }
    }
}

struct Listeners<P> {
    next_id: u64,
    entries: Vec<Entry<P>>,
}

/// One named channel of the bus.
pub struct Topic<P: BusPayload> {
    name: &'static str,
    listeners: Arc<Mutex<Listeners<P>>>,
    stream: broadcast::Sender<P>,
}

impl<P: BusPayload> Topic<P> {
    pub fn new(name: &'static str, stream_capacity: usize) -> Self {
        let (stream, _) = broadcast::channel(stream_capacity.max(1));
        Self {
            name,
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
            stream,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a handler. It receives every payload emitted after this call
    /// until the returned subscription is torn down.
    pub fn subscribe(&self, handler: impl Fn(&P) + Send + Sync + 'static) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let id = {
            let mut listeners = self
                .listeners
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push(Entry {
                id,
                active: Arc::clone(&active),
                handler: Arc::new(handler),
            });
            id
        };
        trace!(topic = self.name, listener = id, "subscribed");

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            active.store(false, Ordering::SeqCst);
            if let Some(listeners) = listeners.upgrade() {
                listeners
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .entries
                    .retain(|entry| entry.id != id);
            }
        })
    }

    /// Deliver `payload` to current listeners and stream subscribers.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, payload: P) -> usize {
        let payload = payload.fill_defaults();
        let snapshot: Vec<Entry<P>> = self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .clone();

        let mut delivered = 0;
        for entry in &snapshot {
            if entry.active.load(Ordering::SeqCst) {
                (entry.handler)(&payload);
                delivered += 1;
            }
        }
        let _ = self.stream.send(payload);
        trace!(topic = self.name, delivered, "emitted");
        delivered
    }

    /// Receive future payloads on an async task instead of a callback.
    pub fn stream(&self) -> broadcast::Receiver<P> {
        self.stream.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .len()
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Visual severity of a bubble or toast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// A chat bubble popping up for an incoming message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBubble {
    pub id: Option<String>,
    pub from: String,
    pub message: String,
    pub avatar: Option<String>,
    pub variant: Option<Variant>,
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl BusPayload for ChatBubble {
    fn fill_defaults(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(now_millis().to_string());
        }
        if self.variant.is_none() {
            self.variant = Some(Variant::Info);
        }
        self
    }
}

/// A notification shown locally without a server-side record.
pub type TempNotification = NotificationRecord;

impl BusPayload for NotificationRecord {
    fn fill_defaults(mut self) -> Self {
        if self.id.is_none() {
            self.id = Some(format!("temp-{}", new_id()));
        }
        self
    }
}

/// A chat tab was opened, either with a friend or a group room (`pl_{id}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTabOpened {
    pub friend_id: Option<String>,
    pub room_id: Option<String>,
}

impl BusPayload for ChatTabOpened {}

/// What happened to a friend's streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum StreakChange {
    /// Fresh state is attached; apply it directly.
    Updated(StreakState),
    /// Cached state is no longer valid; refetch.
    Invalidate,
}

/// A streak change for one friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub friend_id: String,
    pub change: StreakChange,
}

impl BusPayload for StreakUpdate {}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// The application's topics, constructed once and passed to whoever needs
/// them.
pub struct AppEvents {
    pub chat_bubble: Topic<ChatBubble>,
    pub temp_notification: Topic<TempNotification>,
    pub chat_tab_opened: Topic<ChatTabOpened>,
    pub streak: Topic<StreakUpdate>,
}

impl AppEvents {
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            chat_bubble: Topic::new("app:chatbubble", stream_capacity),
            temp_notification: Topic::new("app:temp-notification", stream_capacity),
            chat_tab_opened: Topic::new("app:chat-tab-opened", stream_capacity),
            streak: Topic::new("streak:update", stream_capacity),
        }
    }
}

impl Default for AppEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
