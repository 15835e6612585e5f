//! Session-only streak notifications with auto-dismiss.

use std::fmt;

use encore_common::{new_id, now_millis};
use serde::{Deserialize, Serialize};

use crate::streaks::StreakSignal;

/// Kind of streak notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakNotificationKind {
    Warning,
    Expired,
    Started,
}

impl fmt::Display for StreakNotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreakNotificationKind::Warning => "warning",
            StreakNotificationKind::Expired => "expired",
            StreakNotificationKind::Started => "started",
        })
    }
}

/// What a caller supplies to [`StreakNotifications::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStreakNotification {
    pub kind: StreakNotificationKind,
    pub friend_id: String,
    pub friend_name: String,
    pub hours_remaining: Option<u32>,
    pub current_streak: Option<u32>,
}

impl NewStreakNotification {
    /// Build the notification for a tracker signal.
    pub fn from_signal(
        signal: &StreakSignal,
        friend_id: impl Into<String>,
        friend_name: impl Into<String>,
    ) -> Self {
        let (kind, hours_remaining, current_streak) = match *signal {
            StreakSignal::Warning { hours_remaining } => {
                (StreakNotificationKind::Warning, Some(hours_remaining), None)
            }
            StreakSignal::Expired => (StreakNotificationKind::Expired, None, None),
            StreakSignal::Started { streak } => {
                (StreakNotificationKind::Started, None, Some(streak))
            }
        };
        Self {
            kind,
            friend_id: friend_id.into(),
            friend_name: friend_name.into(),
            hours_remaining,
            current_streak,
        }
    }
}

/// A notification currently held by the center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: StreakNotificationKind,
    pub friend_id: String,
    pub friend_name: String,
    pub hours_remaining: Option<u32>,
    pub current_streak: Option<u32>,
    /// Epoch millis.
    pub timestamp: i64,
    pub shown: bool,
}

impl StreakNotification {
    fn duplicates(&self, new: &NewStreakNotification) -> bool {
        self.friend_id == new.friend_id
            && self.kind == new.kind
            && self.hours_remaining == new.hours_remaining
            && self.current_streak == new.current_streak
    }
}

/// Holds streak notifications for the session.
///
/// A new notification for the same friend and kind collapses into the
/// existing one unless its hours-remaining or streak count differ.
/// Entries disappear `ttl_ms` after creation.
#[derive(Debug)]
pub struct StreakNotifications {
    items: Vec<StreakNotification>,
    ttl_ms: i64,
}

impl StreakNotifications {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            items: Vec::new(),
            ttl_ms: i64::try_from(ttl_ms).unwrap_or(i64::MAX),
        }
    }

    /// Add a notification and return its id (or the id of the entry it
    /// collapsed into).
    pub fn add(&mut self, new: NewStreakNotification) -> String {
        self.add_at(new, now_millis())
    }

    pub fn add_at(&mut self, new: NewStreakNotification, now: i64) -> String {
        self.prune_expired(now);
        if let Some(existing) = self.items.iter().find(|n| n.duplicates(&new)) {
            return existing.id.clone();
        }

        let id = format!("{}-{}-{}", new.friend_id, new.kind, new_id());
        self.items.push(StreakNotification {
            id: id.clone(),
            kind: new.kind,
            friend_id: new.friend_id,
            friend_name: new.friend_name,
            hours_remaining: new.hours_remaining,
            current_streak: new.current_streak,
            timestamp: now,
            shown: false,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn mark_as_shown(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|n| n.id == id) {
            Some(notification) => {
                notification.shown = true;
                true
            }
            None => false,
        }
    }

    /// Oldest first.
    pub fn notifications(&self) -> &[StreakNotification] {
        &self.items
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn prune_expired(&mut self, now: i64) -> usize {
        let before = self.items.len();
        let ttl = self.ttl_ms;
        self.items.retain(|n| now - n.timestamp < ttl);
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for StreakNotifications {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warning(friend: &str, hours: u32) -> NewStreakNotification {
        NewStreakNotification {
            kind: StreakNotificationKind::Warning,
            friend_id: friend.into(),
            friend_name: "Linh".into(),
            hours_remaining: Some(hours),
            current_streak: None,
        }
    }

    #[test]
    fn id_has_friend_and_kind() {
        let mut center = StreakNotifications::default();
        let id = center.add_at(warning("42", 3), 0);
        assert!(id.starts_with("42-warning-"));
        assert_eq!(center.len(), 1);
        assert!(!center.notifications()[0].shown);
    }

    #[test]
    fn same_context_collapses() {
        let mut center = StreakNotifications::default();
        let first = center.add_at(warning("42", 3), 0);
        let second = center.add_at(warning("42", 3), 100);
        assert_eq!(first, second);
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn different_context_is_kept() {
        let mut center = StreakNotifications::default();
        center.add_at(warning("42", 3), 0);
        center.add_at(warning("42", 2), 0);
        center.add_at(warning("7", 3), 0);
        assert_eq!(center.len(), 3);
    }

    #[test]
    fn no_context_collapses_per_friend_and_kind() {
        let mut center = StreakNotifications::default();
        let expired = |friend: &str| NewStreakNotification {
            kind: StreakNotificationKind::Expired,
            friend_id: friend.into(),
            friend_name: String::new(),
            hours_remaining: None,
            current_streak: None,
        };
        center.add_at(expired("42"), 0);
        center.add_at(expired("42"), 1);
        assert_eq!(center.len(), 1);
    }

    #[test]
    fn remove_and_mark_shown() {
        let mut center = StreakNotifications::default();
        let id = center.add_at(warning("42", 3), 0);
        assert!(center.mark_as_shown(&id));
        assert!(center.notifications()[0].shown);
        assert!(!center.mark_as_shown("missing"));
        assert!(center.remove(&id));
        assert!(!center.remove(&id));
        assert!(center.is_empty());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut center = StreakNotifications::new(10_000);
        center.add_at(warning("42", 3), 0);
        center.add_at(warning("7", 3), 5_000);
        assert_eq!(center.prune_expired(9_999), 0);
        assert_eq!(center.prune_expired(10_000), 1);
        assert_eq!(center.notifications()[0].friend_id, "7");

        // An expired duplicate no longer collapses the new one.
        let id = center.add_at(warning("7", 3), 20_000);
        assert_eq!(center.len(), 1);
        assert_eq!(center.notifications()[0].id, id);
    }

    #[test]
    fn built_from_signals() {
        let started = NewStreakNotification::from_signal(
            &StreakSignal::Started { streak: 1 },
            "42",
            "Linh",
        );
        assert_eq!(started.kind, StreakNotificationKind::Started);
        assert_eq!(started.current_streak, Some(1));

        let warn = NewStreakNotification::from_signal(
            &StreakSignal::Warning { hours_remaining: 2 },
            "42",
            "Linh",
        );
        assert_eq!(warn.hours_remaining, Some(2));
    }

    #[test]
    fn serializes_with_type_field() {
        let mut center = StreakNotifications::default();
        center.add_at(warning("42", 3), 0);
        let json = serde_json::to_value(&center.notifications()[0]).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["friendId"], "42");
        assert_eq!(json["hoursRemaining"], 3);
    }
}
