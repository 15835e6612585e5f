//! Domain types shared by the sync layer and the event bus.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Numeric user identifier as issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Parse a realtime child key. Keys that are not plain integers are
    /// rejected (group rooms like `pl_12`, push ids, empty strings).
    pub fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(UserId)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Streaks
// ---------------------------------------------------------------------------

/// Client view of the streak between the current user and one friend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub streak: u32,
    /// Epoch milliseconds after which the streak is lost.
    pub expire_at: Option<i64>,
    /// ISO date (`YYYY-MM-DD`) of the last counted interaction.
    pub last_interaction: Option<String>,
    pub is_active: bool,
}

impl StreakState {
    /// True for the all-default state used before anything was fetched.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Kind of a server-side notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Message,
    Share,
    Invite,
    FriendRequest,
    FriendRequestAccepted,
    #[serde(other)]
    Unknown,
}

/// `createdAt` arrives either as epoch millis or as an ISO string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CreatedAt {
    Millis(i64),
    Text(String),
}

/// A notification as stored under `notifications/{userId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationRecord {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationKind>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub sender_avatar: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub created_at: Option<CreatedAt>,
    pub read: Option<bool>,
}

impl NotificationRecord {
    /// Anything not explicitly marked read counts as unread.
    pub fn is_unread(&self) -> bool {
        self.read != Some(true)
    }
}
