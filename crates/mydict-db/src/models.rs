//! Database row types — these map directly to SQLite rows and joins.
//! Distinct from the mydict-types API models to keep the store layer
//! independent of the wire format.

use chrono::{DateTime, Utc};
use mydict_types::models::{FriendRequestStatus, NotificationType};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub about: Option<String>,
    pub profile_photo_url: Option<String>,
    pub follower_count: i64,
    pub following_count: i64,
    pub entry_count: i64,
    pub topic_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Public profile slice joined into listings.
pub struct ProfileRow {
    pub id: i64,
    pub username: String,
    pub profile_photo_url: Option<String>,
    pub entry_count: i64,
}

pub struct FriendRequestRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

/// Pending request joined with the counterpart's profile (the sender for
/// incoming rows, the receiver for outgoing rows).
pub struct RequestWithProfile {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub user: ProfileRow,
}

/// Friendship edge joined with the friend's profile.
pub struct FriendRow {
    pub friend_id: i64,
    pub username: String,
    pub profile_photo_url: Option<String>,
    pub entry_count: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub sender_username: String,
    pub sender_photo_url: Option<String>,
}

/// Conversation summary for the list view: the other participant, the cached
/// last message, and the caller's unread count for that pair.
pub struct ConversationRow {
    pub id: i64,
    pub last_message_at: DateTime<Utc>,
    pub other_id: i64,
    pub other_username: String,
    pub other_photo_url: Option<String>,
    pub last_content: Option<String>,
    pub last_created_at: Option<DateTime<Utc>>,
    pub last_is_read: Option<bool>,
    pub last_sender_id: Option<i64>,
    pub unread_count: i64,
}

pub struct NotificationRow {
    pub id: i64,
    pub kind: NotificationType,
    pub content: String,
    pub data: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub from_user: Option<ProfileRow>,
}
