use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::NotificationType;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the auth handlers.
/// Canonical definition lives here in mydict-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Shared user projections --

/// Public profile fields attached to friend-request and friend listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub profile_photo_url: Option<String>,
    pub entry_count: i64,
}

/// Minimal user reference used in message and notification payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub username: String,
    pub profile_photo_url: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountRequest {
    pub password: String,
}

// -- Generic --

/// Plain `{success, message}` envelope used by mutations with no extra payload.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequestBody {
    pub receiver_id: i64,
}

/// Response for send-request. `request_id` is set when a new pending request
/// was created; `friendship` is set instead when a reverse pending request
/// existed and the call auto-accepted it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendFriendRequestResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendship: Option<UserRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingFriendRequest {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub sender: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingFriendRequest {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub receiver: UserSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestsResponse {
    pub success: bool,
    pub incoming_requests: Vec<IncomingFriendRequest>,
    pub outgoing_requests: Vec<OutgoingFriendRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptFriendRequestResponse {
    pub success: bool,
    pub message: String,
    pub friendship: UserRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendEntry {
    pub id: i64,
    pub username: String,
    pub profile_photo_url: Option<String>,
    pub entry_count: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsResponse {
    pub success: bool,
    pub friends: Vec<FriendEntry>,
    pub total_count: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: String,
    pub message_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageSummary {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub sender_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub id: i64,
    pub last_message_at: DateTime<Utc>,
    pub other_user: UserRef,
    pub last_message: Option<LastMessageSummary>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationsResponse {
    pub success: bool,
    pub conversations: Vec<ConversationEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub sender: UserRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub success: bool,
    pub messages: Vec<MessageEntry>,
    pub other_user: Option<UserRef>,
    pub current_page: u32,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkConversationReadResponse {
    pub success: bool,
    pub marked_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub success: bool,
    pub unread_count: i64,
}

// -- Notifications --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEntry {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub content: String,
    pub data: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub from_user: Option<UserRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub success: bool,
    pub notifications: Vec<NotificationEntry>,
    pub total_count: i64,
    pub unread_count: i64,
    pub current_page: u32,
    pub total_pages: u32,
}
