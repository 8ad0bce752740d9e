use serde::{Deserialize, Serialize};

/// Lifecycle of a friend request. `Pending` is the only state that can
/// transition; `Accepted` and `Rejected` are terminal and the rows are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FriendRequestStatus::Pending),
            "accepted" => Some(FriendRequestStatus::Accepted),
            "rejected" => Some(FriendRequestStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    FriendRequest,
    FriendRequestAccepted,
    NewMessage,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::FriendRequest => "friend_request",
            NotificationType::FriendRequestAccepted => "friend_request_accepted",
            NotificationType::NewMessage => "new_message",
            NotificationType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "friend_request" => Some(NotificationType::FriendRequest),
            "friend_request_accepted" => Some(NotificationType::FriendRequestAccepted),
            "new_message" => Some(NotificationType::NewMessage),
            "system" => Some(NotificationType::System),
            _ => None,
        }
    }
}
