//! Notification fan-out. Every helper is fire-and-forget: the triggering
//! operation has already committed, so a fan-out failure is logged and
//! swallowed, never propagated. If the acting user vanished between the
//! trigger and the lookup, the notification is silently skipped.

use serde_json::json;
use tracing::warn;

use mydict_db::StoreError;
use mydict_types::models::NotificationType;

use crate::AppState;

pub async fn friend_request(state: &AppState, receiver_id: i64, sender_id: i64) {
    let state = state.clone();
    fan_out("friend request", move || {
        let Some(sender) = state.db.get_profile(sender_id)? else {
            return Ok(());
        };
        let content = format!("{} sent you a friend request.", sender.username);
        let data = json!({ "senderId": sender.id, "senderUsername": sender.username });
        state.db.insert_notification(
            receiver_id,
            Some(sender_id),
            NotificationType::FriendRequest,
            &content,
            Some(&data.to_string()),
        )?;
        Ok(())
    })
    .await;
}

pub async fn friend_accepted(state: &AppState, requester_id: i64, accepter_id: i64) {
    let state = state.clone();
    fan_out("friend accepted", move || {
        let Some(accepter) = state.db.get_profile(accepter_id)? else {
            return Ok(());
        };
        let content = format!("{} accepted your friend request.", accepter.username);
        let data = json!({ "accepterId": accepter.id, "accepterUsername": accepter.username });
        state.db.insert_notification(
            requester_id,
            Some(accepter_id),
            NotificationType::FriendRequestAccepted,
            &content,
            Some(&data.to_string()),
        )?;
        Ok(())
    })
    .await;
}

pub async fn new_message(state: &AppState, receiver_id: i64, sender_id: i64, preview: String) {
    let state = state.clone();
    fan_out("new message", move || {
        let Some(sender) = state.db.get_profile(sender_id)? else {
            return Ok(());
        };
        let content = format!("{} sent you a new message: {}", sender.username, preview);
        let data = json!({
            "senderId": sender.id,
            "senderUsername": sender.username,
            "messagePreview": preview,
        });
        state.db.insert_notification(
            receiver_id,
            Some(sender_id),
            NotificationType::NewMessage,
            &content,
            Some(&data.to_string()),
        )?;
        Ok(())
    })
    .await;
}

async fn fan_out<F>(kind: &'static str, f: F)
where
    F: FnOnce() -> Result<(), StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{} notification failed: {}", kind, e),
        Err(e) => warn!("{} notification task failed: {}", kind, e),
    }
}
