use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use mydict_types::api::{
    Claims, ConversationEntry, ConversationResponse, ConversationsResponse, LastMessageSummary,
    MarkConversationReadResponse, MessageEntry, PageQuery, SendMessageBody, SendMessageResponse,
    StatusResponse, UnreadCountResponse, UserRef,
};

use crate::{notify, run_blocking, ApiError, AppState};

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;
const PREVIEW_CHARS: usize = 50;

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<SendMessageBody>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = claims.sub;
    let receiver_id = body.receiver_id;
    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::Validation("Message content cannot be empty.".into()));
    }
    info!("Message from {} to {}", sender_id, receiver_id);

    let (message_id, created_at) = {
        let state = state.clone();
        let content = content.clone();
        run_blocking(move || state.db.send_message(sender_id, receiver_id, &content)).await?
    };

    notify::new_message(&state, receiver_id, sender_id, preview(&content)).await;

    Ok(Json(SendMessageResponse {
        success: true,
        message: "Message sent.".into(),
        message_id,
        created_at,
    }))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let rows = run_blocking(move || state.db.list_conversations(user_id)).await?;

    let conversations = rows
        .into_iter()
        .map(|c| ConversationEntry {
            id: c.id,
            last_message_at: c.last_message_at,
            other_user: UserRef {
                id: c.other_id,
                username: c.other_username,
                profile_photo_url: c.other_photo_url,
            },
            last_message: match (c.last_content, c.last_created_at, c.last_is_read, c.last_sender_id)
            {
                (Some(content), Some(created_at), Some(is_read), Some(sender_id)) => {
                    Some(LastMessageSummary {
                        content,
                        created_at,
                        is_read,
                        sender_id,
                    })
                }
                _ => None,
            },
            unread_count: c.unread_count,
        })
        .collect();

    Ok(Json(ConversationsResponse {
        success: true,
        conversations,
    }))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(other_user_id): Path<i64>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (rows, other_user) = {
        let state = state.clone();
        run_blocking(move || {
            if !state.db.are_friends(user_id, other_user_id)? {
                return Err(mydict_db::StoreError::NotFriends);
            }
            let rows = state
                .db
                .conversation_page(user_id, other_user_id, page, page_size)?;
            // Fetch first, then flip read state, so the page reflects what the
            // reader saw while the rows themselves end up read.
            state.db.mark_conversation_read(user_id, other_user_id)?;
            let other = state.db.get_profile(other_user_id)?;
            Ok((rows, other))
        })
        .await?
    };

    let has_more = rows.len() as u32 == page_size;
    // Stored newest-first for paging; delivered oldest-first.
    let messages: Vec<MessageEntry> = rows
        .into_iter()
        .rev()
        .map(|m| MessageEntry {
            id: m.id,
            content: m.content,
            created_at: m.created_at,
            is_read: m.is_read,
            read_at: m.read_at,
            sender: UserRef {
                id: m.sender_id,
                username: m.sender_username,
                profile_photo_url: m.sender_photo_url,
            },
        })
        .collect();

    Ok(Json(ConversationResponse {
        success: true,
        messages,
        other_user: other_user.map(|p| UserRef {
            id: p.id,
            username: p.username,
            profile_photo_url: p.profile_photo_url,
        }),
        current_page: page,
        has_more,
    }))
}

pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Path(other_user_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let marked =
        run_blocking(move || state.db.mark_conversation_read(user_id, other_user_id)).await?;

    Ok(Json(MarkConversationReadResponse {
        success: true,
        marked_count: marked,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_blocking(move || state.db.mark_message_read(message_id, user_id)).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Message marked as read.".into(),
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let count = run_blocking(move || state.db.unread_message_count(user_id)).await?;

    Ok(Json(UnreadCountResponse {
        success: true,
        unread_count: count,
    }))
}

/// Notification preview: first 50 characters, ellipsis when truncated.
fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
