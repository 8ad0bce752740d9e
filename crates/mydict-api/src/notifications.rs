use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};

use mydict_types::api::{
    Claims, NotificationEntry, NotificationsResponse, PageQuery, StatusResponse,
    UnreadCountResponse, UserRef,
};

use crate::{run_blocking, ApiError, AppState};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 200;

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (rows, total, unread) =
        run_blocking(move || state.db.list_notifications(user_id, page, page_size)).await?;

    let notifications = rows
        .into_iter()
        .map(|n| NotificationEntry {
            id: n.id,
            kind: n.kind,
            content: n.content,
            data: n.data.and_then(|s| serde_json::from_str(&s).ok()),
            is_read: n.is_read,
            created_at: n.created_at,
            from_user: n.from_user.map(|p| UserRef {
                id: p.id,
                username: p.username,
                profile_photo_url: p.profile_photo_url,
            }),
        })
        .collect();

    Ok(Json(NotificationsResponse {
        success: true,
        notifications,
        total_count: total,
        unread_count: unread,
        current_page: page,
        total_pages: total_pages(total, page_size),
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let count = run_blocking(move || state.db.unread_notification_count(user_id)).await?;

    Ok(Json(UnreadCountResponse {
        success: true,
        unread_count: count,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_blocking(move || state.db.mark_notification_read(notification_id, user_id)).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Notification marked as read.".into(),
    }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_blocking(move || state.db.mark_all_notifications_read(user_id)).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "All notifications marked as read.".into(),
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    run_blocking(move || state.db.delete_notification(notification_id, user_id)).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Notification deleted.".into(),
    }))
}

fn total_pages(total: i64, page_size: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    ((total + page_size as i64 - 1) / page_size as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::total_pages;

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
    }
}
