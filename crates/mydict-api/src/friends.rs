use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;

use mydict_db::friends::SendRequestOutcome;
use mydict_db::models::ProfileRow;
use mydict_types::api::{
    AcceptFriendRequestResponse, Claims, FriendEntry, FriendRequestsResponse, FriendsResponse,
    IncomingFriendRequest, OutgoingFriendRequest, SendFriendRequestBody,
    SendFriendRequestResponse, StatusResponse, UserRef, UserSummary,
};

use crate::{notify, run_blocking, ApiError, AppState};

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<SendFriendRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let sender_id = claims.sub;
    let receiver_id = body.receiver_id;
    info!("Friend request from {} to {}", sender_id, receiver_id);

    let outcome = {
        let state = state.clone();
        run_blocking(move || state.db.send_friend_request(sender_id, receiver_id)).await?
    };

    match outcome {
        SendRequestOutcome::Sent { request_id } => {
            notify::friend_request(&state, receiver_id, sender_id).await;
            Ok(Json(SendFriendRequestResponse {
                success: true,
                message: "Friend request sent.".into(),
                request_id: Some(request_id),
                friendship: None,
            }))
        }
        SendRequestOutcome::AutoAccepted(accepted) => {
            // The reverse request's sender just became our friend; they get
            // the acceptance notification.
            notify::friend_accepted(&state, accepted.sender_id, accepted.receiver_id).await;
            let friend = fetch_user_ref(&state, accepted.sender_id).await?;
            Ok(Json(SendFriendRequestResponse {
                success: true,
                message: "Friend request accepted!".into(),
                request_id: None,
                friendship: Some(friend),
            }))
        }
    }
}

pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let (incoming, outgoing) = run_blocking(move || {
        Ok((
            state.db.incoming_requests(user_id)?,
            state.db.outgoing_requests(user_id)?,
        ))
    })
    .await?;

    Ok(Json(FriendRequestsResponse {
        success: true,
        incoming_requests: incoming
            .into_iter()
            .map(|r| IncomingFriendRequest {
                id: r.id,
                created_at: r.created_at,
                sender: summary(r.user),
            })
            .collect(),
        outgoing_requests: outgoing
            .into_iter()
            .map(|r| OutgoingFriendRequest {
                id: r.id,
                created_at: r.created_at,
                receiver: summary(r.user),
            })
            .collect(),
    }))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    info!("Accepting friend request {} as user {}", request_id, user_id);

    let accepted = {
        let state = state.clone();
        run_blocking(move || state.db.accept_friend_request(request_id, user_id)).await?
    };

    notify::friend_accepted(&state, accepted.sender_id, accepted.receiver_id).await;
    let friend = fetch_user_ref(&state, accepted.sender_id).await?;

    Ok(Json(AcceptFriendRequestResponse {
        success: true,
        message: "Friend request accepted!".into(),
        friendship: friend,
    }))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    info!("Rejecting friend request {} as user {}", request_id, user_id);

    run_blocking(move || state.db.reject_friend_request(request_id, user_id)).await?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Friend request rejected.".into(),
    }))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let friends = run_blocking(move || state.db.list_friends(user_id)).await?;

    let friends: Vec<FriendEntry> = friends
        .into_iter()
        .map(|f| FriendEntry {
            id: f.friend_id,
            username: f.username,
            profile_photo_url: f.profile_photo_url,
            entry_count: f.entry_count,
            last_login_at: f.last_login_at,
            created_at: f.created_at,
        })
        .collect();

    let total_count = friends.len();
    Ok(Json(FriendsResponse {
        success: true,
        friends,
        total_count,
    }))
}

fn summary(p: ProfileRow) -> UserSummary {
    UserSummary {
        id: p.id,
        username: p.username,
        profile_photo_url: p.profile_photo_url,
        entry_count: p.entry_count,
    }
}

async fn fetch_user_ref(state: &AppState, user_id: i64) -> Result<UserRef, ApiError> {
    let state = state.clone();
    let profile = run_blocking(move || state.db.get_profile(user_id))
        .await?
        .ok_or(ApiError::Store(mydict_db::StoreError::UserNotFound))?;
    Ok(UserRef {
        id: profile.id,
        username: profile.username,
        profile_photo_url: profile.profile_photo_url,
    })
}
