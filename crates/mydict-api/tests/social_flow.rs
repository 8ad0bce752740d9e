//! End-to-end handler tests: a real router over an in-memory store, driven
//! with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use mydict_api::auth::{self, AppState, AppStateInner};
use mydict_api::middleware::require_auth;
use mydict_api::{friends, messages, notifications, users};
use mydict_db::Database;

// Matches the middleware's fallback secret so the env var can stay unset.
const TEST_SECRET: &str = "dev-secret-change-me";

fn test_app() -> Router {
    let db = Database::open_in_memory().expect("open in-memory db");
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: TEST_SECRET.to_string(),
    });

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/friends/send-request", post(friends::send_request))
        .route("/friends/requests", get(friends::list_requests))
        .route("/friends/{request_id}/accept", post(friends::accept_request))
        .route("/friends/{request_id}/reject", post(friends::reject_request))
        .route("/friends", get(friends::list_friends))
        .route("/messages/conversations", get(messages::list_conversations))
        .route(
            "/messages/conversation/{other_user_id}",
            get(messages::get_conversation),
        )
        .route(
            "/messages/conversation/{other_user_id}/mark-read",
            post(messages::mark_conversation_read),
        )
        .route("/messages/send", post(messages::send_message))
        .route("/messages/{message_id}/mark-read", post(messages::mark_read))
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/notifications", get(notifications::list))
        .route(
            "/notifications/{notification_id}/mark-read",
            post(notifications::mark_read),
        )
        .route("/users/delete-account", delete(users::delete_account))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

/// Registers a user and returns (id, token).
async fn register(app: &Router, username: &str) -> (i64, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct horse",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    (
        body["userId"].as_i64().expect("userId"),
        body["token"].as_str().expect("token").to_string(),
    )
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = test_app();
    let (status, _) = call(&app, Method::GET, "/friends", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/friends", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn friend_request_accept_and_notification_flow() {
    let app = test_app();
    let (alice_id, alice_token) = register(&app, "alice").await;
    let (bob_id, bob_token) = register(&app, "bob").await;

    // Alice sends Bob a request.
    let (status, body) = call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let request_id = body["requestId"].as_i64().expect("requestId");

    // Bob sees exactly one incoming request from Alice.
    let (_, body) = call(&app, Method::GET, "/friends/requests", Some(&bob_token), None).await;
    let incoming = body["incomingRequests"].as_array().expect("incoming");
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0]["sender"]["id"].as_i64(), Some(alice_id));

    // Bob got a friend-request notification.
    let (_, body) = call(&app, Method::GET, "/notifications", Some(&bob_token), None).await;
    assert_eq!(body["unreadCount"].as_i64(), Some(1));
    assert_eq!(body["notifications"][0]["type"], "friend_request");
    assert_eq!(
        body["notifications"][0]["fromUser"]["id"].as_i64(),
        Some(alice_id)
    );

    // Bob accepts; both friend lists contain the other user.
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/friends/{request_id}/accept"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["friendship"]["username"], "alice");

    let (_, body) = call(&app, Method::GET, "/friends", Some(&alice_token), None).await;
    assert_eq!(body["totalCount"].as_i64(), Some(1));
    assert_eq!(body["friends"][0]["username"], "bob");
    let (_, body) = call(&app, Method::GET, "/friends", Some(&bob_token), None).await;
    assert_eq!(body["friends"][0]["username"], "alice");

    // Alice got the acceptance notification from Bob.
    let (_, body) = call(&app, Method::GET, "/notifications", Some(&alice_token), None).await;
    assert_eq!(
        body["notifications"][0]["type"],
        "friend_request_accepted"
    );
    assert_eq!(
        body["notifications"][0]["fromUser"]["id"].as_i64(),
        Some(bob_id)
    );

    // Accepting twice is a 404: the request is terminal.
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/friends/{request_id}/accept"),
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_and_self_requests_are_client_errors() {
    let app = test_app();
    let (alice_id, alice_token) = register(&app, "alice").await;
    let (bob_id, _) = register(&app, "bob").await;

    let send = |token: String| {
        let app = app.clone();
        async move {
            call(
                &app,
                Method::POST,
                "/friends/send-request",
                Some(&token),
                Some(json!({ "receiverId": bob_id })),
            )
            .await
        }
    };

    let (status, _) = send(alice_token.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(alice_token.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Self-request.
    let (status, _) = call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&alice_token),
        Some(json!({ "receiverId": alice_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown receiver.
    let (status, _) = call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&alice_token),
        Some(json!({ "receiverId": 9999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reverse_request_becomes_a_friendship() {
    let app = test_app();
    let (alice_id, alice_token) = register(&app, "alice").await;
    let (bob_id, bob_token) = register(&app, "bob").await;

    call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id })),
    )
    .await;

    // Bob sends one back instead of accepting.
    let (status, body) = call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&bob_token),
        Some(json!({ "receiverId": alice_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("requestId").is_none());
    assert_eq!(body["friendship"]["id"].as_i64(), Some(alice_id));

    let (_, body) = call(&app, Method::GET, "/friends/requests", Some(&bob_token), None).await;
    assert!(body["incomingRequests"].as_array().unwrap().is_empty());
    let (_, body) = call(&app, Method::GET, "/friends", Some(&alice_token), None).await;
    assert_eq!(body["friends"][0]["username"], "bob");
}

#[tokio::test]
async fn messaging_flow_with_read_receipts() {
    let app = test_app();
    let (alice_id, alice_token) = register(&app, "alice").await;
    let (bob_id, bob_token) = register(&app, "bob").await;
    let (_, carol_token) = register(&app, "carol").await;

    // Not friends yet: the gate refuses.
    let (status, _) = call(
        &app,
        Method::POST,
        "/messages/send",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id, "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Befriend via request + accept.
    let (_, body) = call(
        &app,
        Method::POST,
        "/friends/send-request",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id })),
    )
    .await;
    let request_id = body["requestId"].as_i64().unwrap();
    call(
        &app,
        Method::POST,
        &format!("/friends/{request_id}/accept"),
        Some(&bob_token),
        None,
    )
    .await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages/send",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id, "content": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message_id = body["messageId"].as_i64().expect("messageId");

    // Empty content is rejected.
    let (status, _) = call(
        &app,
        Method::POST,
        "/messages/send",
        Some(&alice_token),
        Some(json!({ "receiverId": bob_id, "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Bob's conversation list shows one unread from Alice.
    let (_, body) = call(
        &app,
        Method::GET,
        "/messages/conversations",
        Some(&bob_token),
        None,
    )
    .await;
    let conversations = body["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["otherUser"]["id"].as_i64(), Some(alice_id));
    assert_eq!(conversations[0]["unreadCount"].as_i64(), Some(1));
    assert_eq!(conversations[0]["lastMessage"]["content"], "hello");

    // Fetching the conversation delivers oldest-first and marks it read.
    let (_, body) = call(
        &app,
        Method::GET,
        &format!("/messages/conversation/{alice_id}"),
        Some(&bob_token),
        None,
    )
    .await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "hello");
    assert_eq!(messages[0]["id"].as_i64(), Some(message_id));
    assert_eq!(body["otherUser"]["username"], "alice");
    assert_eq!(body["hasMore"], false);

    let (_, body) = call(
        &app,
        Method::GET,
        "/messages/unread-count",
        Some(&bob_token),
        None,
    )
    .await;
    assert_eq!(body["unreadCount"].as_i64(), Some(0));

    // Bob got a message notification carrying the preview.
    let (_, body) = call(&app, Method::GET, "/notifications", Some(&bob_token), None).await;
    let note = body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["type"] == "new_message")
        .expect("message notification");
    assert_eq!(note["data"]["messagePreview"], "hello");

    // Outsiders cannot read the pair's conversation.
    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/messages/conversation/{alice_id}"),
        Some(&carol_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn account_deletion_requires_the_right_password() {
    let app = test_app();
    let (_, alice_token) = register(&app, "alice").await;

    let (status, _) = call(
        &app,
        Method::DELETE,
        "/users/delete-account",
        Some(&alice_token),
        Some(json!({ "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::DELETE,
        "/users/delete-account",
        Some(&alice_token),
        Some(json!({ "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // The login no longer works.
    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
