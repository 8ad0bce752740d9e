use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mydict_api::auth::{self, AppState, AppStateInner};
use mydict_api::middleware::require_auth;
use mydict_api::{friends, messages, notifications, users};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mydict=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MYDICT_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MYDICT_DB_PATH").unwrap_or_else(|_| "mydict.db".into());
    let host = std::env::var("MYDICT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MYDICT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = mydict_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
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
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .route(
            "/notifications/{notification_id}/mark-read",
            post(notifications::mark_read),
        )
        .route(
            "/notifications/mark-all-read",
            post(notifications::mark_all_read),
        )
        .route(
            "/notifications/{notification_id}",
            delete(notifications::delete),
        )
        .route("/users/delete-account", delete(users::delete_account))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("MyDictionary social API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
