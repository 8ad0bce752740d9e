use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use mydict_db::StoreError;

/// Handler error type. Everything a handler can fail with funnels through
/// here and comes out as a `{success: false, message}` JSON body; store
/// faults are logged and answered with a generic message, never leaked.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Unauthorized.")]
    Unauthorized,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Store(e) => match e {
                StoreError::UserNotFound
                | StoreError::RequestNotFound
                | StoreError::MessageNotFound
                | StoreError::NotificationNotFound => StatusCode::NOT_FOUND,
                StoreError::SelfRequest
                | StoreError::AlreadyFriends
                | StoreError::DuplicateRequest
                | StoreError::SelfMessage
                | StoreError::NotFriends
                | StoreError::UserExists => StatusCode::BAD_REQUEST,
                StoreError::Sqlite(_) | StoreError::LockPoisoned => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
            "A server error occurred.".to_string()
        } else {
            self.to_string()
        };
        (
            status,
            Json(json!({ "success": false, "message": message })),
        )
            .into_response()
    }
}
