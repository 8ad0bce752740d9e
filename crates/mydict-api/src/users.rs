use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{extract::State, response::IntoResponse, Extension, Json};
use tracing::info;

use mydict_db::StoreError;
use mydict_types::api::{Claims, DeleteAccountRequest, StatusResponse};

use crate::{run_blocking, ApiError, AppState};

/// Password-confirmed, fully cascading account deletion. The store removes
/// the user and every row they touch in one transaction.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DeleteAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    if req.password.trim().is_empty() {
        return Err(ApiError::Validation(
            "Enter your password to delete your account.".into(),
        ));
    }

    let user = state
        .db
        .get_user_by_id(user_id)?
        .ok_or(ApiError::Store(StoreError::UserNotFound))?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {}", e))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Validation("Password is incorrect.".into()))?;

    run_blocking(move || state.db.delete_account(user_id)).await?;
    info!("Deleted account {} ({})", user_id, user.username);

    Ok(Json(StatusResponse {
        success: true,
        message: "Your account and all of your data have been deleted.".into(),
    }))
}
