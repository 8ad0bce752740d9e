pub mod auth;
pub mod error;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod notify;
pub mod users;

use mydict_db::StoreError;
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Runs a blocking store call off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed"))
        })?
        .map_err(ApiError::from)
}
