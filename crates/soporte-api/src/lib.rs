pub mod attention;
pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod pages;
pub mod routes;

pub use auth::{AppState, AppStateInner};
pub use error::AppError;
pub use routes::router;

use tracing::error;

/// Runs a blocking storage operation off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&AppStateInner) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::Storage(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
