//! HTTP route definitions.

mod health;
mod sync;

use crate::error::AppError;
use crate::AppState;
use axum::Router;

/// Create all application routes.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(sync::routes())
        .fallback(not_found)
}

/// Fallback for unknown routes.
async fn not_found() -> AppError {
    AppError::NotFound
}
