//! Sync endpoint routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::handlers::{handle_sync, ClientContext, SyncResponse, SyncSettings};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cart/sync", post(sync_handler))
}

/// POST /api/cart/sync - Reconcile a flushed offline queue.
async fn sync_handler(
    State(state): State<AppState>,
    ClientContext(ctx): ClientContext,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<SyncResponse>> {
    let environment = state.config.environment;
    let Json(payload) = body.map_err(|e| AppError::InvalidPayload(e.body_text()))?;

    handle_sync(
        state.store.as_ref(),
        SyncSettings::from(state.config.as_ref()),
        &ctx,
        &payload,
    )
    .await
    .map(|response| Json(response.redacted(environment)))
    .map_err(|e| e.redacted(environment))
}
