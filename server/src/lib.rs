//! Cartsync Server - reconciles offline purchase queues into durable records.
//!
//! Clients buffer cart/purchase events while offline and flush them to
//! `POST /api/cart/sync`. The response tells the client exactly which queued
//! items it may drop; anything else stays queued for the next flush.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod routes;

use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{Config, Environment};
use crate::db::PurchaseStore;
use crate::error::{AppError, INTERNAL_MESSAGE};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PurchaseStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn PurchaseStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

/// Build the application router with its middleware stack.
pub fn build_app(state: AppState) -> Router {
    let environment = state.config.environment;

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(AnyOrigin)
                        .allow_methods(AnyOrigin)
                        .allow_headers(AnyOrigin),
                )
                .layer(CatchPanicLayer::custom(
                    move |err: Box<dyn Any + Send + 'static>| panic_response(err, environment),
                )),
        )
        .with_state(state)
}

/// Turn a handler panic into the "keep the whole batch" response.
fn panic_response(err: Box<dyn Any + Send + 'static>, environment: Environment) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    AppError::ReconciliationFailed {
        message: INTERNAL_MESSAGE.to_string(),
        report: None,
        detail: Some(detail),
    }
    .redacted(environment)
    .into_response()
}
