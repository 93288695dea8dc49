//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cartsync_engine::{BatchReport, SkipStage, SkippedItem};
use serde::Serialize;

use crate::config::Environment;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body is not a flush payload
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Every item in a non-empty batch was rejected
    #[error("No items processable ({} received)", .0.total_received)]
    NoItemsProcessable(BatchReport),

    /// Nothing was saved; the client keeps the whole batch
    #[error("Reconciliation failed: {message}")]
    ReconciliationFailed {
        message: String,
        report: Option<BatchReport>,
        detail: Option<String>,
    },

    #[error("Not found")]
    NotFound,
}

impl AppError {
    /// Drop internal detail and store error text when running in production.
    pub fn redacted(self, environment: Environment) -> Self {
        if !environment.is_production() {
            return self;
        }
        match self {
            AppError::ReconciliationFailed {
                message,
                mut report,
                ..
            } => {
                if let Some(report) = report.as_mut() {
                    redact_store_failures(&mut report.skipped);
                }
                AppError::ReconciliationFailed {
                    message,
                    report,
                    detail: None,
                }
            }
            AppError::NoItemsProcessable(mut report) => {
                redact_store_failures(&mut report.skipped);
                AppError::NoItemsProcessable(report)
            }
            other => other,
        }
    }
}

/// Reason shown in place of store error text in production.
pub const STORE_FAILURE_REASON: &str = "store write failed";

/// Replace the reason of every persistence-stage skip with a generic one.
pub fn redact_store_failures(skipped: &mut [SkippedItem]) {
    for item in skipped
        .iter_mut()
        .filter(|s| s.stage == SkipStage::Persistence)
    {
        item.reason = STORE_FAILURE_REASON.to_string();
    }
}

impl From<cartsync_engine::Error> for AppError {
    fn from(err: cartsync_engine::Error) -> Self {
        match err {
            cartsync_engine::Error::InvalidPayload(msg) => AppError::InvalidPayload(msg),
            other => AppError::ReconciliationFailed {
                message: INTERNAL_MESSAGE.to_string(),
                report: None,
                detail: Some(other.to_string()),
            },
        }
    }
}

/// Message for any response that means "keep the whole batch".
pub const INTERNAL_MESSAGE: &str = "Internal server error while processing the queue.";

/// Error response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_received: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            processed_count: None,
            total_received: None,
            skipped: Vec::new(),
            detail: None,
        }
    }

    fn with_report(mut self, report: BatchReport) -> Self {
        self.processed_count = Some(report.processed_count);
        self.total_received = Some(report.total_received);
        self.skipped = report.skipped;
        self
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidPayload(msg) => {
                tracing::warn!("Rejected sync payload: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(format!("Invalid cart data format: {}.", msg)),
                )
            }
            AppError::NoItemsProcessable(report) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("None of the queued items could be processed.")
                    .with_report(report),
            ),
            AppError::ReconciliationFailed {
                message,
                report,
                detail,
            } => {
                tracing::error!(
                    "Reconciliation failed: {} ({})",
                    message,
                    detail.as_deref().unwrap_or("no detail")
                );
                let mut body = ErrorResponse::new(message);
                if let Some(report) = report {
                    body = body.with_report(report);
                }
                body.detail = detail;
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, ErrorResponse::new("Route not found")),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
