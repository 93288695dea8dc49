//! Sync handler - reconciles a flushed offline queue into purchase records.

use std::time::Duration;

use cartsync_engine::{
    extract_batch, normalize, BatchOutcome, ItemState, PurchaseSummary, QueuedItem, Reconciler,
    RequestContext, SkippedItem, Timestamp,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Config, Environment};
use crate::db::PurchaseStore;
use crate::error::{redact_store_failures, AppError, Result, INTERNAL_MESSAGE};

/// Response for a successful flush.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    /// Items durably stored (including replays)
    pub processed_count: usize,
    /// Items in the submitted batch
    pub total_received: usize,
    pub purchases: Vec<PurchaseSummary>,
    /// Items the client must keep
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
}

impl SyncResponse {
    fn empty() -> Self {
        Self {
            success: true,
            message: "Sync queue empty, no action required.".to_string(),
            processed_count: 0,
            total_received: 0,
            purchases: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Hide store error text from skipped items in production.
    pub fn redacted(mut self, environment: Environment) -> Self {
        if environment.is_production() {
            redact_store_failures(&mut self.skipped);
        }
        self
    }
}

/// Knobs for one reconciliation run.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    /// Upper bound for a single store write
    pub store_timeout: Duration,
    /// Items persisted at the same time
    pub concurrency: usize,
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            store_timeout: config.store_timeout,
            concurrency: config.sync_concurrency.max(1),
        }
    }
}

/// Process a flushed queue from a client.
pub async fn handle_sync(
    store: &dyn PurchaseStore,
    settings: SyncSettings,
    ctx: &RequestContext,
    payload: &Value,
) -> Result<SyncResponse> {
    let batch = extract_batch(payload)?;

    if batch.is_empty() {
        return Ok(SyncResponse::empty());
    }

    tracing::info!("Received {} queued items to process", batch.len());

    let now = Utc::now();
    let mut reconciler = Reconciler::new(batch.len());

    let pending: Vec<_> = batch
        .iter()
        .enumerate()
        .map(|(index, raw)| process_item(store, settings.store_timeout, ctx, now, index, raw))
        .collect();

    // Buffered keeps batch order; every item resolves independently.
    let outcomes: Vec<(usize, Option<String>, ItemState)> = stream::iter(pending)
        .buffered(settings.concurrency.max(1))
        .collect()
        .await;

    for (index, queue_id, state) in outcomes {
        reconciler.resolve(index, queue_id, state)?;
    }

    let outcome = reconciler.finish()?;
    if let Some(report) = outcome.report() {
        if outcome.is_success() {
            tracing::info!(
                "Processed {} of {} queued items ({} rejected, {} failed)",
                report.processed_count,
                report.total_received,
                report.rejected_count(),
                report.failed_count()
            );
        } else {
            tracing::warn!(
                "Saved none of {} queued items ({} rejected, {} failed)",
                report.total_received,
                report.rejected_count(),
                report.failed_count()
            );
        }
    }

    match outcome {
        BatchOutcome::Empty => Ok(SyncResponse::empty()),
        BatchOutcome::Accepted(report) => Ok(SyncResponse {
            success: true,
            message: "Cart queue processed successfully.".to_string(),
            processed_count: report.processed_count,
            total_received: report.total_received,
            purchases: report.purchases,
            skipped: report.skipped,
        }),
        BatchOutcome::NoItemsProcessable(report) => Err(AppError::NoItemsProcessable(report)),
        BatchOutcome::StoreUnavailable(report) => {
            let detail = format!(
                "{} of {} items failed to persist, nothing was saved",
                report.failed_count(),
                report.total_received
            );
            Err(AppError::ReconciliationFailed {
                message: INTERNAL_MESSAGE.to_string(),
                report: Some(report),
                detail: Some(detail),
            })
        }
    }
}

/// Normalize and persist one batch element.
async fn process_item(
    store: &dyn PurchaseStore,
    store_timeout: Duration,
    ctx: &RequestContext,
    now: Timestamp,
    index: usize,
    raw: &Value,
) -> (usize, Option<String>, ItemState) {
    let input = match normalize(raw, ctx, now) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!("Skipping queued item {}: {}", index, e);
            let queue_id = QueuedItem::from_value(raw).ok().and_then(|q| q.queue_id());
            return (index, queue_id, ItemState::Rejected(e.to_string()));
        }
    };

    let queue_id = input.queue_id.clone();
    let state = match tokio::time::timeout(store_timeout, store.create(&input)).await {
        Ok(Ok(created)) => {
            if created.is_replay() {
                tracing::debug!(
                    "Queued item {} already stored as {}",
                    index,
                    created.record().id
                );
            }
            ItemState::Persisted(created.record().summary(created.is_replay()))
        }
        Ok(Err(e)) => {
            tracing::error!("Failed to persist queued item {}: {}", index, e);
            ItemState::PersistFailed(e.to_string())
        }
        Err(_) => {
            tracing::error!(
                "Persisting queued item {} timed out after {:?}",
                index,
                store_timeout
            );
            ItemState::PersistFailed(format!("store write timed out after {:?}", store_timeout))
        }
    };

    (index, queue_id, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryPurchaseStore;
    use serde_json::json;

    fn settings() -> SyncSettings {
        SyncSettings {
            store_timeout: Duration::from_secs(2),
            concurrency: 4,
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Some("10.1.1.1".into()), Some("service-worker".into()))
    }

    #[tokio::test]
    async fn single_item_scenario() {
        let store = MemoryPurchaseStore::new();
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 20}, {"price": 5}], "id": "q1"}
        ]});

        let response = handle_sync(&store, settings(), &ctx(), &payload).await.unwrap();

        assert!(response.success);
        assert_eq!(response.processed_count, 1);
        assert_eq!(response.total_received, 1);
        let purchase = &response.purchases[0];
        assert_eq!(purchase.user_id, "u1");
        assert_eq!(purchase.total, 25.0);
        assert_eq!(purchase.item_count, 2);

        let stored = store.get(&purchase.id).unwrap();
        assert_eq!(stored.metadata.client_ip, "10.1.1.1");
        assert_eq!(stored.metadata.user_agent, "service-worker");
        assert_eq!(stored.metadata.queue_id, "q1");
    }

    #[tokio::test]
    async fn empty_batch_is_noop() {
        let store = MemoryPurchaseStore::new();
        let response = handle_sync(&store, settings(), &ctx(), &json!({"items": []}))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.processed_count, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalid_payload_is_rejected_before_processing() {
        let store = MemoryPurchaseStore::new();
        let err = handle_sync(&store, settings(), &ctx(), &json!({"items": "not-an-array"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn per_user_store_failure_is_isolated() {
        let store = MemoryPurchaseStore::new();
        store.fail_for_user("u2");
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 1}], "id": "q1"},
            {"userId": "u2", "items": [{"price": 2}], "id": "q2"},
            {"userId": "u3", "items": [{"price": 3}], "id": "q3"}
        ]});

        let response = handle_sync(&store, settings(), &ctx(), &payload).await.unwrap();
        assert_eq!(response.processed_count, 2);
        assert_eq!(response.skipped.len(), 1);
        assert_eq!(response.skipped[0].queue_id.as_deref(), Some("q2"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn production_response_hides_store_errors() {
        let store = MemoryPurchaseStore::new();
        store.fail_for_user("u2");
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 1}], "id": "q1"},
            {"userId": "u2", "items": [{"price": 2}], "id": "q2"},
            {"items": [{"price": 3}], "id": "q3"}
        ]});

        let response = handle_sync(&store, settings(), &ctx(), &payload)
            .await
            .unwrap()
            .redacted(Environment::Production);

        assert_eq!(response.skipped.len(), 2);
        assert_eq!(response.skipped[0].reason, crate::error::STORE_FAILURE_REASON);
        assert!(!response.skipped[0].reason.contains("u2"));
        assert!(response.skipped[1].reason.contains("userId"));
    }

    #[tokio::test]
    async fn development_response_keeps_store_errors() {
        let store = MemoryPurchaseStore::new();
        store.fail_for_user("u2");
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 1}]},
            {"userId": "u2", "items": [{"price": 2}]}
        ]});

        let response = handle_sync(&store, settings(), &ctx(), &payload)
            .await
            .unwrap()
            .redacted(Environment::Development);

        assert!(response.skipped[0].reason.contains("u2"));
    }

    #[tokio::test]
    async fn slow_store_writes_time_out() {
        let store = MemoryPurchaseStore::new();
        store.set_write_delay(Duration::from_secs(10));
        let settings = SyncSettings {
            store_timeout: Duration::from_millis(20),
            concurrency: 2,
        };
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 1}]},
            {"userId": "u2", "items": [{"price": 1}]}
        ]});

        let err = handle_sync(&store, settings, &ctx(), &payload).await.unwrap_err();
        match err {
            AppError::ReconciliationFailed { report, .. } => {
                let report = report.unwrap();
                assert_eq!(report.processed_count, 0);
                assert_eq!(report.failed_count(), 2);
            }
            other => panic!("expected ReconciliationFailed, got {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn replayed_batch_does_not_duplicate() {
        let store = MemoryPurchaseStore::new();
        let payload = json!({"items": [
            {"userId": "u1", "items": [{"price": 1}], "id": "q1"},
            {"userId": "u1", "items": [{"price": 2}], "id": "q2"}
        ]});

        let first = handle_sync(&store, settings(), &ctx(), &payload).await.unwrap();
        let second = handle_sync(&store, settings(), &ctx(), &payload).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(second.processed_count, 2);
        assert!(second.purchases.iter().all(|p| p.replayed));
        assert_eq!(first.purchases[0].id, second.purchases[0].id);
    }
}
