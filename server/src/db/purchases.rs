//! PostgreSQL-backed purchase store.

use async_trait::async_trait;
use cartsync_engine::{PurchaseInput, PurchaseMetadata, PurchaseRecord, PurchaseStatus};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{Created, PurchaseStore, StoreError};

/// A stored purchase row from the database.
#[derive(Debug)]
pub struct StoredPurchase {
    pub id: String,
    pub user_id: String,
    pub items: serde_json::Value,
    pub total: f64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub synced_at: DateTime<Utc>,
    pub metadata: Json<PurchaseMetadata>,
    pub queue_id: Option<String>,
    pub attributes: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredPurchase {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredPurchase {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            items: row.try_get("items")?,
            total: row.try_get("total")?,
            timestamp: row.try_get("timestamp")?,
            status: row.try_get("status")?,
            synced_at: row.try_get("synced_at")?,
            metadata: row.try_get("metadata")?,
            queue_id: row.try_get("queue_id")?,
            attributes: row.try_get("attributes")?,
        })
    }
}

impl StoredPurchase {
    /// Convert database row to an engine PurchaseRecord.
    pub fn to_record(&self) -> Result<PurchaseRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            id: self.id.clone(),
            reason,
        };

        let items = match &self.items {
            serde_json::Value::Array(items) => items.clone(),
            _ => return Err(corrupt("items is not an array".to_string())),
        };
        let attributes = match &self.attributes {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            _ => return Err(corrupt("attributes is not an object".to_string())),
        };
        let status: PurchaseStatus = self.status.parse().map_err(corrupt)?;

        Ok(PurchaseRecord {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            items,
            total: self.total,
            timestamp: self.timestamp,
            status,
            synced_at: self.synced_at,
            metadata: self.metadata.0.clone(),
            queue_id: self.queue_id.clone(),
            attributes,
        })
    }
}

/// Purchase store on a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgPurchaseStore {
    pool: PgPool,
}

impl PgPurchaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PurchaseStore for PgPurchaseStore {
    async fn create(&self, purchase: &PurchaseInput) -> Result<Created, StoreError> {
        if let Some(stored) = insert_purchase(&self.pool, purchase).await? {
            return Ok(Created::New(stored.to_record()?));
        }

        // Insert was a no-op: the queue id is already stored.
        let queue_id = purchase.queue_id.as_deref().unwrap_or_default();
        match get_purchase_by_queue_id(&self.pool, queue_id).await? {
            Some(stored) => Ok(Created::Existing(stored.to_record()?)),
            None => Err(StoreError::Unavailable(format!(
                "purchase for queue id {} vanished after conflict",
                queue_id
            ))),
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Insert a purchase.
///
/// Returns `None` when a row with the same queue id already exists.
pub async fn insert_purchase(
    pool: &PgPool,
    purchase: &PurchaseInput,
) -> Result<Option<StoredPurchase>, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let items = serde_json::Value::Array(purchase.items.clone());
    let attributes = serde_json::Value::Object(purchase.attributes.clone());

    sqlx::query_as::<_, StoredPurchase>(
        r#"
        INSERT INTO purchases (
            id, user_id, items, total, timestamp, status,
            synced_at, metadata, queue_id, attributes
        )
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7, $8, $9)
        ON CONFLICT (queue_id) DO NOTHING
        RETURNING id, user_id, items, total, timestamp, status,
                  synced_at, metadata, queue_id, attributes
        "#,
    )
    .bind(&id)
    .bind(&purchase.user_id)
    .bind(&items)
    .bind(purchase.total)
    .bind(purchase.timestamp)
    .bind(purchase.status.as_str())
    .bind(Json(&purchase.metadata))
    .bind(&purchase.queue_id)
    .bind(&attributes)
    .fetch_optional(pool)
    .await
}

/// Get a purchase by its queue correlation id.
pub async fn get_purchase_by_queue_id(
    pool: &PgPool,
    queue_id: &str,
) -> Result<Option<StoredPurchase>, sqlx::Error> {
    sqlx::query_as::<_, StoredPurchase>(
        r#"
        SELECT id, user_id, items, total, timestamp, status,
               synced_at, metadata, queue_id, attributes
        FROM purchases
        WHERE queue_id = $1
        "#,
    )
    .bind(queue_id)
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartsync_engine::{RequestContext, SYNC_SOURCE};
    use chrono::TimeZone;
    use serde_json::json;

    fn row(items: serde_json::Value, status: &str) -> StoredPurchase {
        StoredPurchase {
            id: "p-1".into(),
            user_id: "u1".into(),
            items,
            total: 25.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            status: status.into(),
            synced_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            metadata: Json(PurchaseMetadata::new(&RequestContext::default(), Some("q1"))),
            queue_id: Some("q1".into()),
            attributes: json!({"currency": "EUR"}),
        }
    }

    #[test]
    fn row_converts_to_record() {
        let record = row(json!([{"price": 20}, {"price": 5}]), "synced")
            .to_record()
            .unwrap();
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.status, PurchaseStatus::Synced);
        assert_eq!(record.metadata.source, SYNC_SOURCE);
        assert_eq!(record.attributes["currency"], "EUR");
    }

    #[test]
    fn corrupt_rows_are_reported() {
        assert!(matches!(
            row(json!({"price": 1}), "synced").to_record(),
            Err(StoreError::Corrupt { .. })
        ));
        assert!(matches!(
            row(json!([{"price": 1}]), "refunded").to_record(),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
