//! In-memory purchase store.
//!
//! Used when `STORE_BACKEND=memory` and by the test suites. It can be told
//! to fail every write, fail writes for specific users, or stall writes, to
//! exercise the reconciler's failure handling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cartsync_engine::{PurchaseInput, PurchaseRecord};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};

use super::{Created, PurchaseStore, StoreError};

/// Process-local purchase store.
#[derive(Debug, Default)]
pub struct MemoryPurchaseStore {
    /// Records by id
    records: DashMap<String, PurchaseRecord>,
    /// Queue id -> record id
    queue_index: DashMap<String, String>,
    unavailable: AtomicBool,
    failing_users: DashSet<String>,
    write_delay_ms: AtomicU64,
}

impl MemoryPurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail writes for one user.
    pub fn fail_for_user(&self, user_id: impl Into<String>) {
        self.failing_users.insert(user_id.into());
    }

    /// Sleep before every write.
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by id.
    pub fn get(&self, id: &str) -> Option<PurchaseRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    /// All records for a user.
    pub fn records_for_user(&self, user_id: &str) -> Vec<PurchaseRecord> {
        self.records
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.value().clone())
            .collect()
    }

    fn insert(&self, purchase: &PurchaseInput) -> PurchaseRecord {
        let record = PurchaseRecord::from_input(
            uuid::Uuid::new_v4().to_string(),
            purchase.clone(),
            Utc::now(),
        );
        self.records.insert(record.id.clone(), record.clone());
        record
    }
}

#[async_trait]
impl PurchaseStore for MemoryPurchaseStore {
    async fn create(&self, purchase: &PurchaseInput) -> Result<Created, StoreError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        if self.failing_users.contains(&purchase.user_id) {
            return Err(StoreError::Unavailable(format!(
                "writes for user {} are failing",
                purchase.user_id
            )));
        }

        let Some(queue_id) = purchase.queue_id.clone() else {
            return Ok(Created::New(self.insert(purchase)));
        };

        match self.queue_index.entry(queue_id) {
            Entry::Occupied(entry) => {
                let existing = self.get(entry.get()).ok_or_else(|| {
                    StoreError::Unavailable(format!("dangling queue id {}", entry.key()))
                })?;
                Ok(Created::Existing(existing))
            }
            Entry::Vacant(entry) => {
                let record = self.insert(purchase);
                entry.insert(record.id.clone());
                Ok(Created::New(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartsync_engine::{normalize, RequestContext};
    use serde_json::json;

    fn input(user: &str, queue_id: Option<&str>) -> PurchaseInput {
        let mut raw = json!({"userId": user, "items": [{"price": 3}]});
        if let Some(id) = queue_id {
            raw["id"] = json!(id);
        }
        normalize(&raw, &RequestContext::default(), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn creates_records() {
        let store = MemoryPurchaseStore::new();
        let created = store.create(&input("u1", Some("q1"))).await.unwrap();

        assert!(!created.is_replay());
        assert_eq!(store.len(), 1);
        let stored = store.get(&created.record().id).unwrap();
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.total, 3.0);
    }

    #[tokio::test]
    async fn same_queue_id_is_replayed() {
        let store = MemoryPurchaseStore::new();
        let first = store.create(&input("u1", Some("q1"))).await.unwrap();
        let second = store.create(&input("u1", Some("q1"))).await.unwrap();

        assert!(second.is_replay());
        assert_eq!(first.record().id, second.record().id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn items_without_queue_id_are_never_deduplicated() {
        let store = MemoryPurchaseStore::new();
        store.create(&input("u1", None)).await.unwrap();
        store.create(&input("u1", None)).await.unwrap();
        assert_eq!(store.records_for_user("u1").len(), 2);
    }

    #[tokio::test]
    async fn simulated_failures() {
        let store = MemoryPurchaseStore::new();
        store.fail_for_user("u2");

        assert!(store.create(&input("u1", None)).await.is_ok());
        assert!(matches!(
            store.create(&input("u2", None)).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(true);
        assert!(store.create(&input("u1", None)).await.is_err());
        store.set_unavailable(false);
        assert!(store.create(&input("u1", None)).await.is_ok());
        assert_eq!(store.len(), 2);
    }
}
