//! The purchase store interface.

use async_trait::async_trait;
use cartsync_engine::{PurchaseInput, PurchaseRecord};

/// Result of a create call.
#[derive(Debug, Clone, PartialEq)]
pub enum Created {
    /// A new record was written
    New(PurchaseRecord),
    /// A record with the same queue id already existed; nothing was written
    Existing(PurchaseRecord),
}

impl Created {
    pub fn record(&self) -> &PurchaseRecord {
        match self {
            Created::New(r) | Created::Existing(r) => r,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, Created::Existing(_))
    }
}

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Durable store for purchase records.
///
/// Each `create` is atomic on its own. There is no transaction spanning
/// several calls, and callers may issue calls concurrently.
///
/// Implementations:
/// - `PgPurchaseStore`: PostgreSQL storage
/// - `MemoryPurchaseStore`: in-process storage for development and tests
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Persist a purchase.
    ///
    /// The store assigns the record id and `synced_at`. When the input
    /// carries a queue id that is already stored, the existing record is
    /// returned as [`Created::Existing`].
    async fn create(&self, purchase: &PurchaseInput) -> Result<Created, StoreError>;

    /// Release held resources. Called once on shutdown.
    async fn close(&self) {}
}
