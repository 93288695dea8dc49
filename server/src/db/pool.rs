//! Database connection pool management.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{MemoryPurchaseStore, PgPurchaseStore, PurchaseStore, StoreError};
use crate::config::StoreBackend;

/// Type alias for the database pool.
pub type Pool = PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Open the configured purchase store, ready for writes.
pub async fn connect_store(backend: &StoreBackend) -> Result<Arc<dyn PurchaseStore>, StoreError> {
    match backend {
        StoreBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = create_pool(database_url, *max_connections).await?;

            tracing::info!("Running database migrations...");
            run_migrations(&pool).await?;

            Ok(Arc::new(PgPurchaseStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory purchase store; records are lost on restart");
            Ok(Arc::new(MemoryPurchaseStore::new()))
        }
    }
}
