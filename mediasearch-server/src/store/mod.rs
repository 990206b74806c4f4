//! Document store backends for the server
//!
//! - **PostgreSQL** (production): selected when `DATABASE_URL` is set
//! - **In-memory** (development fallback): records are lost on restart

pub mod postgres;
pub mod sql;

pub use postgres::PostgresStore;

use std::sync::Arc;

use mediasearch_core::store::StoreResult;
use mediasearch_core::{DocumentStore, MemoryStore};

use crate::config::Config;

/// Open the configured document store, running migrations on PostgreSQL.
pub async fn connect(config: &Config) -> StoreResult<Arc<dyn DocumentStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - using in-memory document store, records will be lost on restart!");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
