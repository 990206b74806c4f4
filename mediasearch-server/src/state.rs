//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use mediasearch_core::{
    ArchiveStore, DocumentStore, MediaFetcher, MemoryStore, QueryEngine, RecordLifecycle,
};

use crate::config::Config;
use crate::error::ApiError;
use crate::store;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Document store shared by every request
    pub store: Arc<dyn DocumentStore>,
    /// Insert/update/delete/drop/repair orchestration
    pub lifecycle: RecordLifecycle,
    /// Select and search
    pub engine: QueryEngine,
}

impl AppState {
    /// Build state around an existing store.
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Result<Self, ApiError> {
        let fetcher = MediaFetcher::new(config.fetch_config())?;
        let lifecycle = RecordLifecycle::new(Arc::new(config.method_table()), Arc::new(fetcher));

        Ok(Self {
            store,
            lifecycle,
            engine: QueryEngine::new(),
        })
    }

    /// State backed by a fresh in-memory store (tests and development).
    pub fn in_memory(config: &Config) -> Result<Self, ApiError> {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// State backed by the store selected in `config`.
    pub async fn from_config(config: &Config) -> Result<Self, ApiError> {
        let store = store::connect(config)
            .await
            .map_err(|e| ApiError::service_unavailable(e.to_string()))?;
        Self::new(store, config)
    }

    /// A fresh archive handle; one per request, its fail-fast flag is
    /// request-scoped.
    pub fn archive(&self) -> ArchiveStore {
        ArchiveStore::new(Arc::clone(&self.store))
    }
}
