//! In-memory document store.
//!
//! Suitable for tests and single-process deployments; contents are lost on
//! restart. Each archive is its own map keyed by `ref`, so the map entry is
//! the uniqueness guard and per-document updates run under the shard lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;

use super::{DocumentStore, Filter, FindOptions, StoreError, StoreResult, Update};
use crate::model::{ArchiveEntry, MediaRecord};

type Collection = Arc<DashMap<String, MediaRecord>>;

#[derive(Default)]
pub struct MemoryStore {
    /// Archive registry; the write lock serializes rank assignment.
    registry: RwLock<Vec<ArchiveEntry>>,
    /// Media collections by archive rank.
    collections: DashMap<i64, Collection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, rank: i64) -> Option<Collection> {
        self.collections.get(&rank).map(|c| Arc::clone(c.value()))
    }

    fn require_collection(&self, rank: i64) -> StoreResult<Collection> {
        self.collection(rank)
            .ok_or_else(|| StoreError::Query(format!("no collection for archive rank {rank}")))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_archive(
        &self,
        provider: &str,
        archive: &str,
    ) -> StoreResult<Option<ArchiveEntry>> {
        let registry = self.registry.read().await;
        Ok(registry
            .iter()
            .find(|e| e.provider == provider && e.archive == archive)
            .cloned())
    }

    async fn create_archive(&self, provider: &str, archive: &str) -> StoreResult<ArchiveEntry> {
        let mut registry = self.registry.write().await;
        if let Some(existing) = registry
            .iter()
            .find(|e| e.provider == provider && e.archive == archive)
        {
            return Ok(existing.clone());
        }

        let rank = registry.iter().map(|e| e.rank).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let entry = ArchiveEntry {
            rank,
            provider: provider.to_string(),
            archive: archive.to_string(),
            created_on: now,
            updated_on: now,
        };
        self.collections.insert(rank, Arc::new(DashMap::new()));
        registry.push(entry.clone());
        Ok(entry)
    }

    async fn remove_archive(&self, rank: i64) -> StoreResult<bool> {
        let mut registry = self.registry.write().await;
        let before = registry.len();
        registry.retain(|e| e.rank != rank);
        self.collections.remove(&rank);
        Ok(registry.len() != before)
    }

    async fn distinct_providers(&self) -> StoreResult<Vec<String>> {
        let registry = self.registry.read().await;
        let mut providers: Vec<String> = registry.iter().map(|e| e.provider.clone()).collect();
        providers.sort();
        providers.dedup();
        Ok(providers)
    }

    async fn distinct_archives(&self, provider: &str) -> StoreResult<Vec<String>> {
        let registry = self.registry.read().await;
        let mut archives: Vec<String> = registry
            .iter()
            .filter(|e| e.provider == provider)
            .map(|e| e.archive.clone())
            .collect();
        archives.sort();
        archives.dedup();
        Ok(archives)
    }

    async fn find_one(&self, rank: i64, filter: &Filter) -> StoreResult<Option<MediaRecord>> {
        let Some(collection) = self.collection(rank) else {
            return Ok(None);
        };
        if let Filter::Ref(reference) = filter {
            return Ok(collection.get(reference).map(|r| r.value().clone()));
        }
        let found = collection
            .iter()
            .find(|r| filter.matches(r.value()))
            .map(|r| r.value().clone());
        Ok(found)
    }

    async fn find(
        &self,
        rank: i64,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<MediaRecord>> {
        let Some(collection) = self.collection(rank) else {
            return Ok(Vec::new());
        };
        let mut records: Vec<MediaRecord> = collection
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| options.order.compare(a, b));

        let window = records.into_iter().skip(options.skip);
        Ok(match options.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        })
    }

    async fn count(&self, rank: i64, filter: &Filter) -> StoreResult<u64> {
        let Some(collection) = self.collection(rank) else {
            return Ok(0);
        };
        Ok(collection.iter().filter(|r| filter.matches(r.value())).count() as u64)
    }

    async fn insert(&self, rank: i64, record: MediaRecord) -> StoreResult<()> {
        let collection = self.require_collection(rank)?;
        let result = match collection.entry(record.reference.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(record.reference)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        };
        result
    }

    async fn update(&self, rank: i64, filter: &Filter, update: &Update) -> StoreResult<u64> {
        let Some(collection) = self.collection(rank) else {
            return Ok(0);
        };
        if let Filter::Ref(reference) = filter {
            return Ok(match collection.get_mut(reference) {
                Some(mut record) => {
                    update.apply(record.value_mut());
                    1
                }
                None => 0,
            });
        }

        let mut matched = 0;
        for mut record in collection.iter_mut() {
            if filter.matches(record.value()) {
                update.apply(record.value_mut());
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn remove(&self, rank: i64, filter: &Filter) -> StoreResult<u64> {
        let Some(collection) = self.collection(rank) else {
            return Ok(0);
        };
        let mut removed = 0;
        collection.retain(|_, record| {
            let hit = filter.matches(record);
            if hit {
                removed += 1;
            }
            !hit
        });
        Ok(removed)
    }
}
