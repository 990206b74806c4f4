//! Abstract document store.
//!
//! The core talks to persistence only through [`DocumentStore`]: an archive
//! registry with an atomic rank sequence, plus per-archive media collections
//! queried with structured [`Filter`]s and mutated with structured
//! [`Update`] operators. Backends apply every operator of one update to a
//! single document atomically; nothing spans two documents.
//!
//! - [`MemoryStore`]: process-local, used by tests and servers without a
//!   database
//! - the PostgreSQL backend lives in the server crate

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{AlikeLink, ArchiveEntry, MediaClass, MediaRecord, SortOrder, TimestampField};

/// Errors raised by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique key already present
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend unreachable
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Statement or operator failed
    #[error("Store query error: {0}")]
    Query(String),

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Schema setup failed
    #[error("Migration error: {0}")]
    Migration(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Structured predicate over media records.
///
/// Values are carried as data and bound as parameters by backends; nothing is
/// ever turned into an evaluable expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    Ref(String),
    RefIn(Vec<String>),
    Class(MediaClass),
    /// Record carries at least one of the tags.
    HasAnyTag(Vec<String>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn and(filters: Vec<Filter>) -> Self {
        match filters.len() {
            0 => Self::All,
            1 => filters.into_iter().next().unwrap_or(Self::All),
            _ => Self::And(filters),
        }
    }

    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn matches(&self, record: &MediaRecord) -> bool {
        match self {
            Self::All => true,
            Self::Ref(reference) => record.reference == *reference,
            Self::RefIn(refs) => refs.iter().any(|r| *r == record.reference),
            Self::Class(class) => record.class == *class,
            Self::HasAnyTag(tags) => tags.iter().any(|t| record.has_tag(t)),
            Self::And(filters) => filters.iter().all(|f| f.matches(record)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Self::Not(filter) => !filter.matches(record),
        }
    }
}

/// One structured single-document mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    SetTags(Vec<String>),
    /// Set-union with the current tags.
    AddTags(Vec<String>),
    /// Remove every listed tag.
    PullTags(Vec<String>),
    PushAlike(AlikeLink),
    /// Remove every alike link whose `ref` equals the value.
    PullAlike(String),
    Touch(TimestampField, DateTime<Utc>),
}

/// Ordered list of operators applied to each matching document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn op(mut self, op: UpdateOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn touch(self, field: TimestampField) -> Self {
        self.op(UpdateOp::Touch(field, Utc::now()))
    }

    pub fn apply(&self, record: &mut MediaRecord) {
        for op in &self.ops {
            match op {
                UpdateOp::SetTags(tags) => record.tags = tags.clone(),
                UpdateOp::AddTags(tags) => {
                    for tag in tags {
                        if !record.has_tag(tag) {
                            record.tags.push(tag.clone());
                        }
                    }
                }
                UpdateOp::PullTags(tags) => record.tags.retain(|t| !tags.contains(t)),
                UpdateOp::PushAlike(link) => record.alike.push(link.clone()),
                UpdateOp::PullAlike(reference) => {
                    record.alike.retain(|link| link.reference != *reference)
                }
                UpdateOp::Touch(field, at) => match field {
                    TimestampField::Created => record.created_on = *at,
                    TimestampField::Updated => record.updated_on = *at,
                    TimestampField::Reliked => record.reliked_on = *at,
                },
            }
        }
    }
}

/// Sort and window for [`DocumentStore::find`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub order: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Registry entry for `(provider, archive)`, if any.
    async fn find_archive(&self, provider: &str, archive: &str)
        -> StoreResult<Option<ArchiveEntry>>;

    /// Registers `(provider, archive)` with the next sequence rank.
    ///
    /// Idempotent: a concurrent or earlier creation of the same pair yields
    /// the existing entry.
    async fn create_archive(&self, provider: &str, archive: &str) -> StoreResult<ArchiveEntry>;

    /// Removes the registry entry and every record of the archive.
    async fn remove_archive(&self, rank: i64) -> StoreResult<bool>;

    async fn distinct_providers(&self) -> StoreResult<Vec<String>>;

    async fn distinct_archives(&self, provider: &str) -> StoreResult<Vec<String>>;

    async fn find_one(&self, rank: i64, filter: &Filter) -> StoreResult<Option<MediaRecord>>;

    async fn find(
        &self,
        rank: i64,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<MediaRecord>>;

    async fn count(&self, rank: i64, filter: &Filter) -> StoreResult<u64>;

    /// Fails with [`StoreError::DuplicateKey`] when `ref` is taken.
    async fn insert(&self, rank: i64, record: MediaRecord) -> StoreResult<()>;

    /// Applies `update` to every matching record; returns how many matched.
    async fn update(&self, rank: i64, filter: &Filter, update: &Update) -> StoreResult<u64>;

    async fn remove(&self, rank: i64, filter: &Filter) -> StoreResult<u64>;

    /// Liveness probe for readiness checks.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
