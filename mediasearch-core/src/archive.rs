//! Archive binding and record primitives.
//!
//! An [`ArchiveStore`] lives for one request. It resolves `(provider,
//! archive)` to a registry entry and then exposes CRUD, tag and alike-link
//! primitives against that archive only. After the first storage failure it
//! refuses further work for the rest of the request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{MediaSearchError, Result};
use crate::media::validate_namespace;
use crate::model::{normalize_tags, AlikeLink, ArchiveEntry, MediaRecord, TagsMode, TimestampField};
use crate::store::{DocumentStore, Filter, FindOptions, StoreResult, Update, UpdateOp};

pub struct ArchiveStore {
    store: Arc<dyn DocumentStore>,
    entry: Option<ArchiveEntry>,
    usable: AtomicBool,
}

impl ArchiveStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            entry: None,
            usable: AtomicBool::new(true),
        }
    }

    /// Binds to `(provider, archive)`, creating it when absent and `force`.
    ///
    /// Returns whether an archive is now bound.
    pub async fn resolve(&mut self, provider: &str, archive: &str, force: bool) -> Result<bool> {
        validate_namespace("provider", provider)?;
        validate_namespace("archive", archive)?;
        self.ensure_usable()?;

        let found = self.guard(self.store.find_archive(provider, archive).await)?;
        self.entry = match found {
            Some(entry) => Some(entry),
            None if force => {
                let entry = self.guard(self.store.create_archive(provider, archive).await)?;
                info!(provider, archive, rank = entry.rank, "Created archive");
                Some(entry)
            }
            None => None,
        };
        Ok(self.entry.is_some())
    }

    pub fn entry(&self) -> Option<&ArchiveEntry> {
        self.entry.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.entry.is_some()
    }

    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::Relaxed)
    }

    fn rank(&self) -> Result<i64> {
        self.ensure_usable()?;
        self.entry
            .as_ref()
            .map(|e| e.rank)
            .ok_or_else(|| MediaSearchError::not_found("archive not found"))
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.is_usable() {
            Ok(())
        } else {
            Err(MediaSearchError::Storage(
                "store unavailable after an earlier failure".to_string(),
            ))
        }
    }

    /// Converts a store outcome, marking the binding unusable on failure.
    ///
    /// Duplicate keys are a caller-level conflict and leave the store usable.
    fn guard<T>(&self, result: StoreResult<T>) -> Result<T> {
        result.map_err(|e| {
            let err = MediaSearchError::from(e);
            if matches!(err, MediaSearchError::Storage(_)) {
                error!(error = %err, "Store operation failed");
                self.usable.store(false, Ordering::Relaxed);
            }
            err
        })
    }

    pub async fn get(&self, reference: &str) -> Result<Option<MediaRecord>> {
        let rank = self.rank()?;
        self.guard(
            self.store
                .find_one(rank, &Filter::Ref(reference.to_string()))
                .await,
        )
    }

    pub async fn exists(&self, reference: &str) -> Result<bool> {
        let rank = self.rank()?;
        let count = self.guard(
            self.store
                .count(rank, &Filter::Ref(reference.to_string()))
                .await,
        )?;
        Ok(count > 0)
    }

    /// Stores a new record; a taken `ref` is a [`MediaSearchError::Conflict`].
    pub async fn insert(&self, record: MediaRecord) -> Result<String> {
        let rank = self.rank()?;
        let reference = record.reference.clone();
        self.guard(self.store.insert(rank, record).await)?;
        debug!(reference = %reference, archive_rank = rank, "Inserted record");
        Ok(reference)
    }

    pub async fn delete(&self, reference: &str) -> Result<bool> {
        let rank = self.rank()?;
        let removed = self.guard(
            self.store
                .remove(rank, &Filter::Ref(reference.to_string()))
                .await,
        )?;
        Ok(removed > 0)
    }

    pub async fn set_tags(&self, reference: &str, tags: &[String], mode: TagsMode) -> Result<bool> {
        let rank = self.rank()?;
        let tags = normalize_tags(tags.iter().cloned());
        let op = match mode {
            TagsMode::Set => UpdateOp::SetTags(tags),
            TagsMode::Add => UpdateOp::AddTags(tags),
            TagsMode::Pop => UpdateOp::PullTags(tags),
        };
        let update = Update::new().op(op).touch(TimestampField::Updated);
        self.update_one(rank, reference, &update).await
    }

    /// Pushes one link onto `reference`'s alike list.
    pub async fn append_alike(&self, reference: &str, link: AlikeLink) -> Result<bool> {
        let rank = self.rank()?;
        let update = Update::new()
            .op(UpdateOp::PushAlike(link))
            .touch(TimestampField::Reliked);
        self.update_one(rank, reference, &update).await
    }

    /// Pulls every link to `target` from `reference`'s alike list.
    pub async fn excise_alike(&self, reference: &str, target: &str) -> Result<bool> {
        let rank = self.rank()?;
        let update = Update::new()
            .op(UpdateOp::PullAlike(target.to_string()))
            .touch(TimestampField::Reliked);
        self.update_one(rank, reference, &update).await
    }

    async fn update_one(&self, rank: i64, reference: &str, update: &Update) -> Result<bool> {
        let matched = self.guard(
            self.store
                .update(rank, &Filter::Ref(reference.to_string()), update)
                .await,
        )?;
        Ok(matched > 0)
    }

    pub async fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<MediaRecord>> {
        let rank = self.rank()?;
        self.guard(self.store.find(rank, filter, options).await)
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64> {
        let rank = self.rank()?;
        self.guard(self.store.count(rank, filter).await)
    }

    /// Removes the bound archive. A non-empty archive needs `force`.
    ///
    /// Returns the number of records that were held.
    pub async fn drop_archive(&mut self, force: bool) -> Result<u64> {
        let rank = self.rank()?;
        let held = self.count(&Filter::All).await?;
        if held > 0 && !force {
            return Err(MediaSearchError::conflict(format!(
                "archive holds {held} records"
            )));
        }
        self.guard(self.store.remove_archive(rank).await)?;
        if let Some(entry) = self.entry.take() {
            info!(
                provider = %entry.provider,
                archive = %entry.archive,
                records = held,
                "Dropped archive"
            );
        }
        Ok(held)
    }

    pub async fn list_providers(&self) -> Result<Vec<String>> {
        self.ensure_usable()?;
        self.guard(self.store.distinct_providers().await)
    }

    pub async fn list_archives(&self, provider: &str) -> Result<Vec<String>> {
        validate_namespace("provider", provider)?;
        self.ensure_usable()?;
        self.guard(self.store.distinct_archives(provider).await)
    }
}
