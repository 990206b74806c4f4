//! Insert, update, delete, drop and repair orchestration.
//!
//! Insert runs fetch, fingerprinting, the same-class scan, the outbound write
//! and then one mirror write per match. Only the outbound write decides the
//! outcome; mirror failures are logged and left for [`Action::Repair`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::archive::ArchiveStore;
use crate::error::{MediaSearchError, Result};
use crate::fetch::MediaFetcher;
use crate::fingerprint::{Fingerprinter, MethodTable};
use crate::media::{parse_mime, validate_ref, MediaUrl};
use crate::model::{normalize_tags, MediaRecord, TagsMode};
use crate::similarity::{RepairReport, SimilarityIndex};

/// Actions addressable on an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Drop,
    Repair,
    Select,
    Search,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Self::Select,
        Self::Search,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Drop,
        Self::Repair,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Self::Insert => "_insert",
            Self::Update => "_update",
            Self::Delete => "_delete",
            Self::Drop => "_drop",
            Self::Repair => "_repair",
            Self::Select => "_select",
            Self::Search => "_search",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Self::Select | Self::Search)
    }

    /// Only insert may bring a missing archive into existence.
    pub fn creates_archive(&self) -> bool {
        matches!(self, Self::Insert)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Action {
    type Err = MediaSearchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .find(|action| action.token() == s)
            .copied()
            .ok_or_else(|| MediaSearchError::validation(format!("unknown action: {s}")))
    }
}

/// Mutation payload as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInput {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MediaInput {
    fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MediaSearchError::validation(format!("{field} is required")))
    }

    pub fn reference(&self) -> Result<&str> {
        let reference = Self::required(&self.reference, "ref")?;
        validate_ref(reference)?;
        Ok(reference)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationFlags {
    /// Overwrite on insert, ignore a missing ref on update and delete.
    pub pass: bool,
    /// Drop a non-empty archive.
    pub force: bool,
    pub tags_mode: TagsMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Outcome {
    Inserted {
        #[serde(rename = "ref")]
        reference: String,
        alike: usize,
    },
    Updated {
        #[serde(rename = "ref")]
        reference: String,
        applied: bool,
    },
    Deleted {
        #[serde(rename = "ref")]
        reference: String,
        removed: bool,
    },
    Dropped {
        records: u64,
    },
    Repaired(RepairReport),
}

#[derive(Clone)]
pub struct RecordLifecycle {
    fingerprinter: Fingerprinter,
    index: SimilarityIndex,
    fetcher: Arc<MediaFetcher>,
}

impl RecordLifecycle {
    pub fn new(methods: Arc<MethodTable>, fetcher: Arc<MediaFetcher>) -> Self {
        Self {
            fingerprinter: Fingerprinter::new(Arc::clone(&methods)),
            index: SimilarityIndex::new(methods),
            fetcher,
        }
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Binds the archive and runs one mutation against it.
    #[instrument(skip_all, fields(provider = %provider, archive = %name, action = %action))]
    pub async fn execute(
        &self,
        archive: &mut ArchiveStore,
        provider: &str,
        name: &str,
        action: Action,
        input: &MediaInput,
        flags: MutationFlags,
    ) -> Result<Outcome> {
        if action.is_read() {
            return Err(not_a_mutation(action));
        }
        if !archive.resolve(provider, name, action.creates_archive()).await? {
            return Err(MediaSearchError::not_found(format!(
                "archive not found: {provider}/{name}"
            )));
        }

        match action {
            Action::Insert => {
                let (reference, alike) = self.insert(archive, input, flags.pass).await?;
                Ok(Outcome::Inserted { reference, alike })
            }
            Action::Update => {
                let reference = input.reference()?;
                let applied = self
                    .update(archive, reference, &input.tags, flags.tags_mode, flags.pass)
                    .await?;
                Ok(Outcome::Updated {
                    reference: reference.to_string(),
                    applied,
                })
            }
            Action::Delete => {
                let reference = input.reference()?;
                let removed = self.delete(archive, reference, flags.pass).await?;
                Ok(Outcome::Deleted {
                    reference: reference.to_string(),
                    removed,
                })
            }
            Action::Drop => Ok(Outcome::Dropped {
                records: archive.drop_archive(flags.force).await?,
            }),
            Action::Repair => Ok(Outcome::Repaired(self.index.repair(archive).await?)),
            Action::Select | Action::Search => Err(not_a_mutation(action)),
        }
    }

    /// Fingerprints and stores a new record; returns its ref and match count.
    #[instrument(skip_all, fields(reference = ?input.reference))]
    pub async fn insert(
        &self,
        archive: &ArchiveStore,
        input: &MediaInput,
        pass: bool,
    ) -> Result<(String, usize)> {
        let reference = input.reference()?;
        let class = parse_mime(MediaInput::required(&input.mime, "mime")?)?;
        let url = MediaInput::required(&input.url, "url")?;
        MediaUrl::parse(url)?;

        let existing = archive.get(reference).await?;
        if existing.is_some() && !pass {
            return Err(MediaSearchError::conflict(format!(
                "ref already exists: {reference}"
            )));
        }

        let bytes = self.fetcher.fetch(url).await?;
        let fingerprinter = self.fingerprinter.clone();
        let fingerprints = tokio::task::spawn_blocking(move || fingerprinter.compute(&bytes, class))
            .await
            .map_err(|e| MediaSearchError::Hash(format!("fingerprint task failed: {e}")))??;

        if let Some(old) = existing {
            info!(reference, "Replacing existing record");
            self.remove(archive, &old).await?;
        }

        let fingerprints: Vec<_> = fingerprints.iter().map(|fp| fp.entry()).collect();
        let alike = self
            .index
            .find_alike(archive, reference, class, &fingerprints)
            .await?;

        let now = Utc::now();
        let record = MediaRecord {
            reference: reference.to_string(),
            class,
            fingerprints,
            alike: alike.clone(),
            tags: normalize_tags(input.tags.iter().cloned()),
            created_on: now,
            updated_on: now,
            reliked_on: now,
        };
        let stored = archive.insert(record).await?;

        let mirrored = self.index.mirror(archive, &stored, &alike).await;
        if mirrored < alike.len() as u64 {
            warn!(
                reference = %stored,
                expected = alike.len(),
                mirrored,
                "Alike graph left asymmetric"
            );
        }
        info!(reference = %stored, alike = alike.len(), "Inserted media");
        Ok((stored, alike.len()))
    }

    /// Applies `tags` under `mode`. A missing ref is NotFound unless `pass`.
    pub async fn update(
        &self,
        archive: &ArchiveStore,
        reference: &str,
        tags: &[String],
        mode: TagsMode,
        pass: bool,
    ) -> Result<bool> {
        validate_ref(reference)?;
        let applied = archive.set_tags(reference, tags, mode).await?;
        if !applied && !pass {
            return Err(MediaSearchError::not_found(format!(
                "ref not found: {reference}"
            )));
        }
        Ok(applied)
    }

    /// Removes a record and its mirrored links. A missing ref is NotFound
    /// unless `pass`.
    pub async fn delete(&self, archive: &ArchiveStore, reference: &str, pass: bool) -> Result<bool> {
        validate_ref(reference)?;
        let Some(record) = archive.get(reference).await? else {
            if pass {
                return Ok(false);
            }
            return Err(MediaSearchError::not_found(format!(
                "ref not found: {reference}"
            )));
        };
        self.remove(archive, &record).await
    }

    async fn remove(&self, archive: &ArchiveStore, record: &MediaRecord) -> Result<bool> {
        let removed = archive.delete(&record.reference).await?;
        if removed {
            let pruned = self.index.prune(archive, record).await;
            info!(reference = %record.reference, pruned, "Deleted media");
        }
        Ok(removed)
    }
}

fn not_a_mutation(action: Action) -> MediaSearchError {
    MediaSearchError::validation(format!("{action} is not a mutation"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::store::MemoryStore;

    fn lifecycle() -> RecordLifecycle {
        let fetcher = MediaFetcher::new(FetchConfig::default()).unwrap();
        RecordLifecycle::new(Arc::new(MethodTable::default()), Arc::new(fetcher))
    }

    fn input(reference: &str, mime: &str, url: &str) -> MediaInput {
        MediaInput {
            reference: Some(reference.to_string()),
            url: Some(url.to_string()),
            mime: Some(mime.to_string()),
            tags: vec![],
        }
    }

    #[test]
    fn test_action_tokens() {
        assert_eq!("_insert".parse::<Action>().unwrap(), Action::Insert);
        assert_eq!("_search".parse::<Action>().unwrap(), Action::Search);
        assert!("insert".parse::<Action>().is_err());
        assert!(Action::Insert.creates_archive());
        assert!(Action::ALL
            .iter()
            .filter(|a| **a != Action::Insert)
            .all(|a| !a.creates_archive()));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::Inserted {
            reference: "img1".into(),
            alike: 2,
        })
        .unwrap();
        assert_eq!(json["action"], "inserted");
        assert_eq!(json["ref"], "img1");

        let json = serde_json::to_value(Outcome::Repaired(RepairReport {
            mirrors_restored: 1,
            dangling_pruned: 0,
        }))
        .unwrap();
        assert_eq!(json["mirrors_restored"], 1);
    }

    #[tokio::test]
    async fn test_non_insert_actions_do_not_create_archive() {
        let store = Arc::new(MemoryStore::new());
        let lc = lifecycle();
        for action in [Action::Update, Action::Delete, Action::Drop, Action::Repair] {
            let mut archive = ArchiveStore::new(store.clone());
            let err = lc
                .execute(
                    &mut archive,
                    "acme",
                    "photos",
                    action,
                    &input("img1", "image/png", "file:///nope.png"),
                    MutationFlags::default(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, MediaSearchError::NotFound(_)), "{action}");
        }
        let archive = ArchiveStore::new(store);
        assert!(archive.list_providers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_validates_before_fetching() {
        let lc = lifecycle();
        let mut archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        archive.resolve("acme", "photos", true).await.unwrap();

        for bad in [
            input("bad ref", "image/png", "file:///a.png"),
            input("img1", "image/webp", "file:///a.png"),
            input("img1", "video/mp4", "file:///a.png"),
            input("img1", "image/png", "ftp://host/a.png"),
            MediaInput {
                reference: Some("img1".into()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                lc.insert(&archive, &bad, false).await,
                Err(MediaSearchError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_insert_missing_file_is_fetch_error() {
        let lc = lifecycle();
        let mut archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        archive.resolve("acme", "photos", true).await.unwrap();
        let err = lc
            .insert(&archive, &input("img1", "image/png", "file:///does/not/exist.png"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaSearchError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_pass_semantics() {
        let lc = lifecycle();
        let mut archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        archive.resolve("acme", "photos", true).await.unwrap();

        assert!(matches!(
            lc.update(&archive, "ghost", &[], TagsMode::Set, false).await,
            Err(MediaSearchError::NotFound(_))
        ));
        assert!(!lc
            .update(&archive, "ghost", &[], TagsMode::Set, true)
            .await
            .unwrap());
        assert!(matches!(
            lc.delete(&archive, "ghost", false).await,
            Err(MediaSearchError::NotFound(_))
        ));
        assert!(!lc.delete(&archive, "ghost", true).await.unwrap());
    }
}
