//! Mediasearch Core - perceptual fingerprints and similarity search for media archives
//!
//! This crate computes perceptual fingerprints for images, keeps a similarity
//! ("alike") graph between records of an archive and answers tag-filtered
//! listing and similarity queries.
//!
//! # Features
//!
//! - dhash and phash fingerprints at configurable bit dimensions
//! - Per-method threshold tables with floor lookup
//! - Exhaustive same-class matching on insert with mirrored alike links
//! - Tag-group filters, ordering and pagination over any [`DocumentStore`]
//! - Bounded, retried media fetch for `file:`, `http:` and `https:` URLs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediasearch_core::{
//!     Action, ArchiveStore, FetchConfig, MediaFetcher, MediaInput, MemoryStore, MethodTable,
//!     MutationFlags, QueryEngine, RecordLifecycle, SearchQuery,
//! };
//!
//! # async fn example() -> mediasearch_core::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let fetcher = Arc::new(MediaFetcher::new(FetchConfig::default())?);
//! let lifecycle = RecordLifecycle::new(Arc::new(MethodTable::default()), fetcher);
//!
//! let mut archive = ArchiveStore::new(store);
//! let input = MediaInput {
//!     reference: Some("img1".into()),
//!     url: Some("file:///tmp/a.png".into()),
//!     mime: Some("image/png".into()),
//!     tags: vec!["cat".into()],
//! };
//! lifecycle
//!     .execute(&mut archive, "acme", "photos", Action::Insert, &input, MutationFlags::default())
//!     .await?;
//!
//! let query = SearchQuery { seeds: vec!["img1".into()], ..Default::default() };
//! let found = QueryEngine::new().search(&archive, &query).await?;
//! println!("{} similar items", found.meta.total);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod compare;
pub mod error;
pub mod fetch;
pub mod fingerprint;
pub mod lifecycle;
pub mod media;
pub mod model;
pub mod query;
pub mod similarity;
pub mod store;

// Re-export main types for convenience
pub use archive::ArchiveStore;
pub use compare::Comparator;
pub use error::{MediaSearchError, Result};
pub use fetch::{FetchConfig, MediaFetcher};
pub use fingerprint::{BitMatrix, Fingerprint, Fingerprinter, MethodTable, ThresholdTable};
pub use lifecycle::{Action, MediaInput, MutationFlags, Outcome, RecordLifecycle};
pub use model::{
    AlikeLink, ArchiveEntry, Evaluation, FingerprintEntry, MediaClass, MediaRecord, SortOrder,
    TagsMode, TimestampField,
};
pub use query::{Envelope, MediaItem, Meta, QueryEngine, SearchQuery, SelectQuery, TagFilter};
pub use similarity::{RepairReport, SimilarityIndex};
pub use store::{DocumentStore, Filter, FindOptions, MemoryStore, StoreError, Update, UpdateOp};
