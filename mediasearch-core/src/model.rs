//! Record shapes persisted per archive.
//!
//! Every persisted shape is an explicit struct; optional fields are marked as
//! such up front rather than probed per call site.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MediaSearchError;

/// Media class of a record, taken from the first half of its mime type.
///
/// Only `Image` has fingerprinting methods; `Video` and `Audio` are part of the
/// data model but no method applies to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaClass {
    Image,
    Video,
    Audio,
}

impl MediaClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaClass {
    type Err = MediaSearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            other => Err(MediaSearchError::validation(format!(
                "unknown media class: {other}"
            ))),
        }
    }
}

/// One stored fingerprint: method name, bit dimension and canonical hex form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    pub method: String,
    pub dim: u32,
    pub repr: String,
}

/// Outcome of comparing two fingerprints of the same method and dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub method: String,
    pub dim: u32,
    /// Hamming distance in bits.
    pub diff: u32,
    /// `diff / (dim * dim)`; absent on evaluations written without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<f64>,
}

/// Directed similarity edge from the owning record to `ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlikeLink {
    #[serde(rename = "ref")]
    pub reference: String,
    pub evals: Vec<Evaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(rename = "ref")]
    pub reference: String,
    pub class: MediaClass,
    pub fingerprints: Vec<FingerprintEntry>,
    #[serde(default)]
    pub alike: Vec<AlikeLink>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub reliked_on: DateTime<Utc>,
}

impl MediaRecord {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn links_to(&self, reference: &str) -> bool {
        self.alike.iter().any(|link| link.reference == reference)
    }
}

/// Entry of the archive registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub rank: i64,
    pub provider: String,
    pub archive: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// How `update` applies the submitted tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagsMode {
    /// Replace the tag set.
    #[default]
    Set,
    /// Union with the tag set.
    Add,
    /// Remove the listed tags.
    Pop,
}

impl FromStr for TagsMode {
    type Err = MediaSearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "add" => Ok(Self::Add),
            "pop" => Ok(Self::Pop),
            other => Err(MediaSearchError::validation(format!(
                "unknown tags mode: {other}"
            ))),
        }
    }
}

/// Timestamp fields a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Created,
    Updated,
    Reliked,
}

impl TimestampField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Created => "created_on",
            Self::Updated => "updated_on",
            Self::Reliked => "reliked_on",
        }
    }

    pub fn of(&self, record: &MediaRecord) -> DateTime<Utc> {
        match self {
            Self::Created => record.created_on,
            Self::Updated => record.updated_on,
            Self::Reliked => record.reliked_on,
        }
    }
}

/// Listing order: `ref` ascending or one of the timestamps descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ref,
    Newest(TimestampField),
}

impl SortOrder {
    /// Picks the order from a prefix of the requested token
    /// (`ref*`, `cre*`, `upd*`, `rel*`); anything else falls back to `ref`.
    pub fn from_token(token: &str) -> Self {
        let token = token.to_ascii_lowercase();
        if token.starts_with("cre") {
            Self::Newest(TimestampField::Created)
        } else if token.starts_with("upd") {
            Self::Newest(TimestampField::Updated)
        } else if token.starts_with("rel") {
            Self::Newest(TimestampField::Reliked)
        } else {
            Self::Ref
        }
    }

    /// Compares two records under this order, ties broken by `ref` ascending.
    pub fn compare(&self, a: &MediaRecord, b: &MediaRecord) -> std::cmp::Ordering {
        match self {
            Self::Ref => a.reference.cmp(&b.reference),
            Self::Newest(field) => field
                .of(b)
                .cmp(&field.of(a))
                .then_with(|| a.reference.cmp(&b.reference)),
        }
    }
}

/// Collapses duplicate and empty tags, keeping first occurrence order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(reference: &str, age_secs: i64) -> MediaRecord {
        let ts = Utc::now() - Duration::seconds(age_secs);
        MediaRecord {
            reference: reference.to_string(),
            class: MediaClass::Image,
            fingerprints: vec![],
            alike: vec![],
            tags: vec![],
            created_on: ts,
            updated_on: ts,
            reliked_on: ts,
        }
    }

    #[test]
    fn test_sort_order_prefix_match() {
        assert_eq!(SortOrder::from_token("ref"), SortOrder::Ref);
        assert_eq!(
            SortOrder::from_token("created"),
            SortOrder::Newest(TimestampField::Created)
        );
        assert_eq!(
            SortOrder::from_token("UPDATED"),
            SortOrder::Newest(TimestampField::Updated)
        );
        assert_eq!(
            SortOrder::from_token("reliked_on"),
            SortOrder::Newest(TimestampField::Reliked)
        );
        assert_eq!(SortOrder::from_token("similarity"), SortOrder::Ref);
    }

    #[test]
    fn test_newest_order_puts_recent_first() {
        let old = record("a", 100);
        let new = record("b", 1);
        let order = SortOrder::Newest(TimestampField::Created);
        assert_eq!(order.compare(&new, &old), std::cmp::Ordering::Less);
        assert_eq!(SortOrder::Ref.compare(&old, &new), std::cmp::Ordering::Less);
    }

    #[test]
    fn test_normalize_tags_collapses_duplicates() {
        let tags = normalize_tags(["cat", "dog", "cat", "", "dog"]);
        assert_eq!(tags, vec!["cat".to_string(), "dog".to_string()]);
    }

    #[test]
    fn test_record_serializes_ref_field() {
        let json = serde_json::to_value(record("img1", 0)).unwrap();
        assert_eq!(json["ref"], "img1");
        assert_eq!(json["class"], "image");
    }

    #[test]
    fn test_evaluation_without_dist_deserializes() {
        let eval: Evaluation =
            serde_json::from_str(r#"{"method":"dhash","dim":16,"diff":3}"#).unwrap();
        assert_eq!(eval.dist, None);
    }

    #[test]
    fn test_parse_modes_and_classes() {
        assert_eq!("pop".parse::<TagsMode>().unwrap(), TagsMode::Pop);
        assert!("del".parse::<TagsMode>().is_err());
        assert_eq!("audio".parse::<MediaClass>().unwrap(), MediaClass::Audio);
        assert!("text".parse::<MediaClass>().is_err());
    }
}
