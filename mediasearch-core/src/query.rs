//! Tag-filtered listing and similarity-ranked search.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::archive::ArchiveStore;
use crate::error::Result;
use crate::model::{Evaluation, MediaClass, MediaRecord, SortOrder};
use crate::store::{Filter, FindOptions};

/// Tag predicates: `with` needs a tag from every group, `without` rejects
/// any tag of any group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    pub with: Vec<Vec<String>>,
    pub without: Vec<Vec<String>>,
}

impl TagFilter {
    fn clauses(&self) -> Vec<Filter> {
        let mut clauses: Vec<Filter> = self
            .with
            .iter()
            .filter(|group| !group.is_empty())
            .map(|group| Filter::HasAnyTag(group.clone()))
            .collect();

        let excluded: Vec<String> = self.without.iter().flatten().cloned().collect();
        if !excluded.is_empty() {
            clauses.push(Filter::not(Filter::HasAnyTag(excluded)));
        }
        clauses
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub refs: Option<Vec<String>>,
    pub class: Option<MediaClass>,
    pub tags: TagFilter,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub seeds: Vec<String>,
    pub class: Option<MediaClass>,
    pub tags: TagFilter,
    /// Evaluations with a larger `dist` are ignored.
    pub threshold: Option<f64>,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaItem {
    #[serde(rename = "ref")]
    pub reference: String,
    pub class: MediaClass,
    pub tags: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
    pub reliked_on: DateTime<Utc>,
    /// Evaluations that placed this item in a search result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evals: Option<Vec<Evaluation>>,
}

impl From<MediaRecord> for MediaItem {
    fn from(record: MediaRecord) -> Self {
        Self {
            reference: record.reference,
            class: record.class,
            tags: record.tags,
            created_on: record.created_on,
            updated_on: record.updated_on,
            reliked_on: record.reliked_on,
            evals: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Meta {
    /// Offset of the first returned item.
    pub base: usize,
    /// Size of the filtered set before pagination.
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub items: Vec<T>,
}

impl<T> Envelope<T> {
    pub fn empty(base: usize) -> Self {
        Self {
            meta: Meta { base, total: 0 },
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryEngine;

impl QueryEngine {
    pub fn new() -> Self {
        Self
    }

    /// Plain filtered listing. An unbound archive yields an empty result.
    pub async fn select(&self, archive: &ArchiveStore, query: &SelectQuery) -> Result<Envelope<MediaItem>> {
        if !archive.is_bound() {
            return Ok(Envelope::empty(query.offset));
        }

        let mut clauses = Vec::new();
        if let Some(refs) = &query.refs {
            clauses.push(Filter::RefIn(refs.clone()));
        }
        if let Some(class) = query.class {
            clauses.push(Filter::Class(class));
        }
        clauses.extend(query.tags.clauses());
        let filter = Filter::and(clauses);

        let total = archive.count(&filter).await?;
        let records = archive
            .find(
                &filter,
                &FindOptions {
                    order: query.order,
                    skip: query.offset,
                    limit: query.limit,
                },
            )
            .await?;

        debug!(total, returned = records.len(), "Select finished");
        Ok(Envelope {
            meta: Meta {
                base: query.offset,
                total,
            },
            items: records.into_iter().map(MediaItem::from).collect(),
        })
    }

    /// Records alike to any seed, best match first.
    ///
    /// Each target's rank is the minimum `dist` over every surviving
    /// evaluation from every seed; targets without a numeric `dist` go last.
    pub async fn search(&self, archive: &ArchiveStore, query: &SearchQuery) -> Result<Envelope<MediaItem>> {
        if !archive.is_bound() || query.seeds.is_empty() {
            return Ok(Envelope::empty(query.offset));
        }

        let seeds = archive
            .find(&Filter::RefIn(query.seeds.clone()), &FindOptions::default())
            .await?;
        let evals = collect_evaluations(&seeds, query.threshold);
        if evals.is_empty() {
            return Ok(Envelope::empty(query.offset));
        }

        let mut clauses = vec![Filter::RefIn(evals.keys().cloned().collect())];
        if let Some(class) = query.class {
            clauses.push(Filter::Class(class));
        }
        clauses.extend(query.tags.clauses());

        let mut hits: Vec<(Option<f64>, MediaRecord)> = archive
            .find(&Filter::and(clauses), &FindOptions::default())
            .await?
            .into_iter()
            .map(|record| {
                let best = evals.get(&record.reference).and_then(|e| best_distance(e));
                (best, record)
            })
            .collect();

        hits.sort_by(|(da, a), (db, b)| {
            compare_distance(*da, *db).then_with(|| query.order.compare(a, b))
        });

        let total = hits.len() as u64;
        let mut evals = evals;
        let items = hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|(_, record)| {
                let found = evals.remove(&record.reference);
                MediaItem {
                    evals: found,
                    ..MediaItem::from(record)
                }
            })
            .collect::<Vec<_>>();

        debug!(seeds = seeds.len(), total, returned = items.len(), "Search finished");
        Ok(Envelope {
            meta: Meta {
                base: query.offset,
                total,
            },
            items,
        })
    }
}

/// Target ref to every evaluation that survives `threshold`, across seeds.
fn collect_evaluations(seeds: &[MediaRecord], threshold: Option<f64>) -> HashMap<String, Vec<Evaluation>> {
    let mut evals: HashMap<String, Vec<Evaluation>> = HashMap::new();
    for seed in seeds {
        for link in &seed.alike {
            let kept: Vec<Evaluation> = link
                .evals
                .iter()
                .filter(|eval| match (threshold, eval.dist) {
                    (None, _) => true,
                    (Some(limit), Some(dist)) => dist <= limit,
                    (Some(_), None) => false,
                })
                .cloned()
                .collect();
            if !kept.is_empty() {
                evals.entry(link.reference.clone()).or_default().extend(kept);
            }
        }
    }
    evals
}

fn best_distance(evals: &[Evaluation]) -> Option<f64> {
    evals
        .iter()
        .filter_map(|eval| eval.dist)
        .filter(|dist| !dist.is_nan())
        .min_by(|a, b| a.total_cmp(b))
}

/// Ascending, with `None` after every number.
fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlikeLink;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn eval(dist: Option<f64>) -> Evaluation {
        Evaluation {
            method: "dhash".to_string(),
            dim: 8,
            diff: 1,
            dist,
        }
    }

    fn record(reference: &str, tags: &[&str], alike: Vec<AlikeLink>) -> MediaRecord {
        let now = Utc::now();
        MediaRecord {
            reference: reference.to_string(),
            class: MediaClass::Image,
            fingerprints: vec![],
            alike,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_on: now,
            updated_on: now,
            reliked_on: now,
        }
    }

    fn link(reference: &str, dists: &[Option<f64>]) -> AlikeLink {
        AlikeLink {
            reference: reference.to_string(),
            evals: dists.iter().map(|d| eval(*d)).collect(),
        }
    }

    fn groups(list: &[&[&str]]) -> Vec<Vec<String>> {
        list.iter()
            .map(|g| g.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    async fn archive(records: Vec<MediaRecord>) -> ArchiveStore {
        let mut archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        archive.resolve("acme", "photos", true).await.unwrap();
        for record in records {
            archive.insert(record).await.unwrap();
        }
        archive
    }

    fn refs(envelope: &Envelope<MediaItem>) -> Vec<&str> {
        envelope.items.iter().map(|i| i.reference.as_str()).collect()
    }

    #[tokio::test]
    async fn test_select_tag_groups() {
        let archive = archive(vec![record("r", &["a", "b"], vec![])]).await;
        let engine = QueryEngine::new();
        let run = |with: Vec<Vec<String>>, without: Vec<Vec<String>>| {
            let query = SelectQuery {
                tags: TagFilter { with, without },
                ..Default::default()
            };
            let archive = &archive;
            async move { engine.select(archive, &query).await.unwrap().meta.total }
        };

        assert_eq!(run(groups(&[&["a"]]), vec![]).await, 1);
        assert_eq!(run(groups(&[&["a", "c"]]), vec![]).await, 1);
        assert_eq!(run(groups(&[&["a"], &["c"]]), vec![]).await, 0);
        assert_eq!(run(vec![], groups(&[&["x"]])).await, 1);
        assert_eq!(run(vec![], groups(&[&["x"], &["b"]])).await, 0);
    }

    #[tokio::test]
    async fn test_select_total_ignores_window() {
        let archive = archive(
            (0..5)
                .map(|i| record(&format!("img{i}"), &["cat"], vec![]))
                .collect(),
        )
        .await;
        let envelope = QueryEngine::new()
            .select(
                &archive,
                &SelectQuery {
                    offset: 3,
                    limit: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(envelope.meta, Meta { base: 3, total: 5 });
        assert_eq!(refs(&envelope), vec!["img3", "img4"]);

        let past_end = QueryEngine::new()
            .select(
                &archive,
                &SelectQuery {
                    offset: 9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(past_end.meta.total, 5);
        assert!(past_end.items.is_empty());
    }

    #[tokio::test]
    async fn test_select_on_unbound_archive_is_empty() {
        let archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        let envelope = QueryEngine::new()
            .select(&archive, &SelectQuery::default())
            .await
            .unwrap();
        assert_eq!(envelope.meta.total, 0);
    }

    #[tokio::test]
    async fn test_search_ranks_by_best_distance() {
        let archive = archive(vec![
            record("R", &[], vec![link("B", &[Some(0.3)]), link("A", &[Some(0.1)])]),
            record("A", &[], vec![]),
            record("B", &[], vec![]),
        ])
        .await;
        let envelope = QueryEngine::new()
            .search(
                &archive,
                &SearchQuery {
                    seeds: vec!["R".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refs(&envelope), vec!["A", "B"]);
        assert_eq!(envelope.items[0].evals.as_ref().unwrap()[0].dist, Some(0.1));
    }

    #[tokio::test]
    async fn test_search_merges_seeds_and_applies_threshold() {
        let archive = archive(vec![
            record("S1", &[], vec![link("A", &[Some(0.4)]), link("B", &[Some(0.2)])]),
            record("S2", &[], vec![link("A", &[Some(0.05)]), link("C", &[None])]),
            record("A", &["cat"], vec![]),
            record("B", &["dog"], vec![]),
            record("C", &["cat"], vec![]),
        ])
        .await;
        let engine = QueryEngine::new();

        let all = engine
            .search(
                &archive,
                &SearchQuery {
                    seeds: vec!["S1".into(), "S2".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refs(&all), vec!["A", "B", "C"]);
        assert_eq!(all.items[0].evals.as_ref().unwrap().len(), 2);

        let tight = engine
            .search(
                &archive,
                &SearchQuery {
                    seeds: vec!["S1".into(), "S2".into()],
                    threshold: Some(0.1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(refs(&tight), vec!["A"]);
        assert_eq!(tight.items[0].evals.as_ref().unwrap().len(), 1);

        let cats = engine
            .search(
                &archive,
                &SearchQuery {
                    seeds: vec!["S1".into(), "S2".into()],
                    tags: TagFilter {
                        with: groups(&[&["cat"]]),
                        without: vec![],
                    },
                    offset: 1,
                    limit: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cats.meta, Meta { base: 1, total: 2 });
        assert_eq!(refs(&cats), vec!["C"]);
    }

    #[tokio::test]
    async fn test_search_without_matches_is_empty() {
        let archive = archive(vec![record("R", &[], vec![])]).await;
        let engine = QueryEngine::new();
        for seeds in [vec!["R".to_string()], vec!["missing".to_string()], vec![]] {
            let envelope = engine
                .search(
                    &archive,
                    &SearchQuery {
                        seeds,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(envelope.meta.total, 0);
            assert!(envelope.items.is_empty());
        }
    }

    #[test]
    fn test_distance_order_puts_missing_last() {
        assert_eq!(compare_distance(Some(0.5), None), Ordering::Less);
        assert_eq!(compare_distance(None, Some(0.5)), Ordering::Greater);
        assert_eq!(best_distance(&[eval(Some(0.3)), eval(None), eval(Some(0.1))]), Some(0.1));
        assert_eq!(best_distance(&[eval(None)]), None);
    }
}
