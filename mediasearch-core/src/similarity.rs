//! Insert-time similarity matching and alike-graph maintenance.
//!
//! Matching is an exhaustive scan over same-class records. An alike edge is
//! written twice: once as the new record's outbound link and once as a mirror
//! on the matched record. The writes are independent, so a failure between
//! them leaves an outbound-only link; [`SimilarityIndex::repair`] restores
//! such mirrors and prunes links to records that no longer exist.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::ArchiveStore;
use crate::compare::Comparator;
use crate::error::Result;
use crate::fingerprint::MethodTable;
use crate::model::{AlikeLink, Evaluation, FingerprintEntry, MediaClass, MediaRecord};
use crate::store::{Filter, FindOptions};

/// Outcome of a repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub mirrors_restored: u64,
    pub dangling_pruned: u64,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    comparator: Comparator,
}

impl SimilarityIndex {
    pub fn new(methods: Arc<MethodTable>) -> Self {
        Self {
            comparator: Comparator::new(methods),
        }
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Similar evaluations of `fingerprints` against one candidate.
    pub fn evaluate_candidate(
        &self,
        fingerprints: &[FingerprintEntry],
        candidate: &MediaRecord,
    ) -> Vec<Evaluation> {
        let mut by_key: HashMap<(&str, u32), Vec<&FingerprintEntry>> = HashMap::new();
        for entry in &candidate.fingerprints {
            by_key
                .entry((entry.method.as_str(), entry.dim))
                .or_default()
                .push(entry);
        }

        let mut evals = Vec::new();
        for ours in fingerprints {
            let Some(theirs) = by_key.get(&(ours.method.as_str(), ours.dim)) else {
                continue;
            };
            for theirs in theirs {
                match self.comparator.evaluate(ours, theirs) {
                    Ok(Some(eval)) => evals.push(eval),
                    Ok(None) => {}
                    Err(e) => warn!(
                        candidate = %candidate.reference,
                        method = %ours.method,
                        dim = ours.dim,
                        error = %e,
                        "Skipping comparison"
                    ),
                }
            }
        }
        evals
    }

    /// Scans every same-class record and builds the outbound alike list.
    pub async fn find_alike(
        &self,
        archive: &ArchiveStore,
        reference: &str,
        class: MediaClass,
        fingerprints: &[FingerprintEntry],
    ) -> Result<Vec<AlikeLink>> {
        let candidates = archive
            .find(&Filter::Class(class), &FindOptions::default())
            .await?;
        let scanned = candidates.len();

        let links: Vec<AlikeLink> = candidates
            .iter()
            .filter(|candidate| candidate.reference != reference)
            .filter_map(|candidate| {
                let evals = self.evaluate_candidate(fingerprints, candidate);
                if evals.is_empty() {
                    return None;
                }
                debug!(reference, candidate = %candidate.reference, evals = evals.len(), "Matched");
                Some(AlikeLink {
                    reference: candidate.reference.clone(),
                    evals,
                })
            })
            .collect();

        debug!(reference, scanned, matched = links.len(), "Similarity scan finished");
        Ok(links)
    }

    /// Writes the inbound mirror of each outbound link of `reference`.
    ///
    /// Failures are logged and leave the edge one-sided; returns how many
    /// mirrors were written.
    pub async fn mirror(&self, archive: &ArchiveStore, reference: &str, links: &[AlikeLink]) -> u64 {
        let mut written = 0;
        for link in links {
            let inbound = AlikeLink {
                reference: reference.to_string(),
                evals: link.evals.clone(),
            };
            match archive.append_alike(&link.reference, inbound).await {
                Ok(true) => written += 1,
                Ok(false) => warn!(
                    reference,
                    target = %link.reference,
                    "Mirror target vanished, link left one-sided"
                ),
                Err(e) => warn!(
                    reference,
                    target = %link.reference,
                    error = %e,
                    "Mirror write failed, link left one-sided"
                ),
            }
        }
        written
    }

    /// Removes the inbound mirrors of a deleted record's outbound links.
    pub async fn prune(&self, archive: &ArchiveStore, deleted: &MediaRecord) -> u64 {
        let mut pruned = 0;
        for link in &deleted.alike {
            match archive.excise_alike(&link.reference, &deleted.reference).await {
                Ok(true) => pruned += 1,
                Ok(false) => {}
                Err(e) => warn!(
                    reference = %deleted.reference,
                    target = %link.reference,
                    error = %e,
                    "Failed to prune mirrored link"
                ),
            }
        }
        pruned
    }

    /// Restores missing mirrors and drops links to absent records.
    ///
    /// Idempotent: a second pass over an unchanged archive reports zeros.
    pub async fn repair(&self, archive: &ArchiveStore) -> Result<RepairReport> {
        let records = archive.find(&Filter::All, &FindOptions::default()).await?;
        let outbound: HashMap<&str, HashSet<&str>> = records
            .iter()
            .map(|r| {
                (
                    r.reference.as_str(),
                    r.alike.iter().map(|l| l.reference.as_str()).collect(),
                )
            })
            .collect();

        let mut report = RepairReport::default();
        for record in &records {
            let mut seen = HashSet::new();
            for link in &record.alike {
                // one pass per distinct target; excise pulls every copy
                if !seen.insert(link.reference.as_str()) {
                    continue;
                }
                match outbound.get(link.reference.as_str()) {
                    None => {
                        if archive.excise_alike(&record.reference, &link.reference).await? {
                            report.dangling_pruned += 1;
                        }
                    }
                    Some(targets) if !targets.contains(record.reference.as_str()) => {
                        let mirror = AlikeLink {
                            reference: record.reference.clone(),
                            evals: link.evals.clone(),
                        };
                        if archive.append_alike(&link.reference, mirror).await? {
                            report.mirrors_restored += 1;
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        info!(
            mirrors_restored = report.mirrors_restored,
            dangling_pruned = report.dangling_pruned,
            "Alike graph repaired"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::BitMatrix;
    use crate::store::MemoryStore;
    use chrono::Utc;

    fn entry(method: &str, dim: u32, matrix: &BitMatrix) -> FingerprintEntry {
        FingerprintEntry {
            method: method.to_string(),
            dim,
            repr: matrix.to_hex(),
        }
    }

    fn record(reference: &str, class: MediaClass, fingerprints: Vec<FingerprintEntry>) -> MediaRecord {
        let now = Utc::now();
        MediaRecord {
            reference: reference.to_string(),
            class,
            fingerprints,
            alike: vec![],
            tags: vec![],
            created_on: now,
            updated_on: now,
            reliked_on: now,
        }
    }

    fn index() -> SimilarityIndex {
        SimilarityIndex::new(Arc::new(MethodTable::default()))
    }

    async fn archive() -> ArchiveStore {
        let mut archive = ArchiveStore::new(Arc::new(MemoryStore::new()));
        archive.resolve("acme", "photos", true).await.unwrap();
        archive
    }

    #[test]
    fn test_evaluate_candidate_matches_only_same_key() {
        let base = BitMatrix::from_fn(8, 8, |r, c| (r + c) % 2 == 0);
        let near = BitMatrix::from_fn(8, 8, |r, c| (r + c) % 2 == 0 || (r == 0 && c == 1));
        let ours = vec![entry("dhash", 8, &base), entry("phash", 8, &base)];
        let candidate = record(
            "img1",
            MediaClass::Image,
            vec![entry("dhash", 8, &near), entry("dhash", 16, &BitMatrix::from_fn(16, 16, |_, _| true))],
        );

        let evals = index().evaluate_candidate(&ours, &candidate);
        assert_eq!(evals.len(), 1);
        assert_eq!(evals[0].method, "dhash");
        assert_eq!(evals[0].diff, 1);
    }

    #[tokio::test]
    async fn test_find_alike_scans_same_class_only() {
        let archive = archive().await;
        let m = BitMatrix::from_fn(8, 8, |r, _| r < 4);
        archive
            .insert(record("img1", MediaClass::Image, vec![entry("dhash", 8, &m)]))
            .await
            .unwrap();
        archive
            .insert(record("vid1", MediaClass::Video, vec![entry("dhash", 8, &m)]))
            .await
            .unwrap();

        let links = index()
            .find_alike(&archive, "img2", MediaClass::Image, &[entry("dhash", 8, &m)])
            .await
            .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].reference, "img1");
        assert_eq!(links[0].evals[0].dist, Some(0.0));
    }

    #[tokio::test]
    async fn test_mirror_prune_and_repair() {
        let archive = archive().await;
        let idx = index();
        let m = BitMatrix::from_fn(8, 8, |r, _| r < 4);
        let eval = Evaluation {
            method: "dhash".to_string(),
            dim: 8,
            diff: 0,
            dist: Some(0.0),
        };

        archive
            .insert(record("a", MediaClass::Image, vec![entry("dhash", 8, &m)]))
            .await
            .unwrap();
        let mut b = record("b", MediaClass::Image, vec![entry("dhash", 8, &m)]);
        b.alike = vec![
            AlikeLink { reference: "a".into(), evals: vec![eval.clone()] },
            AlikeLink { reference: "ghost".into(), evals: vec![eval.clone()] },
        ];
        archive.insert(b.clone()).await.unwrap();

        // only "a" exists to receive a mirror
        assert_eq!(idx.mirror(&archive, "b", &b.alike).await, 1);
        assert!(archive.get("a").await.unwrap().unwrap().links_to("b"));

        // drop the mirror again to simulate a failed write
        archive.excise_alike("a", "b").await.unwrap();
        let report = idx.repair(&archive).await.unwrap();
        assert_eq!(report, RepairReport { mirrors_restored: 1, dangling_pruned: 1 });
        assert_eq!(idx.repair(&archive).await.unwrap(), RepairReport::default());

        let b = archive.get("b").await.unwrap().unwrap();
        archive.delete("b").await.unwrap();
        assert_eq!(idx.prune(&archive, &b).await, 1);
        assert!(!archive.get("a").await.unwrap().unwrap().links_to("b"));
    }

    #[tokio::test]
    async fn test_repair_counts_duplicate_links_once() {
        let archive = archive().await;
        let m = BitMatrix::from_fn(8, 8, |r, _| r < 4);
        let link = |reference: &str| AlikeLink {
            reference: reference.into(),
            evals: vec![],
        };

        archive
            .insert(record("a", MediaClass::Image, vec![entry("dhash", 8, &m)]))
            .await
            .unwrap();
        let mut b = record("b", MediaClass::Image, vec![entry("dhash", 8, &m)]);
        b.alike = vec![link("ghost"), link("a"), link("ghost"), link("a")];
        archive.insert(b).await.unwrap();

        let report = index().repair(&archive).await.unwrap();
        assert_eq!(report, RepairReport { mirrors_restored: 1, dangling_pruned: 1 });

        let a = archive.get("a").await.unwrap().unwrap();
        assert_eq!(a.alike.iter().filter(|l| l.reference == "b").count(), 1);
        let b = archive.get("b").await.unwrap().unwrap();
        assert!(!b.links_to("ghost"));
    }
}
