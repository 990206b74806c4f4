//! Compare command implementation.

use anyhow::{Context, Result};
use colored::Colorize;
use mediasearch_core::{Comparator, Fingerprint};
use serde_json::json;
use tracing::{debug, info};

use crate::exit_codes::{ExitCode, NOT_ALIKE};
use crate::utils;

/// Comparison of one method/dimension pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    pub method: String,
    pub dim: u32,
    pub diff: u32,
    pub dist: f64,
    pub alike: bool,
}

/// Compares every method/dimension present in both fingerprint sets.
pub fn compare_sets(
    comparator: &Comparator,
    ours: &[Fingerprint],
    theirs: &[Fingerprint],
) -> Result<Vec<PairResult>> {
    let mut pairs = Vec::new();
    for a in ours {
        let Some(b) = theirs
            .iter()
            .find(|b| b.method == a.method && b.dim == a.dim)
        else {
            debug!(method = %a.method, dim = a.dim, "No counterpart fingerprint");
            continue;
        };

        let diff = comparator
            .distance(&a.method, &a.matrix, &b.matrix)
            .with_context(|| format!("Failed to compare {}/{}", a.method, a.dim))?;
        pairs.push(PairResult {
            method: a.method.clone(),
            dim: a.dim,
            diff,
            dist: Comparator::normalized_distance(diff, a.dim),
            alike: comparator.similar(&a.method, diff, a.dim)?,
        });
    }
    Ok(pairs)
}

/// Execute the compare command.
pub async fn execute(
    a: String,
    b: String,
    dims: Vec<u32>,
    as_json: bool,
    check: bool,
) -> Result<ExitCode> {
    let fetcher = utils::fetcher()?;
    let fingerprinter = utils::fingerprinter(&dims);
    let ours = utils::load_fingerprints(&fetcher, &fingerprinter, &a).await?;
    let theirs = utils::load_fingerprints(&fetcher, &fingerprinter, &b).await?;

    let comparator = Comparator::new(fingerprinter.methods().clone());
    let pairs = compare_sets(&comparator, &ours, &theirs)?;
    let alike = pairs.iter().any(|p| p.alike);

    info!(a = %a, b = %b, pairs = pairs.len(), alike, "Compared media");

    if as_json {
        let evals: Vec<_> = pairs
            .iter()
            .map(|p| {
                json!({
                    "method": p.method,
                    "dim": p.dim,
                    "diff": p.diff,
                    "dist": p.dist,
                    "alike": p.alike,
                })
            })
            .collect();
        let output = json!({ "a": a, "b": b, "alike": alike, "evals": evals });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        for p in &pairs {
            let label = format!("{}/{}", p.method, p.dim);
            let verdict = if p.alike {
                "alike".green()
            } else {
                "differs".red()
            };
            println!(
                "   {:<10} {} {:>4}   {} {:.4}   {}",
                label.cyan(),
                "diff".dimmed(),
                p.diff,
                "dist".dimmed(),
                p.dist,
                verdict
            );
        }
        println!();
        if alike {
            println!("   {}", "ALIKE".green().bold());
        } else {
            println!("   {}", "NOT ALIKE".red().bold());
        }
    }

    if check && !alike {
        return Ok(ExitCode::error(NOT_ALIKE, format!("{a} and {b} are not alike")));
    }
    Ok(ExitCode::success())
}
