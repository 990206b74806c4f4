//! Hash command implementation.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::exit_codes::ExitCode;
use crate::utils;

/// Execute the hash command.
pub async fn execute(source: String, dims: Vec<u32>, as_json: bool) -> Result<ExitCode> {
    let fetcher = utils::fetcher()?;
    let fingerprinter = utils::fingerprinter(&dims);
    let fingerprints = utils::load_fingerprints(&fetcher, &fingerprinter, &source).await?;

    info!(source = %source, count = fingerprints.len(), "Computed fingerprints");

    if as_json {
        let entries: Vec<_> = fingerprints.iter().map(|fp| fp.entry()).collect();
        let output = json!({ "source": source, "fingerprints": entries });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(ExitCode::success());
    }

    println!("{} {}", "Source:".dimmed(), source);
    for fp in &fingerprints {
        let label = format!("{}/{}", fp.method, fp.dim);
        println!("   {:<10} {}", label.cyan(), fp.matrix.to_hex());
    }
    Ok(ExitCode::success())
}
