//! Common utility functions shared across CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use mediasearch_core::{
    FetchConfig, Fingerprint, Fingerprinter, MediaClass, MediaFetcher, MethodTable,
};
use tracing::debug;

/// Turns a command-line source into a media URL.
///
/// Anything with a scheme is passed through for validation; bare paths become
/// `file:` URLs resolved against the working directory.
pub fn media_url(source: &str) -> String {
    if source.starts_with("file:") || source.contains("://") {
        source.to_string()
    } else {
        format!("file:{source}")
    }
}

/// Fetcher resolving relative paths against the current directory.
pub fn fetcher() -> Result<MediaFetcher> {
    let base_path = std::env::current_dir().context("Failed to read current directory")?;
    Ok(MediaFetcher::new(FetchConfig {
        base_path,
        ..Default::default()
    })?)
}

pub fn fingerprinter(dims: &[u32]) -> Fingerprinter {
    Fingerprinter::new(Arc::new(MethodTable::default().with_dimensions(dims)))
}

/// Fetches `source` and computes its image fingerprints.
pub async fn load_fingerprints(
    fetcher: &MediaFetcher,
    fingerprinter: &Fingerprinter,
    source: &str,
) -> Result<Vec<Fingerprint>> {
    let bytes = fetcher
        .fetch(&media_url(source))
        .await
        .with_context(|| format!("Failed to load {source}"))?;
    debug!(source, bytes = bytes.len(), "Loaded media");

    fingerprinter
        .compute(&bytes, MediaClass::Image)
        .with_context(|| format!("Failed to fingerprint {source}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url() {
        assert_eq!(media_url("a.png"), "file:a.png");
        assert_eq!(media_url("/tmp/a.png"), "file:/tmp/a.png");
        assert_eq!(media_url("file:///tmp/a.png"), "file:///tmp/a.png");
        assert_eq!(media_url("https://x.test/a.png"), "https://x.test/a.png");
        assert_eq!(media_url("ftp://x.test/a.png"), "ftp://x.test/a.png");
    }

    #[test]
    fn test_fingerprinter_uses_requested_dims() {
        let fp = fingerprinter(&[8]);
        assert!(fp.methods().iter().all(|m| m.dimensions == vec![8]));
    }
}
