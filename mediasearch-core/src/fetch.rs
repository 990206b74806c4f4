//! Media retrieval with timeout, size cap and bounded retry.
//!
//! Fetching is kept apart from fingerprinting: every failure here is a
//! [`MediaSearchError::Fetch`], never a hash error.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{MediaSearchError, Result};
use crate::media::MediaUrl;

/// Default cap on fetched media size (32 MB).
pub const DEFAULT_MAX_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
    /// Base directory for relative `file:` paths.
    pub base_path: PathBuf,
    /// Largest accepted payload in bytes.
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(2),
            base_path: PathBuf::from("/"),
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

pub struct MediaFetcher {
    client: Client,
    config: FetchConfig,
}

impl MediaFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MediaSearchError::Fetch(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Loads the bytes behind a `file:`, `http:` or `https:` URL.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match MediaUrl::parse(url)? {
            MediaUrl::File(path) => self.read_file(&path).await,
            MediaUrl::Remote(url) => self.fetch_remote(&url).await,
        }
    }

    /// Resolves a `file:` path: absolute as given, relative onto the base.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            self.config.base_path.join(path)
        }
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = self.resolve_path(path);
        check_size(&path, self.file_len(&path).await?, self.config.max_bytes)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            MediaSearchError::Fetch(format!("Failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "Read local media");
        Ok(bytes)
    }

    async fn file_len(&self, path: &Path) -> Result<u64> {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .map_err(|e| MediaSearchError::Fetch(format!("Failed to stat {}: {e}", path.display())))
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>> {
        retry_notify(
            self.build_backoff(),
            || async move { self.fetch_once(url).await },
            |err: MediaSearchError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn fetch_once(
        &self,
        url: &Url,
    ) -> std::result::Result<Vec<u8>, backoff::Error<MediaSearchError>> {
        let start = Instant::now();

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(MediaSearchError::Fetch(format!(
                    "Transient error (will retry): {e}"
                )))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(MediaSearchError::Fetch(format!(
                    "Request to {url} failed: {e}"
                )))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let err = MediaSearchError::Fetch(format!("{url} returned status: {status}"));
            return if is_transient_status(status) {
                warn!(status = %status, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        if let Some(len) = response.content_length() {
            check_size(Path::new(url.path()), len, self.config.max_bytes)
                .map_err(backoff::Error::permanent)?;
        }

        let bytes = response.bytes().await.map_err(|e| {
            backoff::Error::transient(MediaSearchError::Fetch(format!(
                "Failed to read body from {url}: {e}"
            )))
        })?;
        check_size(Path::new(url.path()), bytes.len() as u64, self.config.max_bytes)
            .map_err(backoff::Error::permanent)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "Request completed successfully"
        );
        Ok(bytes.to_vec())
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
            ..Default::default()
        }
    }
}

fn check_size(path: &Path, len: u64, max: usize) -> Result<()> {
    if len > max as u64 {
        return Err(MediaSearchError::Fetch(format!(
            "{} is {len} bytes, limit is {max}",
            path.display()
        )));
    }
    Ok(())
}

pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fetcher(base: &Path, max_bytes: usize) -> MediaFetcher {
        MediaFetcher::new(FetchConfig {
            base_path: base.to_path_buf(),
            max_bytes,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_absolute_and_relative_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let f = fetcher(dir.path(), 1024);
        let url = format!("file://{}", path.display());
        assert_eq!(f.fetch(&url).await.unwrap(), b"hello");
        assert_eq!(f.fetch("file:a.bin").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path(), 1024)
            .fetch("file:missing.png")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaSearchError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.bin"), vec![0u8; 64]).unwrap();
        let err = fetcher(dir.path(), 16)
            .fetch("file:big.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaSearchError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher(dir.path(), 16)
            .fetch("ftp://example.com/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaSearchError::Validation(_)));
    }

    #[test]
    fn test_transient_status_codes() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
