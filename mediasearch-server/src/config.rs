//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use mediasearch_core::fetch::DEFAULT_MAX_BYTES;
use mediasearch_core::fingerprint::DEFAULT_DIMENSIONS;
use mediasearch_core::{FetchConfig, MethodTable};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 2)
    pub body_limit_mb: usize,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
    /// Base directory for relative `file:` media URLs (default: /)
    pub media_base_path: PathBuf,
    /// Remote fetch timeout in seconds (default: 10)
    pub fetch_timeout_secs: u64,
    /// Retries on transient fetch failures (default: 3)
    pub fetch_max_retries: u32,
    /// Largest accepted media payload in MB (default: 32)
    pub max_media_mb: usize,
    /// Fingerprint dimensions computed by every method (default: 8,16)
    pub hash_dimensions: Vec<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 2,
            timeout_secs: 60,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            database_url: None,
            database_max_connections: 20,
            media_base_path: PathBuf::from("/"),
            fetch_timeout_secs: 10,
            fetch_max_retries: 3,
            max_media_mb: DEFAULT_MAX_BYTES / (1024 * 1024),
            hash_dimensions: DEFAULT_DIMENSIONS.to_vec(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses a comma-separated list of dimensions, ignoring invalid entries.
fn parse_dimensions(raw: &str) -> Vec<u32> {
    raw.split(',')
        .filter_map(|d| d.trim().parse().ok())
        .filter(|d| *d >= 2)
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let hash_dimensions = std::env::var("HASH_DIMENSIONS")
            .ok()
            .map(|raw| parse_dimensions(&raw))
            .filter(|dims| !dims.is_empty())
            .unwrap_or(defaults.hash_dimensions);

        Self {
            port: env_parse("PORT").unwrap_or(defaults.port),
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB").unwrap_or(defaults.body_limit_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC")
                .unwrap_or(defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST").unwrap_or(defaults.rate_limit_burst),
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            media_base_path: std::env::var("MEDIA_BASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_base_path),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS")
                .unwrap_or(defaults.fetch_timeout_secs),
            fetch_max_retries: env_parse("FETCH_MAX_RETRIES").unwrap_or(defaults.fetch_max_retries),
            max_media_mb: env_parse("MAX_MEDIA_MB").unwrap_or(defaults.max_media_mb),
            hash_dimensions,
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Default method table with the configured dimensions applied.
    pub fn method_table(&self) -> MethodTable {
        MethodTable::default().with_dimensions(&self.hash_dimensions)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_retries: self.fetch_max_retries,
            base_path: self.media_base_path.clone(),
            max_bytes: self.max_media_mb * 1024 * 1024,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, [127, 0, 0, 1]);
        assert!(config.allowed_origins.is_none());
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert_eq!(config.hash_dimensions, vec![8, 16]);
        assert_eq!(config.max_media_mb, 32);
    }

    #[test]
    fn test_socket_addr() {
        let config = Config {
            port: 8080,
            host: [0, 0, 0, 0],
            ..Default::default()
        };
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_dimensions_skips_invalid() {
        assert_eq!(parse_dimensions("8, 16,32"), vec![8, 16, 32]);
        assert_eq!(parse_dimensions("8,x,1,,12"), vec![8, 12]);
        assert!(parse_dimensions("").is_empty());
    }

    #[test]
    fn test_method_table_uses_configured_dimensions() {
        let config = Config {
            hash_dimensions: vec![12],
            ..Default::default()
        };
        let table = config.method_table();
        assert!(table.iter().all(|m| m.dimensions == vec![12]));
    }

    #[test]
    fn test_fetch_config_conversion() {
        let config = Config {
            media_base_path: PathBuf::from("/srv/media"),
            fetch_timeout_secs: 4,
            max_media_mb: 1,
            ..Default::default()
        };
        let fetch = config.fetch_config();
        assert_eq!(fetch.timeout, Duration::from_secs(4));
        assert_eq!(fetch.base_path, PathBuf::from("/srv/media"));
        assert_eq!(fetch.max_bytes, 1024 * 1024);
    }
}
