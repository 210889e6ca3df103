//! Runtime configuration for a [`Crawler`](crate::Crawler).
//!
//! [`CrawlerConfig::default`] carries the values used when neither a config
//! file nor CLI flags override them. Callers building a config by hand should
//! run [`CrawlerConfig::validate`] before handing it to the crawler.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::download::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_POLITENESS_MS, MIN_PDF_BYTES, READ_TIMEOUT_SECS,
};
use crate::download::DEFAULT_MAX_RETRIES;

/// Site root used when no override is configured.
pub const DEFAULT_BASE_URL: &str = "https://www.cell.com";

/// Default concurrent download workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Maximum concurrent download workers.
pub const MAX_WORKERS: usize = 32;

/// Default listing pages fetched per journal before giving up on pagination.
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Journal lists change rarely; keep them for a week.
pub const DEFAULT_JOURNAL_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// Listing pages gain new articles daily; keep them for six hours.
pub const DEFAULT_ARTICLE_CACHE_TTL: Duration = Duration::from_secs(6 * 3600);

/// Errors raised by [`CrawlerConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The base URL does not parse as an absolute http(s) URL.
    #[error("invalid base URL {url:?}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
    },

    /// A numeric setting lies outside its accepted range.
    #[error("invalid value for `{field}`: {value}. Expected range: {range}")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Rejected value.
        value: u64,
        /// Human-readable accepted range.
        range: &'static str,
    },
}

/// Crawler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerConfig {
    /// Site root, e.g. `https://www.cell.com`.
    pub base_url: String,
    /// Concurrent download workers shared by all journals.
    pub workers: usize,
    /// Journals processed at once (1 = sequential).
    pub journal_concurrency: usize,
    /// Minimum delay between download requests on one session.
    pub politeness: Duration,
    /// Maximum fetch attempts per PDF (including the first).
    pub max_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_base_delay: Duration,
    /// Upper bound for retry delays.
    pub retry_max_delay: Duration,
    /// Random jitter added to retry delays.
    pub retry_jitter: Duration,
    /// Staleness threshold for the journal list.
    pub journal_cache_ttl: Duration,
    /// Staleness threshold for article listing pages.
    pub article_cache_ttl: Duration,
    /// Listing pages fetched per journal at most.
    pub max_pages: usize,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP whole-request timeout.
    pub read_timeout: Duration,
    /// Smallest body accepted as a PDF.
    pub min_pdf_bytes: u64,
    /// Extra body signatures classified as challenge pages.
    pub challenge_signatures: Vec<String>,
    /// Cache file location; `None` uses the platform cache directory.
    pub cache_path: Option<PathBuf>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            workers: DEFAULT_WORKERS,
            journal_concurrency: 1,
            politeness: Duration::from_millis(DEFAULT_POLITENESS_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(32),
            retry_jitter: Duration::from_millis(500),
            journal_cache_ttl: DEFAULT_JOURNAL_CACHE_TTL,
            article_cache_ttl: DEFAULT_ARTICLE_CACHE_TTL,
            max_pages: DEFAULT_MAX_PAGES,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            min_pdf_bytes: MIN_PDF_BYTES,
            challenge_signatures: Vec::new(),
            cache_path: None,
        }
    }
}

impl CrawlerConfig {
    /// Checks every setting against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
            });
        }

        check_range("workers", self.workers as u64, 1, MAX_WORKERS as u64, "1..=32")?;
        check_range(
            "journal_concurrency",
            self.journal_concurrency as u64,
            1,
            8,
            "1..=8",
        )?;
        check_range(
            "politeness_ms",
            u64::try_from(self.politeness.as_millis()).unwrap_or(u64::MAX),
            0,
            60_000,
            "0..=60000",
        )?;
        check_range("max_retries", u64::from(self.max_retries), 1, 10, "1..=10")?;
        check_range("max_pages", self.max_pages as u64, 1, 500, "1..=500")?;
        check_range(
            "connect_timeout_secs",
            self.connect_timeout.as_secs(),
            1,
            3600,
            "1..=3600",
        )?;
        check_range(
            "read_timeout_secs",
            self.read_timeout.as_secs(),
            1,
            3600,
            "1..=3600",
        )?;
        Ok(())
    }
}

fn check_range(
    field: &'static str,
    value: u64,
    min: u64,
    max: u64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CrawlerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url, "https://www.cell.com");
        assert_eq!(config.politeness, Duration::from_secs(1));
        assert_eq!(config.journal_concurrency, 1);
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let config = CrawlerConfig {
            base_url: "ftp://www.cell.com".to_string(),
            ..CrawlerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = CrawlerConfig {
            workers: 0,
            ..CrawlerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("`workers`"));
    }

    #[test]
    fn test_validate_allows_disabled_politeness() {
        let config = CrawlerConfig {
            politeness: Duration::ZERO,
            ..CrawlerConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
