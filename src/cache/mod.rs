//! Persistence for discovery results with a staleness policy.
//!
//! # Overview
//!
//! Discovery is the expensive, fragile part of a crawl: it is the step most
//! likely to hit a challenge page. Results are therefore cached per discovery
//! task (`journals`, `articles:{slug}:{page}`) and reused while fresh.
//!
//! - [`CacheStore`] is the async seam the orchestrator depends on.
//! - [`FileCacheStore`] persists a single JSON document, written atomically.
//! - [`MemoryCacheStore`] keeps entries in process memory.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use crawler_core::cache::{CacheEntry, CachePayload, CacheSource, CacheStore, MemoryCacheStore};
//! use crawler_core::JournalRef;
//!
//! # async fn example() -> Result<(), crawler_core::cache::CacheError> {
//! let cache = MemoryCacheStore::new();
//! let journals = vec![JournalRef::new("cell", "Cell")];
//! cache
//!     .put(CacheEntry::new("journals", CachePayload::Journals { journals }, CacheSource::Primary))
//!     .await?;
//! let entry = cache.get("journals").await.expect("entry was just written");
//! assert!(entry.is_fresh(Duration::from_secs(60)));
//! # Ok(())
//! # }
//! ```

mod file;
mod memory;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ArticleRecord, JournalRef};

pub use file::{FileCacheStore, default_cache_path};
pub use memory::MemoryCacheStore;

/// Which acquisition path produced a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheSource {
    /// Plain HTTP request.
    Primary,
    /// Browser rendering.
    Fallback,
    /// Built-in static list.
    Static,
}

/// Cached discovery payload.
///
/// Serialized untagged: the list lands under the entry's `payload` key and a
/// listing page adds `nextPage` beside it. The entry key decides which variant
/// a stored document decodes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CachePayload {
    /// Result of journal discovery.
    Journals {
        /// Discovered journals in menu order.
        #[serde(rename = "payload")]
        journals: Vec<JournalRef>,
    },
    /// One article listing page.
    Articles {
        /// Articles parsed from the page.
        #[serde(rename = "payload")]
        articles: Vec<ArticleRecord>,
        /// Next listing page, if the page linked one.
        #[serde(rename = "nextPage")]
        next_page: Option<String>,
    },
}

/// One cached discovery result.
///
/// On disk an entry is `{fetchedAt, source, payload: [...]}`; the key is the
/// property name in the enclosing document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Discovery task identity.
    #[serde(skip)]
    pub key: String,
    /// When the payload was obtained.
    pub fetched_at: DateTime<Utc>,
    /// Which strategy produced the payload.
    pub source: CacheSource,
    /// Cached payload.
    #[serde(flatten)]
    pub payload: CachePayload,
}

/// Key prefix of article listing entries (`articles:{slug}:{page}`).
const ARTICLES_KEY_PREFIX: &str = "articles:";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry<T> {
    fetched_at: DateTime<Utc>,
    source: CacheSource,
    payload: Vec<T>,
    #[serde(default)]
    next_page: Option<String>,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, payload: CachePayload, source: CacheSource) -> Self {
        Self {
            key: key.into(),
            payload,
            fetched_at: Utc::now(),
            source,
        }
    }

    /// Decodes the stored form of the entry filed under `key`.
    ///
    /// # Errors
    ///
    /// Returns the serde error when `value` does not match the payload shape
    /// implied by `key`.
    pub fn decode(key: &str, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if key.starts_with(ARTICLES_KEY_PREFIX) {
            let stored: StoredEntry<ArticleRecord> = serde_json::from_value(value)?;
            Ok(Self {
                key: key.to_string(),
                fetched_at: stored.fetched_at,
                source: stored.source,
                payload: CachePayload::Articles {
                    articles: stored.payload,
                    next_page: stored.next_page,
                },
            })
        } else {
            let stored: StoredEntry<JournalRef> = serde_json::from_value(value)?;
            Ok(Self {
                key: key.to_string(),
                fetched_at: stored.fetched_at,
                source: stored.source,
                payload: CachePayload::Journals {
                    journals: stored.payload,
                },
            })
        }
    }

    /// Age of the entry relative to `now`. Entries stamped in the future have age zero.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is younger than `ttl`.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age_at(Utc::now()) < ttl
    }
}

/// Errors raised while persisting cache entries.
///
/// Read failures are never surfaced: an unreadable cache is a cold start.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure while writing the cache document.
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The cache document could not be serialized.
    #[error("cache serialization failed: {source}")]
    Serialize {
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialize(source: serde_json::Error) -> Self {
        Self::Serialize { source }
    }
}

/// Key/value store for discovery results.
///
/// Implementations must be safe to share across tasks; writes are
/// serialized so a reader never observes a partially written entry.
#[async_trait]
pub trait CacheStore: Send + Sync + Debug {
    /// Returns the entry for `key`, fresh or stale.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Inserts or replaces the entry under `entry.key`.
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Removes the entry for `key` if present.
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

/// Location of the cache document when none is configured, relative to a home or
/// XDG cache directory.
pub(crate) fn cache_file_under(base: &Path) -> PathBuf {
    base.join("papers-crawler").join("discovery.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn journals_entry() -> CacheEntry {
        CacheEntry::new(
            "journals",
            CachePayload::Journals {
                journals: vec![JournalRef::new("cell", "Cell")],
            },
            CacheSource::Primary,
        )
    }

    #[test]
    fn test_new_entry_is_fresh() {
        let entry = journals_entry();
        assert!(entry.is_fresh(Duration::from_secs(60)));
    }

    #[test]
    fn test_old_entry_is_stale() {
        let mut entry = journals_entry();
        entry.fetched_at = Utc::now() - chrono::Duration::hours(2);
        assert!(!entry.is_fresh(Duration::from_secs(3600)));
        assert!(entry.is_fresh(Duration::from_secs(3 * 3600)));
    }

    #[test]
    fn test_future_entry_has_zero_age() {
        let mut entry = journals_entry();
        entry.fetched_at = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(entry.age_at(Utc::now()), Duration::ZERO);
    }

    // ==================== Stored Format Tests ====================

    #[test]
    fn test_journals_entry_stored_shape() {
        let json = serde_json::to_value(journals_entry()).unwrap();
        let object = json.as_object().unwrap();

        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["fetchedAt", "payload", "source"]);
        assert_eq!(json["source"], "PRIMARY");
        assert!(json["fetchedAt"].is_string());
        assert_eq!(json["payload"].as_array().unwrap().len(), 1);
        assert_eq!(json["payload"][0]["slug"], "cell");
    }

    #[test]
    fn test_articles_entry_carries_next_page() {
        let entry = CacheEntry::new(
            "articles:cell:0",
            CachePayload::Articles {
                articles: Vec::new(),
                next_page: Some("https://www.cell.com/cell/newarticles?page=2".to_string()),
            },
            CacheSource::Fallback,
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["payload"].is_array());
        assert_eq!(json["nextPage"], "https://www.cell.com/cell/newarticles?page=2");
        assert_eq!(json["source"], "FALLBACK");
    }

    #[test]
    fn test_decode_restores_entry_by_key() {
        let entry = journals_entry();
        let json = serde_json::to_value(&entry).unwrap();
        let decoded = CacheEntry::decode("journals", json).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_decode_empty_article_page_keeps_variant() {
        let json = serde_json::json!({
            "fetchedAt": "2024-05-01T10:00:00Z",
            "source": "STATIC",
            "payload": [],
        });
        let decoded = CacheEntry::decode("articles:neuron:3", json).unwrap();
        assert_eq!(decoded.key, "articles:neuron:3");
        assert_eq!(
            decoded.payload,
            CachePayload::Articles {
                articles: Vec::new(),
                next_page: None,
            }
        );
    }

    #[test]
    fn test_decode_rejects_mismatched_payload() {
        let json = serde_json::json!({
            "fetchedAt": "2024-05-01T10:00:00Z",
            "source": "PRIMARY",
            "payload": {"journals": []},
        });
        assert!(CacheEntry::decode("journals", json).is_err());
    }
}
