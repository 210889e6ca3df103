//! JSON-file cache store.
//!
//! The whole cache is one JSON object keyed by discovery-task identity. The
//! document is loaded lazily on first access, and every write replaces the
//! file through a temporary sibling plus rename. Readers never see a
//! truncated document.

use std::collections::BTreeMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::{CacheEntry, CacheError, CacheStore, cache_file_under};
use crate::model::ErrorKind;

type Document = BTreeMap<String, CacheEntry>;

/// Cache store persisted as a single JSON document on disk.
///
/// All access goes through one async mutex, making the store the single
/// writer of its file within the process.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    document: Mutex<Option<Document>>,
    corrupt: AtomicBool,
}

impl FileCacheStore {
    /// Creates a store backed by `path`. Nothing is read until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: Mutex::new(None),
            corrupt: AtomicBool::new(false),
        }
    }

    /// Creates a store at [`default_cache_path`].
    #[must_use]
    pub fn at_default_location() -> Self {
        Self::new(default_cache_path())
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the backing file was found unreadable on load.
    #[must_use]
    pub fn was_corrupt(&self) -> bool {
        self.corrupt.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Document {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file, starting cold");
                return Document::new();
            }
            Err(e) => {
                self.mark_corrupt(&e.to_string());
                return Document::new();
            }
        };

        let raw = match serde_json::from_slice::<BTreeMap<String, serde_json::Value>>(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                self.mark_corrupt(&e.to_string());
                return Document::new();
            }
        };

        let mut document = Document::new();
        for (key, value) in raw {
            match CacheEntry::decode(&key, value) {
                Ok(entry) => {
                    document.insert(key, entry);
                }
                Err(e) => self.mark_corrupt(&format!("entry {key}: {e}")),
            }
        }
        debug!(path = %self.path.display(), entries = document.len(), "loaded cache");
        document
    }

    fn mark_corrupt(&self, reason: &str) {
        self.corrupt.store(true, Ordering::SeqCst);
        warn!(
            path = %self.path.display(),
            kind = %ErrorKind::CacheCorrupt,
            reason,
            "cache file unreadable, treating as cold start"
        );
    }

    async fn persist(&self, document: &Document) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        let body = serde_json::to_vec_pretty(document).map_err(CacheError::serialize)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, body)
            .await
            .map_err(|e| CacheError::io(temp_path.clone(), e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| CacheError::io(self.path.clone(), e))?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        guard.as_ref().and_then(|document| document.get(key).cloned())
    }

    #[instrument(skip(self, entry), fields(key = %entry.key))]
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        let document = guard.get_or_insert_with(Document::new);
        document.insert(entry.key.clone(), entry);
        self.persist(document).await?;
        debug!("cache entry written");
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut guard = self.document.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await);
        }
        let document = guard.get_or_insert_with(Document::new);
        if document.remove(key).is_some() {
            self.persist(document).await?;
        }
        Ok(())
    }
}

/// Default cache file location.
///
/// Resolution order: `$XDG_CACHE_HOME/papers-crawler/discovery.json`, then
/// `$HOME/.cache/papers-crawler/discovery.json`, then a path relative to the
/// working directory.
#[must_use]
pub fn default_cache_path() -> PathBuf {
    let non_empty = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty());
    if let Some(xdg) = non_empty("XDG_CACHE_HOME") {
        return cache_file_under(Path::new(&xdg));
    }
    if let Some(home) = non_empty("HOME") {
        return cache_file_under(&Path::new(&home).join(".cache"));
    }
    cache_file_under(Path::new(".cache"))
}
